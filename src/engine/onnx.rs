// 该文件是 Shanan （山南西风） 项目的一部分。
// src/engine/onnx.rs - 基于 ONNX Runtime 的 SAM 编码器/解码器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use ort::{session::Session, value::Tensor as OrtTensor};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{
    DecoderInput, DeviceInfo, EngineError, InferenceEngine, LoadPhase, ModelSpec,
    POINT_COORDS_TENSOR_NAME, POINT_LABELS_TENSOR_NAME,
  },
  selector::CandidateSet,
  tensor::Tensor,
};

const SAM_ENCODER_INPUT: &str = "image";
const SAM_ENCODER_OUTPUT: &str = "image_embeddings";
const SAM_DECODER_EMBEDDING: &str = "image_embeddings";
const SAM_DECODER_MASK_INPUT: &str = "mask_input";
const SAM_DECODER_HAS_MASK: &str = "has_mask_input";
const SAM_DECODER_ORIG_SIZE: &str = "orig_im_size";
const SAM_DECODER_LOW_RES_MASKS: &str = "low_res_masks";
const SAM_DECODER_MASKS: &str = "masks";
const SAM_DECODER_SCORES: &str = "iou_predictions";
const SAM_MIN_DECODER_INPUTS: usize = 5;

const DEFAULT_ENCODER_FILE: &str = "encoder.onnx";
const DEFAULT_DECODER_FILE: &str = "decoder.onnx";

pub struct SamOnnxEngineBuilder {
  model_dir: PathBuf,
  encoder_file: String,
  decoder_file: String,
  spec: ModelSpec,
}

impl FromUrlWithScheme for SamOnnxEngineBuilder {
  const SCHEME: &'static str = "sam";
}

impl FromUrl for SamOnnxEngineBuilder {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::Load(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| EngineError::Load(format!("模型路径解码失败: {}", e)))?;

    let mut builder = SamOnnxEngineBuilder {
      model_dir: PathBuf::from(path.as_ref()),
      encoder_file: DEFAULT_ENCODER_FILE.to_string(),
      decoder_file: DEFAULT_DECODER_FILE.to_string(),
      spec: ModelSpec::default(),
    };

    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "encoder" => builder.encoder_file = v.into_owned(),
        "decoder" => builder.decoder_file = v.into_owned(),
        _ => debug!("忽略未知的模型参数: {}={}", k, v),
      }
    }

    Ok(builder)
  }
}

impl SamOnnxEngineBuilder {
  pub fn spec(mut self, spec: ModelSpec) -> Self {
    self.spec = spec;
    self
  }

  /// 只记录路径，会话在 `load` 时创建
  pub fn build(self) -> SamOnnxEngine {
    SamOnnxEngine {
      encoder_path: self.model_dir.join(&self.encoder_file),
      decoder_path: self.model_dir.join(&self.decoder_file),
      spec: self.spec,
      encoder: None,
      decoder: None,
    }
  }
}

pub struct SamOnnxEngine {
  encoder_path: PathBuf,
  decoder_path: PathBuf,
  spec: ModelSpec,
  encoder: Option<Session>,
  decoder: Option<Session>,
}

fn load_session(path: &Path) -> Result<Session, EngineError> {
  info!("加载模型文件: {}", path.display());
  let session = Session::builder()
    .and_then(|b| b.commit_from_file(path))
    .map_err(|e| {
      error!("创建 ONNX 会话失败: {}", e);
      EngineError::Load(format!("无法加载 {}: {}", path.display(), e))
    })?;
  debug!(
    "模型 {} 输入数量: {}, 输出数量: {}",
    path.display(),
    session.inputs.len(),
    session.outputs.len()
  );
  Ok(session)
}

fn has_input(session: &Session, name: &str) -> bool {
  session.inputs.iter().any(|i| i.name == name)
}

fn output_names(session: &Session) -> Vec<&str> {
  session.outputs.iter().map(|o| o.name.as_str()).collect()
}

/// 解码器掩码输出名，优先低分辨率掩码
fn mask_output(outputs: &[&str]) -> Option<&'static str> {
  [SAM_DECODER_LOW_RES_MASKS, SAM_DECODER_MASKS]
    .into_iter()
    .find(|name| outputs.contains(name))
}

fn check_outputs(path: &Path, outputs: &[&str], required: &[&str]) -> Result<(), EngineError> {
  match required.iter().find(|name| !outputs.contains(name)) {
    Some(name) => {
      error!("模型 {} 缺少输出 {}, 实际输出 {:?}", path.display(), name, outputs);
      Err(EngineError::Load(format!(
        "模型 {} 缺少输出 {}",
        path.display(),
        name
      )))
    }
    None => Ok(()),
  }
}

fn missing_output(name: &str) -> EngineError {
  EngineError::InvalidOutput(format!("推理结果缺少输出 {}", name))
}

fn to_ort(tensor: &Tensor) -> Result<OrtTensor<f32>, EngineError> {
  let shape: Vec<i64> = tensor.dims().iter().map(|&d| d as i64).collect();
  OrtTensor::from_array((shape, tensor.data().to_vec()))
    .map_err(|e| EngineError::InvalidInput(format!("张量 {} 转换失败: {}", tensor.name(), e)))
}

fn runtime(stage: &str) -> impl Fn(ort::Error) -> EngineError + '_ {
  move |e| EngineError::Runtime(format!("{}: {}", stage, e))
}

impl SamOnnxEngine {
  fn sessions(&mut self) -> Result<(&mut Session, &mut Session), EngineError> {
    match (self.encoder.as_mut(), self.decoder.as_mut()) {
      (Some(enc), Some(dec)) => Ok((enc, dec)),
      _ => Err(EngineError::Runtime("模型尚未加载".to_string())),
    }
  }
}

impl InferenceEngine for SamOnnxEngine {
  fn load(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, EngineError> {
    progress(LoadPhase::LoadingModel);
    let encoder = load_session(&self.encoder_path)?;
    let decoder = load_session(&self.decoder_path)?;

    if decoder.inputs.len() < SAM_MIN_DECODER_INPUTS {
      error!(
        "预期解码器输入数量至少为 {}, 实际为 {}",
        SAM_MIN_DECODER_INPUTS,
        decoder.inputs.len()
      );
      return Err(EngineError::Load(format!(
        "预期解码器输入数量至少为 {}, 实际为 {}",
        SAM_MIN_DECODER_INPUTS,
        decoder.inputs.len()
      )));
    }
    check_outputs(&self.encoder_path, &output_names(&encoder), &[SAM_ENCODER_OUTPUT])?;
    let decoder_outputs = output_names(&decoder);
    check_outputs(&self.decoder_path, &decoder_outputs, &[SAM_DECODER_SCORES])?;
    if mask_output(&decoder_outputs).is_none() {
      check_outputs(&self.decoder_path, &decoder_outputs, &[SAM_DECODER_LOW_RES_MASKS])?;
    }

    self.encoder = Some(encoder);
    self.decoder = Some(decoder);
    info!("模型加载完成");

    Ok(DeviceInfo {
      device: "cpu".to_string(),
      backend: "onnxruntime".to_string(),
    })
  }

  fn encode(&mut self, image: Tensor) -> Result<Tensor, EngineError> {
    let value = to_ort(&image)?;
    let (encoder, _) = self.sessions()?;

    debug!("执行编码器推理");
    let outputs = encoder
      .run(ort::inputs![SAM_ENCODER_INPUT => value])
      .map_err(runtime("编码器推理失败"))?;

    let (shape, data) = outputs
      .get(SAM_ENCODER_OUTPUT)
      .ok_or_else(|| missing_output(SAM_ENCODER_OUTPUT))?
      .try_extract_tensor::<f32>()
      .map_err(runtime("提取图像嵌入失败"))?;
    let dims = shape.iter().map(|&d| d.max(0) as usize).collect();

    Ok(Tensor::new(SAM_ENCODER_OUTPUT, dims, data.to_vec())?)
  }

  fn decode(&mut self, input: DecoderInput) -> Result<CandidateSet, EngineError> {
    let spec = self.spec;
    let embedding = to_ort(&input.embedding)?;
    let coords = to_ort(&input.point_coords()?)?;
    let labels = to_ort(&input.point_labels()?)?;

    let (mask_input, has_mask) = match &input.prior_mask {
      Some(prior) => (to_ort(prior)?, 1.0f32),
      None => {
        let zeros = Tensor::zeros(SAM_DECODER_MASK_INPUT, spec.prior_mask_dims())?;
        (to_ort(&zeros)?, 0.0)
      }
    };
    let has_mask = OrtTensor::from_array((vec![1i64], vec![has_mask]))
      .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

    let (_, decoder) = self.sessions()?;
    let mut inputs = ort::inputs![
      SAM_DECODER_EMBEDDING => embedding,
      POINT_COORDS_TENSOR_NAME => coords,
      POINT_LABELS_TENSOR_NAME => labels,
      SAM_DECODER_MASK_INPUT => mask_input,
      SAM_DECODER_HAS_MASK => has_mask,
    ];
    if has_input(decoder, SAM_DECODER_ORIG_SIZE) {
      let size = OrtTensor::from_array((
        vec![2i64],
        vec![spec.input_size.h as f32, spec.input_size.w as f32],
      ))
      .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
      inputs.push((SAM_DECODER_ORIG_SIZE.into(), size.into()));
    }

    let mask_name =
      mask_output(&output_names(decoder)).ok_or_else(|| missing_output(SAM_DECODER_MASKS))?;

    debug!("执行解码器推理, 提示点数量 {}", input.prompts.len());
    let outputs = decoder.run(inputs).map_err(runtime("解码器推理失败"))?;
    let (shape, data) = outputs
      .get(mask_name)
      .ok_or_else(|| missing_output(mask_name))?
      .try_extract_tensor::<f32>()
      .map_err(runtime("提取掩码失败"))?;
    let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
    let masks = Tensor::new(mask_name, dims, data.to_vec())?;

    let (_, scores) = outputs
      .get(SAM_DECODER_SCORES)
      .ok_or_else(|| missing_output(SAM_DECODER_SCORES))?
      .try_extract_tensor::<f32>()
      .map_err(runtime("提取得分失败"))?;

    CandidateSet::new(masks, scores.to_vec())
      .map_err(|e| EngineError::InvalidOutput(e.to_string()))
  }
}
