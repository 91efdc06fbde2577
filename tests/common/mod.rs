// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 测试用推理引擎
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

#![allow(dead_code)]

use std::sync::{
  Arc, Mutex,
  mpsc::{Receiver, Sender},
};

use shanan_seg::{
  config::SessionConfig,
  engine::{DecoderInput, DeviceInfo, EngineError, InferenceEngine, LoadPhase, ModelSpec},
  frame::RgbaFrame,
  geometry::Dimensions,
  output::Render,
  selector::CandidateSet,
  tensor::Tensor,
};

pub const EMBEDDING_LEN: usize = 16;

pub fn small_spec() -> ModelSpec {
  ModelSpec {
    input_size: Dimensions::square(8),
    mask_size: Dimensions::square(4),
    channels: 3,
  }
}

pub fn small_config() -> SessionConfig {
  SessionConfig {
    model: small_spec(),
    ..SessionConfig::default()
  }
}

#[derive(Debug, Clone)]
pub enum Call {
  Load,
  Encode(Vec<usize>),
  Decode(DecoderInput),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// 按脚本返回结果的推理引擎。
///
/// 每个候选掩码左半部分为正值、右半部分为负值；得分取自 `scores`。
pub struct MockEngine {
  spec: ModelSpec,
  calls: CallLog,
  scores: Vec<f32>,
  load_failures: usize,
  encode_runtime_failures: usize,
  decode_skips: usize,
  decode_failures: usize,
  decode_failure: fn(String) -> EngineError,
  decode_panics: usize,
  decode_entered: Option<Sender<()>>,
  decode_gate: Option<Receiver<()>>,
}

impl MockEngine {
  pub fn new() -> Self {
    Self {
      spec: small_spec(),
      calls: Arc::new(Mutex::new(Vec::new())),
      scores: vec![0.2, 0.9, 0.9],
      load_failures: 0,
      encode_runtime_failures: 0,
      decode_skips: 0,
      decode_failures: 0,
      decode_failure: EngineError::Runtime,
      decode_panics: 0,
      decode_entered: None,
      decode_gate: None,
    }
  }

  pub fn calls(&self) -> CallLog {
    self.calls.clone()
  }

  pub fn with_scores(mut self, scores: Vec<f32>) -> Self {
    self.scores = scores;
    self
  }

  pub fn failing_loads(mut self, n: usize) -> Self {
    self.load_failures = n;
    self
  }

  pub fn failing_encodes(mut self, n: usize) -> Self {
    self.encode_runtime_failures = n;
    self
  }

  /// 接下来 `n` 次解码以 `kind` 构造的错误失败
  pub fn failing_decodes(self, n: usize, kind: fn(String) -> EngineError) -> Self {
    self.failing_decodes_after(0, n, kind)
  }

  /// 前 `skip` 次解码成功，随后 `n` 次失败
  pub fn failing_decodes_after(
    mut self,
    skip: usize,
    n: usize,
    kind: fn(String) -> EngineError,
  ) -> Self {
    self.decode_skips = skip;
    self.decode_failures = n;
    self.decode_failure = kind;
    self
  }

  pub fn panicking_decodes(mut self, n: usize) -> Self {
    self.decode_panics = n;
    self
  }

  /// 解码开始时通知 `entered`，然后等待 `gate` 放行
  pub fn gated(mut self, entered: Sender<()>, gate: Receiver<()>) -> Self {
    self.decode_entered = Some(entered);
    self.decode_gate = Some(gate);
    self
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

impl InferenceEngine for MockEngine {
  fn load(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, EngineError> {
    self.record(Call::Load);
    progress(LoadPhase::Downloading);
    progress(LoadPhase::LoadingModel);
    if self.load_failures > 0 {
      self.load_failures -= 1;
      return Err(EngineError::Load("模型文件不存在".into()));
    }
    Ok(DeviceInfo {
      device: "cpu".into(),
      backend: "mock".into(),
    })
  }

  fn encode(&mut self, image: Tensor) -> Result<Tensor, EngineError> {
    self.record(Call::Encode(image.dims().to_vec()));
    if self.encode_runtime_failures > 0 {
      self.encode_runtime_failures -= 1;
      return Err(EngineError::Runtime("设备丢失".into()));
    }
    let mean = image.data().iter().sum::<f32>() / image.len() as f32;
    Ok(Tensor::new("image_embeddings", vec![1, EMBEDDING_LEN], vec![mean; EMBEDDING_LEN])?)
  }

  fn decode(&mut self, input: DecoderInput) -> Result<CandidateSet, EngineError> {
    self.record(Call::Decode(input.clone()));
    if let Some(entered) = &self.decode_entered {
      let _ = entered.send(());
    }
    if let Some(gate) = &self.decode_gate {
      let _ = gate.recv();
    }
    if self.decode_panics > 0 {
      self.decode_panics -= 1;
      panic!("解码器内部错误");
    }
    if self.decode_skips > 0 {
      self.decode_skips -= 1;
    } else if self.decode_failures > 0 {
      self.decode_failures -= 1;
      return Err((self.decode_failure)("解码器执行失败".into()));
    }

    let (w, h) = (self.spec.mask_size.w as usize, self.spec.mask_size.h as usize);
    let k = self.scores.len();
    let mut data = Vec::with_capacity(k * w * h);
    for i in 0..k {
      for _ in 0..h {
        for x in 0..w {
          data.push(if x < w / 2 { 1.0 + i as f32 } else { -1.0 });
        }
      }
    }
    let masks = Tensor::new("low_res_masks", vec![1, k, h, w], data)?;
    CandidateSet::new(masks, self.scores.clone())
      .map_err(|e| EngineError::InvalidOutput(e.to_string()))
  }
}

pub fn decodes(calls: &CallLog) -> Vec<DecoderInput> {
  calls
    .lock()
    .unwrap()
    .iter()
    .filter_map(|c| match c {
      Call::Decode(input) => Some(input.clone()),
      _ => None,
    })
    .collect()
}

pub fn encode_count(calls: &CallLog) -> usize {
  calls
    .lock()
    .unwrap()
    .iter()
    .filter(|c| matches!(c, Call::Encode(_)))
    .count()
}

pub fn test_frame(dims: Dimensions) -> RgbaFrame {
  let data = (0..dims.area())
    .flat_map(|i| [(i % 251) as u8, 128, 64, 255])
    .collect();
  RgbaFrame::new(dims, data).unwrap()
}

/// 记录所有渲染结果的输出
#[derive(Default, Clone)]
pub struct RecordingOutput {
  pub masks: Arc<Mutex<Vec<RgbaFrame>>>,
}

impl Render<RgbaFrame, RgbaFrame> for RecordingOutput {
  type Error = std::io::Error;

  fn render_result(&self, frame: &RgbaFrame, mask: &RgbaFrame) -> Result<(), Self::Error> {
    assert_eq!(frame.dims(), mask.dims());
    self.masks.lock().unwrap().push(mask.clone());
    Ok(())
  }
}
