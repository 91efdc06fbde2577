// 该文件是 Shanan （山南西风） 项目的一部分。
// src/engine.rs - 推理引擎接口
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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  geometry::Dimensions,
  prompt::PointPrompt,
  selector::CandidateSet,
  tensor::{Tensor, TensorError},
};

pub const POINT_COORDS_TENSOR_NAME: &str = "point_coords";
pub const POINT_LABELS_TENSOR_NAME: &str = "point_labels";

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("模型加载错误: {0}")]
  Load(String),
  #[error("模型输入无效: {0}")]
  InvalidInput(String),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
  #[error("推理运行错误: {0}")]
  Runtime(String),
}

impl EngineError {
  /// 运行时错误会使会话进入 `Failed`
  pub fn is_fatal(&self) -> bool {
    matches!(self, EngineError::Runtime(_))
  }
}

impl From<TensorError> for EngineError {
  fn from(err: TensorError) -> Self {
    EngineError::InvalidOutput(err.to_string())
  }
}

/// 已加载模型的固定张量约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
  pub input_size: Dimensions,
  pub mask_size: Dimensions,
  pub channels: usize,
}

impl Default for ModelSpec {
  fn default() -> Self {
    Self {
      input_size: Dimensions::square(1024),
      mask_size: Dimensions::square(256),
      channels: 3,
    }
  }
}

impl ModelSpec {
  /// `[1, C, H, W]`
  pub fn image_dims(&self) -> Vec<usize> {
    vec![
      1,
      self.channels,
      self.input_size.h as usize,
      self.input_size.w as usize,
    ]
  }

  /// `[1, 1, maskH, maskW]`
  pub fn prior_mask_dims(&self) -> Vec<usize> {
    vec![1, 1, self.mask_size.h as usize, self.mask_size.w as usize]
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
  pub device: String,
  pub backend: String,
}

impl std::fmt::Display for DeviceInfo {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} ({})", self.device, self.backend)
  }
}

/// 模型加载进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
  Downloading,
  LoadingModel,
}

/// 解码器的一次输入。嵌入与先验掩码是只读快照。
#[derive(Debug, Clone)]
pub struct DecoderInput {
  pub embedding: Arc<Tensor>,
  pub prompts: Vec<PointPrompt>,
  pub prior_mask: Option<Arc<Tensor>>,
}

impl DecoderInput {
  /// `[1, N, 2]`
  pub fn point_coords(&self) -> Result<Tensor, TensorError> {
    let data = self.prompts.iter().flat_map(|p| [p.x, p.y]).collect();
    Tensor::new(POINT_COORDS_TENSOR_NAME, vec![1, self.prompts.len(), 2], data)
  }

  /// `[1, N]`
  pub fn point_labels(&self) -> Result<Tensor, TensorError> {
    let data = self.prompts.iter().map(|p| p.label.as_f32()).collect();
    Tensor::new(POINT_LABELS_TENSOR_NAME, vec![1, self.prompts.len()], data)
  }
}

/// 编码器/解码器两入口的推理引擎
pub trait InferenceEngine {
  fn load(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, EngineError>;
  fn encode(&mut self, image: Tensor) -> Result<Tensor, EngineError>;
  fn decode(&mut self, input: DecoderInput) -> Result<CandidateSet, EngineError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
  fn load(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, EngineError> {
    (**self).load(progress)
  }

  fn encode(&mut self, image: Tensor) -> Result<Tensor, EngineError> {
    (**self).encode(image)
  }

  fn decode(&mut self, input: DecoderInput) -> Result<CandidateSet, EngineError> {
    (**self).decode(input)
  }
}

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{SamOnnxEngine, SamOnnxEngineBuilder};
