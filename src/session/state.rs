// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/state.rs - 会话状态与缓存
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

use crate::{prompt::PointPrompt, tensor::Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
  #[default]
  Idle,
  Loading,
  Ready,
  Encoding,
  Encoded,
  Decoding,
  Failed,
}

impl SessionState {
  /// 有操作正在推理引擎上执行
  pub fn is_in_flight(self) -> bool {
    matches!(
      self,
      SessionState::Loading | SessionState::Encoding | SessionState::Decoding
    )
  }

  pub fn is_loaded(self) -> bool {
    matches!(
      self,
      SessionState::Ready
        | SessionState::Encoding
        | SessionState::Encoded
        | SessionState::Decoding
    )
  }
}

impl std::fmt::Display for SessionState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      SessionState::Idle => "Idle",
      SessionState::Loading => "Loading",
      SessionState::Ready => "Ready",
      SessionState::Encoding => "Encoding",
      SessionState::Encoded => "Encoded",
      SessionState::Decoding => "Decoding",
      SessionState::Failed => "Failed",
    };
    f.write_str(name)
  }
}

/// 单张图像的会话数据，只由控制器修改
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
  pub(crate) embedding: Option<Arc<Tensor>>,
  pub(crate) previous_mask: Option<Arc<Tensor>>,
  pub(crate) prompt_history: Vec<PointPrompt>,
}

impl SessionCache {
  pub fn embedding(&self) -> Option<&Arc<Tensor>> {
    self.embedding.as_ref()
  }

  pub fn previous_mask(&self) -> Option<&Arc<Tensor>> {
    self.previous_mask.as_ref()
  }

  pub fn prompt_history(&self) -> &[PointPrompt] {
    &self.prompt_history
  }

  pub(crate) fn clear_mask(&mut self) {
    self.previous_mask = None;
    self.prompt_history.clear();
  }

  pub(crate) fn clear(&mut self) {
    self.embedding = None;
    self.clear_mask();
  }

  /// 新提示以当前历史为前缀时只追加尾部，否则视为重新选择对象
  pub(crate) fn record_prompts(&mut self, prompts: &[PointPrompt]) {
    let known = self.prompt_history.len();
    if prompts.len() >= known && prompts[..known] == self.prompt_history[..] {
      self.prompt_history.extend_from_slice(&prompts[known..]);
    } else {
      self.prompt_history = prompts.to_vec();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Point;

  fn p(x: f32) -> PointPrompt {
    PointPrompt::positive(Point::new(x, x))
  }

  #[test]
  fn test_record_prompts_extends_prefix() {
    let mut cache = SessionCache::default();
    cache.record_prompts(&[p(1.0)]);
    cache.record_prompts(&[p(1.0), p(2.0)]);
    assert_eq!(cache.prompt_history(), &[p(1.0), p(2.0)]);
  }

  #[test]
  fn test_record_prompts_replaces_on_new_pick() {
    let mut cache = SessionCache::default();
    cache.record_prompts(&[p(1.0), p(2.0)]);
    cache.record_prompts(&[p(3.0)]);
    assert_eq!(cache.prompt_history(), &[p(3.0)]);
  }

  #[test]
  fn test_clear_mask_keeps_embedding() {
    let mut cache = SessionCache {
      embedding: Some(Arc::new(Tensor::zeros("e", vec![1]).unwrap())),
      previous_mask: Some(Arc::new(Tensor::zeros("m", vec![1]).unwrap())),
      prompt_history: vec![p(1.0)],
    };
    cache.clear_mask();
    assert!(cache.embedding().is_some());
    assert!(cache.previous_mask().is_none());
    assert!(cache.prompt_history().is_empty());
    cache.clear();
    assert!(cache.embedding().is_none());
  }

  #[test]
  fn test_in_flight_states() {
    assert!(SessionState::Decoding.is_in_flight());
    assert!(!SessionState::Encoded.is_in_flight());
    assert!(!SessionState::Failed.is_loaded());
  }
}
