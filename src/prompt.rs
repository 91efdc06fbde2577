// 该文件是 Shanan （山南西风） 项目的一部分。
// src/prompt.rs - 点提示
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

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptLabel {
  Negative,
  Positive,
}

impl PromptLabel {
  /// 解码器约定的标签值
  pub fn as_f32(self) -> f32 {
    match self {
      PromptLabel::Negative => 0.0,
      PromptLabel::Positive => 1.0,
    }
  }
}

/// 模型输入空间中的带标签点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
  pub x: f32,
  pub y: f32,
  pub label: PromptLabel,
}

impl PointPrompt {
  pub fn positive(point: Point) -> Self {
    Self {
      x: point.x,
      y: point.y,
      label: PromptLabel::Positive,
    }
  }

  pub fn negative(point: Point) -> Self {
    Self {
      x: point.x,
      y: point.y,
      label: PromptLabel::Negative,
    }
  }

  pub fn is_finite(&self) -> bool {
    self.x.is_finite() && self.y.is_finite()
  }
}

/// 当前对象的点击序列：追加点击（如 shift+点击）延续序列，普通点击开始新序列
#[derive(Debug, Clone, Default)]
pub struct ClickSequence {
  prompts: Vec<PointPrompt>,
}

impl ClickSequence {
  pub fn click(&mut self, prompt: PointPrompt, additive: bool) -> &[PointPrompt] {
    if !additive {
      self.prompts.clear();
    }
    self.prompts.push(prompt);
    &self.prompts
  }

  pub fn clear(&mut self) {
    self.prompts.clear();
  }

  pub fn as_slice(&self) -> &[PointPrompt] {
    &self.prompts
  }

  pub fn to_vec(&self) -> Vec<PointPrompt> {
    self.prompts.clone()
  }

  pub fn is_empty(&self) -> bool {
    self.prompts.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_click_sequence_additive_and_reset() {
    let mut seq = ClickSequence::default();
    let a = PointPrompt::positive(Point::new(1.0, 2.0));
    let b = PointPrompt::positive(Point::new(3.0, 4.0));
    let c = PointPrompt::negative(Point::new(5.0, 6.0));

    assert_eq!(seq.click(a, true), &[a]);
    assert_eq!(seq.click(b, true), &[a, b]);
    assert_eq!(seq.click(c, false), &[c]);
    seq.clear();
    assert!(seq.is_empty());
  }

  #[test]
  fn test_label_values() {
    assert_eq!(PromptLabel::Positive.as_f32(), 1.0);
    assert_eq!(PromptLabel::Negative.as_f32(), 0.0);
  }
}
