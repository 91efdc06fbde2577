// 该文件是 Shanan （山南西风） 项目的一部分。
// src/selector.rs - 候选掩码选择
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

use thiserror::Error;
use tracing::debug;

use crate::tensor::Tensor;

pub const SELECTED_MASK_TENSOR_NAME: &str = "selected_mask";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
  #[error("候选掩码集合为空")]
  EmptyCandidateSet,
  #[error("所有候选掩码得分均为 NaN")]
  NoValidScore,
  #[error("候选索引越界: {index} (共 {count} 个)")]
  IndexOutOfRange { index: usize, count: usize },
  #[error("候选掩码形状无效: {0}")]
  InvalidShape(String),
}

/// `[1, K, maskH, maskW]` 的批量掩码张量与长度为 K 的得分数组
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
  masks: Tensor,
  scores: Vec<f32>,
}

impl CandidateSet {
  pub fn new(masks: Tensor, scores: Vec<f32>) -> Result<Self, SelectorError> {
    let dims = masks.dims();
    if dims.len() != 4 || dims[0] != 1 {
      return Err(SelectorError::InvalidShape(format!(
        "期望 [1, K, H, W], 实际 {:?}",
        dims
      )));
    }
    if scores.len() != dims[1] {
      return Err(SelectorError::InvalidShape(format!(
        "得分数量 {} 与候选数量 {} 不符",
        scores.len(),
        dims[1]
      )));
    }
    Ok(Self { masks, scores })
  }

  pub fn count(&self) -> usize {
    self.scores.len()
  }

  /// `(maskH, maskW)`
  pub fn mask_dims(&self) -> (usize, usize) {
    let dims = self.masks.dims();
    (dims[2], dims[3])
  }

  pub fn masks(&self) -> &Tensor {
    &self.masks
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }
}

/// 得分最高的候选及其索引。并列时取第一个，NaN 视为负无穷且永不入选。
pub fn select_best(set: &CandidateSet) -> Result<(Tensor, usize), SelectorError> {
  if set.count() == 0 {
    return Err(SelectorError::EmptyCandidateSet);
  }

  let mut best: Option<(usize, f32)> = None;
  for (index, &score) in set.scores().iter().enumerate() {
    if score.is_nan() {
      continue;
    }
    match best {
      Some((_, top)) if score <= top => {}
      _ => best = Some((index, score)),
    }
  }

  let (index, score) = best.ok_or(SelectorError::NoValidScore)?;
  debug!("选择候选掩码 {} / {}, 得分 {:.4}", index, set.count(), score);
  Ok((slice_candidate(set, index)?, index))
}

/// 从批量缓冲区中取出第 `index` 个连续的 `maskH*maskW` 浮点块
pub fn slice_candidate(set: &CandidateSet, index: usize) -> Result<Tensor, SelectorError> {
  let count = set.count();
  if index >= count {
    return Err(SelectorError::IndexOutOfRange { index, count });
  }

  let (h, w) = set.mask_dims();
  let plane = h * w;
  let start = index * plane;
  let data = set.masks().data()[start..start + plane].to_vec();

  Tensor::new(SELECTED_MASK_TENSOR_NAME, vec![1, 1, h, w], data)
    .map_err(|e| SelectorError::InvalidShape(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn candidates(scores: Vec<f32>) -> CandidateSet {
    let k = scores.len();
    let data = (0..k).flat_map(|i| vec![i as f32; 4]).collect();
    let masks = Tensor::new("masks", vec![1, k, 2, 2], data).unwrap();
    CandidateSet::new(masks, scores).unwrap()
  }

  #[test]
  fn test_select_best_first_max_wins() {
    let set = candidates(vec![0.2, 0.9, 0.9]);
    let (mask, index) = select_best(&set).unwrap();
    assert_eq!(index, 1);
    assert_eq!(mask.data(), &[1.0; 4]);
    assert_eq!(mask.dims(), &[1, 1, 2, 2]);
  }

  #[test]
  fn test_select_best_skips_nan() {
    let set = candidates(vec![f32::NAN, 0.1]);
    assert_eq!(select_best(&set).unwrap().1, 1);

    let set = candidates(vec![0.3, f32::NAN, 0.2]);
    assert_eq!(select_best(&set).unwrap().1, 0);
  }

  #[test]
  fn test_select_best_negative_infinity_is_a_score() {
    let set = candidates(vec![f32::NAN, f32::NEG_INFINITY]);
    assert_eq!(select_best(&set).unwrap().1, 1);
  }

  #[test]
  fn test_select_best_empty_fails() {
    let set = candidates(vec![]);
    assert_eq!(select_best(&set), Err(SelectorError::EmptyCandidateSet));
  }

  #[test]
  fn test_select_best_all_nan_fails() {
    let set = candidates(vec![f32::NAN, f32::NAN]);
    assert_eq!(select_best(&set), Err(SelectorError::NoValidScore));
  }

  #[test]
  fn test_slice_candidate_bounds() {
    let set = candidates(vec![0.1, 0.2, 0.3]);
    assert_eq!(slice_candidate(&set, 2).unwrap().data(), &[2.0; 4]);
    assert_eq!(
      slice_candidate(&set, 3),
      Err(SelectorError::IndexOutOfRange { index: 3, count: 3 })
    );
  }

  #[test]
  fn test_candidate_set_validates_shape() {
    let masks = Tensor::new("masks", vec![1, 3, 2, 2], vec![0.0; 12]).unwrap();
    assert!(matches!(
      CandidateSet::new(masks, vec![0.1, 0.2]),
      Err(SelectorError::InvalidShape(_))
    ));
    let masks = Tensor::new("masks", vec![3, 4], vec![0.0; 12]).unwrap();
    assert!(CandidateSet::new(masks, vec![0.1, 0.2, 0.3]).is_err());
  }
}
