// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - 命名浮点张量
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

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量 {name} 形状 {dims:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  ShapeMismatch {
    name: String,
    dims: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("张量 {name} 形状 {dims:?} 无效")]
  InvalidShape { name: String, dims: Vec<usize> },
}

/// 具名多维浮点缓冲区，`data.len()` 恒等于 `dims` 各维之积。
///
/// 构造后不可变；在流水线各阶段之间按值移交。
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  name: String,
  dims: Vec<usize>,
  data: Box<[f32]>,
}

/// 各维之积，溢出时返回 `None`
pub fn element_count(dims: &[usize]) -> Option<usize> {
  dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
  pub fn new(
    name: impl Into<String>,
    dims: Vec<usize>,
    data: Vec<f32>,
  ) -> Result<Self, TensorError> {
    let name = name.into();
    if dims.is_empty() {
      return Err(TensorError::InvalidShape { name, dims });
    }

    let expected = match element_count(&dims) {
      Some(n) => n,
      None => return Err(TensorError::InvalidShape { name, dims }),
    };

    if data.len() != expected {
      return Err(TensorError::ShapeMismatch {
        name,
        dims,
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      name,
      dims,
      data: data.into_boxed_slice(),
    })
  }

  pub fn zeros(name: impl Into<String>, dims: Vec<usize>) -> Result<Self, TensorError> {
    let len = element_count(&dims).unwrap_or(0);
    Self::new(name, dims, vec![0.0; len])
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn dims(&self) -> &[usize] {
    &self.dims
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn into_data(self) -> Vec<f32> {
    self.data.into_vec()
  }

  pub fn renamed(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn has_dims(&self, dims: &[usize]) -> bool {
    self.dims == dims
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tensor_length_matches_dims() {
    let t = Tensor::new("x", vec![1, 2, 3], vec![0.5; 6]).unwrap();
    assert_eq!(t.len(), 6);
    assert_eq!(t.dims(), &[1, 2, 3]);
    assert_eq!(t.name(), "x");
  }

  #[test]
  fn test_tensor_rejects_mismatch() {
    let err = Tensor::new("x", vec![2, 2], vec![0.0; 3]).unwrap_err();
    assert!(matches!(err, TensorError::ShapeMismatch { expected: 4, actual: 3, .. }));
  }

  #[test]
  fn test_tensor_rejects_empty_dims_and_overflow() {
    assert!(matches!(
      Tensor::new("x", vec![], vec![]),
      Err(TensorError::InvalidShape { .. })
    ));
    assert!(matches!(
      Tensor::new("x", vec![usize::MAX, 2], vec![]),
      Err(TensorError::InvalidShape { .. })
    ));
  }

  #[test]
  fn test_zero_sized_dimension_is_empty() {
    let t = Tensor::zeros("scores", vec![0]).unwrap();
    assert!(t.is_empty());
  }
}
