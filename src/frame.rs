// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - RGBA 像素帧定义
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

use image::RgbaImage;
use thiserror::Error;

use crate::geometry::Dimensions;

pub const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸为零: {0}")]
  ZeroSize(Dimensions),
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 交错排列（HWC）的 RGBA 像素缓冲区
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
  dims: Dimensions,
  data: Box<[u8]>,
}

impl RgbaFrame {
  pub fn new(dims: Dimensions, data: Vec<u8>) -> Result<Self, FrameError> {
    if dims.w == 0 || dims.h == 0 {
      return Err(FrameError::ZeroSize(dims));
    }

    let expected = dims.area() * RGBA_CHANNELS;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      dims,
      data: data.into_boxed_slice(),
    })
  }

  /// 以同一像素值填充整帧
  pub fn filled(dims: Dimensions, pixel: [u8; 4]) -> Result<Self, FrameError> {
    let data = pixel.repeat(dims.area());
    Self::new(dims, data)
  }

  pub fn transparent(dims: Dimensions) -> Result<Self, FrameError> {
    Self::filled(dims, [0, 0, 0, 0])
  }

  pub fn dims(&self) -> Dimensions {
    self.dims
  }

  pub fn width(&self) -> u32 {
    self.dims.w
  }

  pub fn height(&self) -> u32 {
    self.dims.h
  }

  pub fn channels(&self) -> usize {
    RGBA_CHANNELS
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  pub fn into_raw(self) -> Vec<u8> {
    self.data.into_vec()
  }

  fn offset(&self, x: u32, y: u32) -> usize {
    (y as usize * self.dims.w as usize + x as usize) * RGBA_CHANNELS
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
    let i = self.offset(x, y);
    [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
  }

  pub fn put_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
    let i = self.offset(x, y);
    self.data[i..i + RGBA_CHANNELS].copy_from_slice(&pixel);
  }

  pub fn alpha(&self, x: u32, y: u32) -> u8 {
    self.data[self.offset(x, y) + 3]
  }

  /// 按行优先顺序遍历 alpha 通道
  pub fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
    self.data.chunks_exact(RGBA_CHANNELS).map(|px| px[3])
  }

  pub fn to_rgba_image(&self) -> Result<RgbaImage, FrameError> {
    RgbaImage::from_raw(self.dims.w, self.dims.h, self.data.to_vec()).ok_or(
      FrameError::LengthMismatch {
        expected: self.dims.area() * RGBA_CHANNELS,
        actual: self.data.len(),
      },
    )
  }
}

impl AsMut<[u8]> for RgbaFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsRef<[u8]> for RgbaFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl TryFrom<RgbaImage> for RgbaFrame {
  type Error = FrameError;

  fn try_from(image: RgbaImage) -> Result<Self, Self::Error> {
    let (width, height) = image.dimensions();
    RgbaFrame::new(Dimensions::new(width, height), image.into_raw())
  }
}
