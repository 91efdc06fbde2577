// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - 坐标空间换算与信箱（letterbox）布局
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
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("尺寸无效: {w}x{h}, 宽高必须为正整数")]
  InvalidDimensions { w: u32, h: u32 },
  #[error("显示区域无效: {width}x{height}")]
  InvalidDisplayRect { width: f32, height: f32 },
}

/// 像素尺寸 `{w, h}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
  pub w: u32,
  pub h: u32,
}

impl Dimensions {
  pub const fn new(w: u32, h: u32) -> Self {
    Self { w, h }
  }

  pub const fn square(side: u32) -> Self {
    Self { w: side, h: side }
  }

  /// 宽高均为正时返回自身
  pub fn validate(self) -> Result<Self, GeometryError> {
    if self.w == 0 || self.h == 0 {
      return Err(GeometryError::InvalidDimensions {
        w: self.w,
        h: self.h,
      });
    }
    Ok(self)
  }

  pub fn area(&self) -> usize {
    self.w as usize * self.h as usize
  }

  pub fn is_square(&self) -> bool {
    self.w == self.h
  }
}

impl std::fmt::Display for Dimensions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}x{}", self.w, self.h)
  }
}

/// 源矩形在目标矩形中的摆放位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterBox {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

impl LetterBox {
  /// 四舍五入到整数像素，宽高至少为 1
  pub fn to_pixels(&self) -> (u32, u32, u32, u32) {
    (
      self.x.max(0.0) as u32,
      self.y.max(0.0) as u32,
      (self.w.round() as u32).max(1),
      (self.h.round() as u32).max(1),
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 画布在屏幕上的显示区域（屏幕像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
  pub left: f32,
  pub top: f32,
  pub width: f32,
  pub height: f32,
}

impl DisplayRect {
  pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  fn validate(&self) -> Result<(), GeometryError> {
    let ok = self.width.is_finite()
      && self.height.is_finite()
      && self.width > 0.0
      && self.height > 0.0;
    if !ok {
      return Err(GeometryError::InvalidDisplayRect {
        width: self.width,
        height: self.height,
      });
    }
    Ok(())
  }
}

/// 等比缩放源矩形使其适配目标矩形，并在较短轴上居中。
///
/// 受限轴精确等于目标边长；另一轴的偏移向下取整到整数像素。
pub fn compute_letterbox(
  source: Dimensions,
  target: Dimensions,
) -> Result<LetterBox, GeometryError> {
  let source = source.validate()?;
  let target = target.validate()?;

  let (sw, sh) = (source.w as f64, source.h as f64);
  let (tw, th) = (target.w as f64, target.h as f64);

  // sw/sh >= tw/th 时宽度受限，用整数乘法比较避免舍入
  let width_limited = source.w as u64 * target.h as u64 >= source.h as u64 * target.w as u64;

  let (w, h) = if width_limited {
    (tw, sh * tw / sw)
  } else {
    (sw * th / sh, th)
  };

  let x = ((tw - w) / 2.0).floor();
  let y = ((th - h) / 2.0).floor();

  Ok(LetterBox {
    x: x as f32,
    y: y as f32,
    w: w as f32,
    h: h as f32,
  })
}

/// 将屏幕像素坐标换算到模型输入空间，两轴独立缩放
pub fn map_pointer_to_model_space(
  pointer: Point,
  display: DisplayRect,
  model: Dimensions,
) -> Result<Point, GeometryError> {
  display.validate()?;
  let model = model.validate()?;

  let scale_x = model.w as f32 / display.width;
  let scale_y = model.h as f32 / display.height;

  Ok(Point {
    x: (pointer.x - display.left) * scale_x,
    y: (pointer.y - display.top) * scale_y,
  })
}

/// `map_pointer_to_model_space` 的逆变换
pub fn map_model_to_display(
  point: Point,
  display: DisplayRect,
  model: Dimensions,
) -> Result<Point, GeometryError> {
  display.validate()?;
  let model = model.validate()?;

  Ok(Point {
    x: display.left + point.x * display.width / model.w as f32,
    y: display.top + point.y * display.height / model.h as f32,
  })
}

/// 图像像素坐标到模型输入空间：图像按信箱方式摆放在模型输入中
pub fn map_image_to_model_space(
  point: Point,
  image: Dimensions,
  model: Dimensions,
) -> Result<Point, GeometryError> {
  let placement = compute_letterbox(image, model)?;
  let rect = DisplayRect::new(placement.x, placement.y, placement.w, placement.h);
  map_model_to_display(point, rect, image)
}
