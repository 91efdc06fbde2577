// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use std::str::FromStr;

#[cfg(feature = "save_image_file")]
use image::Rgba;
#[cfg(feature = "save_image_file")]
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use thiserror::Error;
use url::Url;

#[cfg(feature = "save_image_file")]
use crate::codec::mask_bounds;
use crate::{
  FromUrl,
  codec::{CodecError, apply_mask, overlay_mask},
  frame::RgbaFrame,
};

/// 消费图像与其掩码（同一分辨率）的像素输出
pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
  /// 只保留掩码内的像素
  #[default]
  Cutout,
  /// 掩码半透明叠加在原图上并描出包围盒
  Overlay,
  /// 只输出掩码本身
  Mask,
}

impl FromStr for RenderMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cutout" => Ok(RenderMode::Cutout),
      "overlay" => Ok(RenderMode::Overlay),
      "mask" => Ok(RenderMode::Mask),
      other => Err(format!("未知的输出模式: {}", other)),
    }
  }
}

impl RenderMode {
  pub fn compose(
    self,
    image: &RgbaFrame,
    mask: &RgbaFrame,
    opacity: f32,
  ) -> Result<RgbaFrame, CodecError> {
    match self {
      RenderMode::Cutout => apply_mask(image, mask),
      RenderMode::Mask => Ok(mask.clone()),
      RenderMode::Overlay => draw_bounds(overlay_mask(image, mask, opacity)?, mask),
    }
  }
}

/// 以掩码颜色描出掩码包围盒
#[cfg(feature = "save_image_file")]
fn draw_bounds(frame: RgbaFrame, mask: &RgbaFrame) -> Result<RgbaFrame, CodecError> {
  let Some(bounds) = mask_bounds(mask) else {
    return Ok(frame);
  };

  let [r, g, b, _] = mask.pixel(bounds.left, bounds.top);
  let mut canvas = frame.to_rgba_image()?;
  let rect =
    Rect::at(bounds.left as i32, bounds.top as i32).of_size(bounds.width(), bounds.height());
  draw_hollow_rect_mut(&mut canvas, rect, Rgba([r, g, b, 255]));
  Ok(RgbaFrame::try_from(canvas)?)
}

#[cfg(not(feature = "save_image_file"))]
fn draw_bounds(frame: RgbaFrame, _mask: &RgbaFrame) -> Result<RgbaFrame, CodecError> {
  Ok(frame)
}

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "save_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == SaveImageFileOutput::SCHEME {
        let output = SaveImageFileOutput::from_url(url)?;
        return Ok(OutputWrapper::SaveImageFileOutput(output));
      }
    }
    Err(OutputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Render<RgbaFrame, RgbaFrame> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbaFrame, result: &RgbaFrame) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[allow(unreachable_patterns)]
      _ => {
        let _ = (frame, result);
        Ok(())
      }
    }
  }
}
