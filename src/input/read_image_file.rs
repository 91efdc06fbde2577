// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  codec::{CodecError, pad_to_square},
  frame::{FrameError, RgbaFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码失败: {0}")]
  PathDecode(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("图像帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("图像填充错误: {0}")]
  PadError(#[from] CodecError),
}

/// `image:///path/to/file.jpg[?pad=false]`
///
/// 默认将图像居中填充为正方形，与模型的正方形输入对应。
pub struct ImageFileInput {
  frame: Option<RgbaFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let pad = !url
      .query_pairs()
      .any(|(k, v)| k == "pad" && (v == "false" || v == "0"));

    let path = urlencoding::decode(url.path())
      .map_err(|e| ImageFileInputError::PathDecode(e.to_string()))?;
    let image = ImageReader::open(path.as_ref())?.decode()?.into_rgba8();
    info!(
      "读取图像 {}: {}x{}",
      path,
      image.width(),
      image.height()
    );

    let frame = RgbaFrame::try_from(image)?;
    let frame = if pad { pad_to_square(&frame)? } else { frame };

    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbaFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
