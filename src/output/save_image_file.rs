// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  codec::CodecError,
  frame::RgbaFrame,
  output::{DEFAULT_OVERLAY_OPACITY, Render, RenderMode},
};

/// `image:///path/out.png?mode=cutout|overlay|mask&opacity=0.7`
pub struct SaveImageFileOutput {
  path: PathBuf,
  mode: RenderMode,
  opacity: f32,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("合成错误: {0}")]
  ComposeError(#[from] CodecError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出参数无效: {0}")]
  InvalidParameter(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = urlencoding::decode(uri.path())
      .map_err(|e| SaveImageFileError::InvalidParameter(e.to_string()))?;
    let mut output = SaveImageFileOutput {
      path: PathBuf::from(path.as_ref()),
      mode: RenderMode::default(),
      opacity: DEFAULT_OVERLAY_OPACITY,
    };

    for (k, v) in uri.query_pairs() {
      match k.as_ref() {
        "mode" => {
          output.mode = v.parse().map_err(SaveImageFileError::InvalidParameter)?;
        }
        "opacity" => {
          output.opacity = v
            .parse()
            .map_err(|_| SaveImageFileError::InvalidParameter(format!("opacity={}", v)))?;
        }
        _ => debug!("忽略未知的输出参数: {}={}", k, v),
      }
    }

    Ok(output)
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn mode(&self) -> RenderMode {
    self.mode
  }

  fn save_image(&self, frame: &RgbaFrame) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    frame
      .to_rgba_image()
      .map_err(CodecError::from)?
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    warn!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<RgbaFrame, RgbaFrame> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbaFrame, mask: &RgbaFrame) -> Result<(), Self::Error> {
    let image = self.mode.compose(frame, mask, self.opacity)?;
    self.save_image(&image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Dimensions;

  #[test]
  fn test_parse_query() {
    let url = Url::parse("image:///tmp/out.png?mode=overlay&opacity=0.5").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.mode(), RenderMode::Overlay);
    assert_eq!(output.path(), Path::new("/tmp/out.png"));

    let url = Url::parse("image:///tmp/out.png?mode=blur").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::InvalidParameter(_))
    ));
  }

  #[test]
  fn test_save_mask_creates_parent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.png");
    let url = Url::parse(&format!("image://{}?mode=mask", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let image = RgbaFrame::filled(Dimensions::new(3, 2), [1, 2, 3, 255]).unwrap();
    let mask = RgbaFrame::filled(Dimensions::new(3, 2), [0, 114, 189, 255]).unwrap();
    output.render_result(&image, &mask).unwrap();

    let saved = image::open(&path).unwrap().into_rgba8();
    assert_eq!(saved.dimensions(), (3, 2));
    assert_eq!(saved.get_pixel(1, 1).0, [0, 114, 189, 255]);
  }
}
