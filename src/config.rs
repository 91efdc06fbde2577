// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 会话配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  codec::{MaskStyle, Normalization},
  engine::ModelSpec,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析配置文件失败: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  pub model: ModelSpec,
  pub normalization: Normalization,
  pub mask_style: MaskStyle,
}

impl SessionConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let config = Self::from_json_str(&text)?;
    debug!("配置内容: {:?}", config);
    Ok(config)
  }

  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let config: SessionConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    self
      .model
      .input_size
      .validate()
      .map_err(|e| ConfigError::Invalid(format!("模型输入尺寸: {}", e)))?;
    self
      .model
      .mask_size
      .validate()
      .map_err(|e| ConfigError::Invalid(format!("掩码尺寸: {}", e)))?;
    if self.model.channels != 3 {
      return Err(ConfigError::Invalid(format!(
        "仅支持 3 通道输入, 实际为 {}",
        self.model.channels
      )));
    }
    self.normalization.validate().map_err(ConfigError::Invalid)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;
  use crate::{codec::AlphaMode, geometry::Dimensions};

  #[test]
  fn test_empty_json_uses_defaults() {
    let config = SessionConfig::from_json_str("{}").unwrap();
    assert_eq!(config, SessionConfig::default());
    assert_eq!(config.model.input_size, Dimensions::square(1024));
    assert_eq!(config.mask_style.color, [0, 114, 189]);
  }

  #[test]
  fn test_partial_override() {
    let config = SessionConfig::from_json_str(
      r#"{
        "model": {
          "input_size": { "w": 512, "h": 512 },
          "mask_size": { "w": 128, "h": 128 },
          "channels": 3
        },
        "mask_style": { "color": [255, 0, 0], "alpha": { "mode": "sigmoid" } }
      }"#,
    )
    .unwrap();
    assert_eq!(config.model.input_size, Dimensions::square(512));
    assert_eq!(config.mask_style.alpha, AlphaMode::Sigmoid);
    assert_eq!(config.normalization, Normalization::default());
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let mut config = SessionConfig::default();
    config.model.channels = 4;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = SessionConfig::default();
    config.model.mask_size = Dimensions { w: 0, h: 256 };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = SessionConfig::default();
    config.normalization.std = [0.2, 0.0, 0.2];
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
  }

  #[test]
  fn test_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "mask_style": {{ "color": [1, 2, 3] }} }}"#).unwrap();
    let config = SessionConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.mask_style.color, [1, 2, 3]);

    assert!(matches!(
      SessionConfig::from_json_str("{ not json"),
      Err(ConfigError::Parse(_))
    ));
  }
}
