// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/error.rs - 会话错误与错误分类
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

use crate::{
  codec::CodecError, engine::EngineError, selector::SelectorError, session::SessionState,
};

/// 机器可读的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Initialization,
  InvalidDimensions,
  Encoding,
  Decoding,
  EmptyCandidateSet,
  IndexOutOfRange,
  Busy,
  InvalidState,
  Disconnected,
}

impl ErrorKind {
  /// 调用方是否可以修正输入或稍后重试
  pub fn is_recoverable(self) -> bool {
    !matches!(
      self,
      ErrorKind::EmptyCandidateSet | ErrorKind::IndexOutOfRange | ErrorKind::Disconnected
    )
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ErrorKind::Initialization => "initialization",
      ErrorKind::InvalidDimensions => "invalid_dimensions",
      ErrorKind::Encoding => "encoding",
      ErrorKind::Decoding => "decoding",
      ErrorKind::EmptyCandidateSet => "empty_candidate_set",
      ErrorKind::IndexOutOfRange => "index_out_of_range",
      ErrorKind::Busy => "busy",
      ErrorKind::InvalidState => "invalid_state",
      ErrorKind::Disconnected => "disconnected",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("推理引擎初始化失败: {0}")]
  Initialization(EngineError),
  #[error("尺寸无效: {0}")]
  InvalidDimensions(String),
  #[error("图像编码失败: {0}")]
  Encoding(String),
  #[error("掩码解码失败: {0}")]
  Decoding(String),
  #[error("编码器推理失败: {0}")]
  EncoderEngine(EngineError),
  #[error("解码器推理失败: {0}")]
  DecoderEngine(EngineError),
  #[error("掩码选择失败: {0}")]
  Selector(#[from] SelectorError),
  #[error("会话忙, 当前状态 {0}, 请稍后重试")]
  Busy(SessionState),
  #[error("状态 {state} 下不能执行 {operation}")]
  InvalidState {
    state: SessionState,
    operation: &'static str,
  },
  #[error("收到意外的响应: {0}")]
  UnexpectedReply(&'static str),
  #[error("会话工作线程已断开")]
  Disconnected,
}

impl From<CodecError> for SessionError {
  fn from(err: CodecError) -> Self {
    match err {
      CodecError::InvalidDimensions(_) | CodecError::DimensionMismatch { .. } => {
        SessionError::InvalidDimensions(err.to_string())
      }
      CodecError::Encoding(msg) => SessionError::Encoding(msg),
      CodecError::Decoding(msg) => SessionError::Decoding(msg),
      CodecError::NothingToMerge => SessionError::Decoding(err.to_string()),
    }
  }
}

impl SessionError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      SessionError::Initialization(_) => ErrorKind::Initialization,
      SessionError::InvalidDimensions(_) => ErrorKind::InvalidDimensions,
      SessionError::Encoding(_) | SessionError::EncoderEngine(_) => ErrorKind::Encoding,
      SessionError::Decoding(_) | SessionError::DecoderEngine(_) => ErrorKind::Decoding,
      SessionError::Selector(err) => match err {
        SelectorError::EmptyCandidateSet | SelectorError::NoValidScore => {
          ErrorKind::EmptyCandidateSet
        }
        SelectorError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
        SelectorError::InvalidShape(_) => ErrorKind::Decoding,
      },
      SessionError::Busy(_) => ErrorKind::Busy,
      SessionError::InvalidState { .. } | SessionError::UnexpectedReply(_) => {
        ErrorKind::InvalidState
      }
      SessionError::Disconnected => ErrorKind::Disconnected,
    }
  }

  /// 面向用户的单行状态描述
  pub fn status(&self) -> String {
    self.to_string()
  }

  pub fn report(&self) -> ErrorReport {
    ErrorReport {
      kind: self.kind(),
      message: self.status(),
    }
  }
}

/// 跨越工作线程边界传递的错误
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{kind}] {message}")]
pub struct ErrorReport {
  pub kind: ErrorKind,
  pub message: String,
}

impl From<SessionError> for ErrorReport {
  fn from(err: SessionError) -> Self {
    err.report()
  }
}

impl From<CodecError> for ErrorReport {
  fn from(err: CodecError) -> Self {
    SessionError::from(err).report()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::GeometryError;

  #[test]
  fn test_error_kinds() {
    assert_eq!(
      SessionError::Busy(SessionState::Decoding).kind(),
      ErrorKind::Busy
    );
    assert_eq!(
      SessionError::from(SelectorError::NoValidScore).kind(),
      ErrorKind::EmptyCandidateSet
    );
    assert_eq!(
      SessionError::from(SelectorError::IndexOutOfRange { index: 3, count: 3 }).kind(),
      ErrorKind::IndexOutOfRange
    );
    assert_eq!(
      SessionError::from(CodecError::InvalidDimensions(
        GeometryError::InvalidDimensions { w: 0, h: 1 }
      ))
      .kind(),
      ErrorKind::InvalidDimensions
    );
    assert_eq!(
      SessionError::EncoderEngine(EngineError::Runtime("oom".into())).kind(),
      ErrorKind::Encoding
    );
  }

  #[test]
  fn test_report_carries_status() {
    let report = SessionError::InvalidState {
      state: SessionState::Ready,
      operation: "decode_mask",
    }
    .report();
    assert_eq!(report.kind, ErrorKind::InvalidState);
    assert!(report.message.contains("decode_mask"));
    assert!(report.to_string().starts_with("[invalid_state]"));
  }

  #[test]
  fn test_report_serializes_kind_as_snake_case() {
    let report = ErrorReport {
      kind: ErrorKind::EmptyCandidateSet,
      message: "x".into(),
    };
    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(json, r#"{"kind":"empty_candidate_set","message":"x"}"#);
  }
}
