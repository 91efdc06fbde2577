// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/protocol.rs - 调用方与会话之间的消息协议
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

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
  codec::{CodecError, MaskStyle, decode_mask_tensor},
  engine::{DeviceInfo, LoadPhase},
  frame::RgbaFrame,
  geometry::Dimensions,
  prompt::PointPrompt,
  selector::CandidateSet,
  session::{ErrorReport, Metrics},
  tensor::Tensor,
};

/// 单调递增的请求关联号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone)]
pub enum Request {
  Initialize,
  /// `[1, C, H, W]` 平面浮点张量
  EncodeImage(Tensor),
  DecodeMask {
    prompts: Vec<PointPrompt>,
    /// 显式先验掩码，缺省时使用会话缓存的上一次掩码
    prior_mask: Option<Tensor>,
  },
  ResetMask,
  ResetSession,
  Stats,
}

impl Request {
  pub fn name(&self) -> &'static str {
    match self {
      Request::Initialize => "initialize",
      Request::EncodeImage(_) => "encode_image",
      Request::DecodeMask { .. } => "decode_mask",
      Request::ResetMask => "reset_mask",
      Request::ResetSession => "reset_session",
      Request::Stats => "stats",
    }
  }
}

/// 一次解码的结果：选中的掩码、其索引与全部候选
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
  pub selected: Arc<Tensor>,
  pub index: usize,
  pub candidates: CandidateSet,
  pub duration: Duration,
}

impl DecodeOutcome {
  pub fn scores(&self) -> &[f32] {
    self.candidates.scores()
  }

  pub fn best_score(&self) -> f32 {
    self.candidates.scores()[self.index]
  }

  /// 掩码分辨率下的 RGBA 缓冲区
  pub fn mask_frame(&self, style: &MaskStyle) -> Result<RgbaFrame, CodecError> {
    let (h, w) = self.candidates.mask_dims();
    decode_mask_tensor(&self.selected, Dimensions::new(w as u32, h as u32), style)
  }
}

#[derive(Debug, Clone)]
pub enum Reply {
  Initialized(DeviceInfo),
  Encoded { duration: Duration },
  Decoded(Box<DecodeOutcome>),
  MaskReset,
  SessionReset,
  Stats(Box<Metrics>),
}

impl Reply {
  pub fn name(&self) -> &'static str {
    match self {
      Reply::Initialized(_) => "initialized",
      Reply::Encoded { .. } => "encoded",
      Reply::Decoded(_) => "decoded",
      Reply::MaskReset => "mask_reset",
      Reply::SessionReset => "session_reset",
      Reply::Stats(_) => "stats",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Envelope {
  pub id: RequestId,
  pub request: Request,
}

#[derive(Debug, Clone)]
pub struct Response {
  pub id: RequestId,
  pub result: Result<Reply, ErrorReport>,
}

/// 工作线程发往调用方的事件
#[derive(Debug, Clone)]
pub enum WorkerEvent {
  Progress { id: RequestId, phase: LoadPhase },
  Response(Response),
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::AlphaMode;

  #[test]
  fn test_outcome_mask_frame() {
    let masks = Tensor::new("masks", vec![1, 2, 1, 2], vec![-1.0, 1.0, 5.0, 5.0]).unwrap();
    let candidates = CandidateSet::new(masks, vec![0.9, 0.1]).unwrap();
    let outcome = DecodeOutcome {
      selected: Arc::new(Tensor::new("selected_mask", vec![1, 1, 1, 2], vec![-1.0, 1.0]).unwrap()),
      index: 0,
      candidates,
      duration: Duration::ZERO,
    };
    assert_eq!(outcome.best_score(), 0.9);

    let style = MaskStyle {
      color: [1, 2, 3],
      alpha: AlphaMode::Binary { threshold: 0.0 },
    };
    let frame = outcome.mask_frame(&style).unwrap();
    assert_eq!(frame.dims(), Dimensions::new(2, 1));
    assert_eq!(frame.pixel(0, 0), [1, 2, 3, 0]);
    assert_eq!(frame.pixel(1, 0), [1, 2, 3, 255]);
  }

  #[test]
  fn test_request_ids_order() {
    assert!(RequestId(1) < RequestId(2));
    assert_eq!(RequestId(7).to_string(), "#7");
  }
}
