// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/metrics.rs - 会话统计
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

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{engine::DeviceInfo, session::SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
  Load,
  Encode,
  Decode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastOperation {
  pub kind: OperationKind,
  pub duration: Duration,
  pub succeeded: bool,
  pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
  pub state: SessionState,
  pub device: Option<DeviceInfo>,
  pub encode_count: u64,
  pub decode_count: u64,
  pub failure_count: u64,
  pub busy_rejections: u64,
  pub total_encode_time: Duration,
  pub total_decode_time: Duration,
  pub last_operation: Option<LastOperation>,
}

impl Metrics {
  pub(crate) fn record(&mut self, kind: OperationKind, duration: Duration, succeeded: bool) {
    if succeeded {
      match kind {
        OperationKind::Encode => {
          self.encode_count += 1;
          self.total_encode_time += duration;
        }
        OperationKind::Decode => {
          self.decode_count += 1;
          self.total_decode_time += duration;
        }
        OperationKind::Load => {}
      }
    } else {
      self.failure_count += 1;
    }

    self.last_operation = Some(LastOperation {
      kind,
      duration,
      succeeded,
      finished_at: Utc::now(),
    });
  }

  pub fn average_decode_time(&self) -> Option<Duration> {
    (self.decode_count > 0).then(|| self.total_decode_time / self.decode_count as u32)
  }
}
