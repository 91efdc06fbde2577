// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session.rs - 分割会话
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

mod controller;
mod error;
mod metrics;
mod protocol;
mod state;
mod worker;

pub use self::controller::{Job, JobOutcome, JobOutput, SessionController, Step};
pub use self::error::{ErrorKind, ErrorReport, SessionError};
pub use self::metrics::{LastOperation, Metrics, OperationKind};
pub use self::protocol::{
  DecodeOutcome, Envelope, Reply, Request, RequestId, Response, WorkerEvent,
};
pub use self::state::{SessionCache, SessionState};
pub use self::worker::{SessionClient, SessionWorker};
pub use crate::prompt::ClickSequence;

use crate::{
  codec::{MaskStyle, encode_image_tensor},
  config::SessionConfig,
  engine::{DeviceInfo, InferenceEngine, LoadPhase},
  frame::RgbaFrame,
  prompt::PointPrompt,
  tensor::Tensor,
};

/// 任务驱动所需的分割会话操作，由同线程会话与工作线程客户端共同实现
pub trait Segmenter {
  type Error: std::error::Error + Send + Sync + 'static;

  fn initialize(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, Self::Error>;
  fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, Self::Error>;
  fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, Self::Error>;
  fn reset_mask(&mut self) -> Result<(), Self::Error>;
  fn stats(&mut self) -> Result<Metrics, Self::Error>;
  fn session_config(&self) -> &SessionConfig;

  fn mask_style(&self) -> &MaskStyle {
    &self.session_config().mask_style
  }
}

/// 在调用方线程中驱动的会话，与工作线程版本共用同一状态机
pub struct Session<E> {
  engine: E,
  controller: SessionController,
}

impl<E: InferenceEngine> Session<E> {
  pub fn new(engine: E, config: SessionConfig) -> Self {
    Self {
      engine,
      controller: SessionController::new(config),
    }
  }

  pub fn state(&self) -> SessionState {
    self.controller.state()
  }

  pub fn cache(&self) -> &SessionCache {
    self.controller.cache()
  }

  pub fn config(&self) -> &SessionConfig {
    self.controller.config()
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn handle(
    &mut self,
    request: Request,
    progress: &mut dyn FnMut(LoadPhase),
  ) -> Result<Reply, SessionError> {
    match self.controller.begin(request) {
      Step::Reply(result) => result,
      Step::Run(job) => {
        let outcome = job.run(&mut self.engine, progress);
        self.controller.complete(outcome)
      }
    }
  }

  pub fn initialize(
    &mut self,
    progress: &mut dyn FnMut(LoadPhase),
  ) -> Result<DeviceInfo, SessionError> {
    match self.handle(Request::Initialize, progress)? {
      Reply::Initialized(device) => Ok(device),
      other => Err(SessionError::UnexpectedReply(other.name())),
    }
  }

  pub fn encode_image(&mut self, image: Tensor) -> Result<Duration, SessionError> {
    match self.handle(Request::EncodeImage(image), &mut |_| {})? {
      Reply::Encoded { duration } => Ok(duration),
      other => Err(SessionError::UnexpectedReply(other.name())),
    }
  }

  pub fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, SessionError> {
    let config = self.controller.config();
    let tensor = encode_image_tensor(frame, config.model.input_size, &config.normalization)?;
    self.encode_image(tensor)
  }

  pub fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, SessionError> {
    match self.handle(Request::DecodeMask { prompts, prior_mask }, &mut |_| {})? {
      Reply::Decoded(outcome) => Ok(*outcome),
      other => Err(SessionError::UnexpectedReply(other.name())),
    }
  }

  pub fn reset_mask(&mut self) -> Result<(), SessionError> {
    self.handle(Request::ResetMask, &mut |_| {}).map(|_| ())
  }

  pub fn reset_session(&mut self) -> Result<(), SessionError> {
    self.handle(Request::ResetSession, &mut |_| {}).map(|_| ())
  }

  pub fn stats(&self) -> Metrics {
    self.controller.stats()
  }
}

impl<E: InferenceEngine> Segmenter for Session<E> {
  type Error = SessionError;

  fn initialize(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, Self::Error> {
    Session::initialize(self, progress)
  }

  fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, Self::Error> {
    Session::encode_frame(self, frame)
  }

  fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, Self::Error> {
    Session::decode_mask(self, prompts, prior_mask)
  }

  fn reset_mask(&mut self) -> Result<(), Self::Error> {
    Session::reset_mask(self)
  }

  fn stats(&mut self) -> Result<Metrics, Self::Error> {
    Ok(Session::stats(self))
  }

  fn session_config(&self) -> &SessionConfig {
    self.config()
  }
}

impl Segmenter for SessionClient {
  type Error = ErrorReport;

  fn initialize(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, Self::Error> {
    SessionClient::initialize(self, progress)
  }

  fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, Self::Error> {
    SessionClient::encode_frame(self, frame)
  }

  fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, Self::Error> {
    SessionClient::decode_mask(self, prompts, prior_mask)
  }

  fn reset_mask(&mut self) -> Result<(), Self::Error> {
    SessionClient::reset_mask(self)
  }

  fn stats(&mut self) -> Result<Metrics, Self::Error> {
    SessionClient::stats(self)
  }

  fn session_config(&self) -> &SessionConfig {
    self.config()
  }
}

impl<S: Segmenter + ?Sized> Segmenter for &mut S {
  type Error = S::Error;

  fn initialize(&mut self, progress: &mut dyn FnMut(LoadPhase)) -> Result<DeviceInfo, Self::Error> {
    (**self).initialize(progress)
  }

  fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, Self::Error> {
    (**self).encode_frame(frame)
  }

  fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, Self::Error> {
    (**self).decode_mask(prompts, prior_mask)
  }

  fn reset_mask(&mut self) -> Result<(), Self::Error> {
    (**self).reset_mask()
  }

  fn stats(&mut self) -> Result<Metrics, Self::Error> {
    (**self).stats()
  }

  fn session_config(&self) -> &SessionConfig {
    (**self).session_config()
  }
}
