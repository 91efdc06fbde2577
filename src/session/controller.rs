// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/controller.rs - 会话状态机
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

//! 控制器本身不接触推理引擎。`begin` 决定立即回复或交给引擎执行的 `Job`，
//! 引擎执行完毕后由 `complete` 提交结果。两步之间状态处于
//! `Loading`/`Encoding`/`Decoding`，期间除 `Stats` 外的请求都以 `Busy` 拒绝。

use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  sync::Arc,
  time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
  config::SessionConfig,
  engine::{DecoderInput, DeviceInfo, EngineError, InferenceEngine, LoadPhase},
  prompt::PointPrompt,
  selector::{CandidateSet, select_best},
  session::{
    DecodeOutcome, Metrics, OperationKind, Reply, Request, SessionCache, SessionError,
    SessionState,
  },
  tensor::Tensor,
};

/// 需要在推理引擎上执行的工作
#[derive(Debug)]
pub enum Job {
  Load,
  Encode(Tensor),
  Decode(DecoderInput),
}

#[derive(Debug)]
pub enum JobOutput {
  Loaded(DeviceInfo),
  Encoded(Tensor),
  Decoded(CandidateSet),
}

#[derive(Debug)]
pub struct JobOutcome {
  pub result: Result<JobOutput, EngineError>,
  pub elapsed: Duration,
}

impl Job {
  pub fn kind(&self) -> OperationKind {
    match self {
      Job::Load => OperationKind::Load,
      Job::Encode(_) => OperationKind::Encode,
      Job::Decode(_) => OperationKind::Decode,
    }
  }

  pub fn run<E: InferenceEngine + ?Sized>(
    self,
    engine: &mut E,
    progress: &mut dyn FnMut(LoadPhase),
  ) -> JobOutcome {
    let now = Instant::now();
    let kind = self.kind();
    let result = panic::catch_unwind(AssertUnwindSafe(move || match self {
      Job::Load => engine.load(progress).map(JobOutput::Loaded),
      Job::Encode(image) => engine.encode(image).map(JobOutput::Encoded),
      Job::Decode(input) => engine.decode(input).map(JobOutput::Decoded),
    }))
    .unwrap_or_else(|payload| {
      let message = panic_message(payload.as_ref());
      error!("推理引擎在 {:?} 中崩溃: {}", kind, message);
      Err(EngineError::Runtime(format!("推理引擎崩溃: {}", message)))
    });
    JobOutcome {
      result,
      elapsed: now.elapsed(),
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "未知错误"
  }
}

impl JobOutcome {
  /// 任务未能得到执行结果
  pub fn aborted(reason: impl Into<String>) -> Self {
    Self {
      result: Err(EngineError::Runtime(reason.into())),
      elapsed: Duration::ZERO,
    }
  }
}

pub enum Step {
  Reply(Result<Reply, SessionError>),
  Run(Job),
}

#[derive(Debug)]
enum Pending {
  Load { previous: SessionState },
  Encode { previous: SessionState },
  Decode { prompts: Vec<PointPrompt> },
}

#[derive(Debug)]
pub struct SessionController {
  config: SessionConfig,
  state: SessionState,
  cache: SessionCache,
  device: Option<DeviceInfo>,
  metrics: Metrics,
  pending: Option<Pending>,
}

impl SessionController {
  pub fn new(config: SessionConfig) -> Self {
    Self {
      config,
      state: SessionState::Idle,
      cache: SessionCache::default(),
      device: None,
      metrics: Metrics::default(),
      pending: None,
    }
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn cache(&self) -> &SessionCache {
    &self.cache
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn device(&self) -> Option<&DeviceInfo> {
    self.device.as_ref()
  }

  pub fn stats(&self) -> Metrics {
    let mut metrics = self.metrics.clone();
    metrics.state = self.state;
    metrics.device = self.device.clone();
    metrics
  }

  fn transition(&mut self, next: SessionState) {
    if self.state != next {
      debug!("会话状态: {} -> {}", self.state, next);
      self.state = next;
    }
  }

  fn invalid(&self, operation: &'static str) -> Step {
    warn!("状态 {} 下拒绝 {}", self.state, operation);
    Step::Reply(Err(SessionError::InvalidState {
      state: self.state,
      operation,
    }))
  }

  pub fn begin(&mut self, request: Request) -> Step {
    if let Request::Stats = request {
      return Step::Reply(Ok(Reply::Stats(Box::new(self.stats()))));
    }

    if self.state.is_in_flight() || self.pending.is_some() {
      warn!("会话忙 ({}), 拒绝 {}", self.state, request.name());
      self.metrics.busy_rejections += 1;
      return Step::Reply(Err(SessionError::Busy(self.state)));
    }

    match request {
      Request::Initialize => self.begin_initialize(),
      Request::EncodeImage(image) => self.begin_encode(image),
      Request::DecodeMask {
        prompts,
        prior_mask,
      } => self.begin_decode(prompts, prior_mask),
      Request::ResetMask => self.reset_mask(),
      Request::ResetSession => self.reset_session(),
      Request::Stats => Step::Reply(Ok(Reply::Stats(Box::new(self.stats())))),
    }
  }

  fn begin_initialize(&mut self) -> Step {
    if self.state.is_loaded()
      && let Some(device) = &self.device
    {
      debug!("推理引擎已加载, 设备 {}", device);
      return Step::Reply(Ok(Reply::Initialized(device.clone())));
    }

    info!("开始加载推理引擎");
    self.pending = Some(Pending::Load {
      previous: self.state,
    });
    self.transition(SessionState::Loading);
    Step::Run(Job::Load)
  }

  fn begin_encode(&mut self, image: Tensor) -> Step {
    if !matches!(self.state, SessionState::Ready | SessionState::Encoded) {
      return self.invalid("encode_image");
    }

    let expected = self.config.model.image_dims();
    if !image.has_dims(&expected) {
      return Step::Reply(Err(SessionError::InvalidDimensions(format!(
        "图像张量形状 {:?}, 期望 {:?}",
        image.dims(),
        expected
      ))));
    }

    debug!("开始编码图像 {:?}", image.dims());
    self.pending = Some(Pending::Encode {
      previous: self.state,
    });
    self.transition(SessionState::Encoding);
    Step::Run(Job::Encode(image))
  }

  fn begin_decode(&mut self, prompts: Vec<PointPrompt>, prior_mask: Option<Tensor>) -> Step {
    if self.state != SessionState::Encoded {
      return self.invalid("decode_mask");
    }
    let Some(embedding) = self.cache.embedding.clone() else {
      return self.invalid("decode_mask");
    };

    if prompts.is_empty() {
      return Step::Reply(Err(SessionError::Decoding("提示点序列为空".to_string())));
    }
    if let Some(bad) = prompts.iter().find(|p| !p.is_finite()) {
      return Step::Reply(Err(SessionError::Decoding(format!(
        "提示点坐标无效: ({}, {})",
        bad.x, bad.y
      ))));
    }

    let prior_mask = match prior_mask {
      Some(mask) => {
        let expected = self.config.model.prior_mask_dims();
        if !mask.has_dims(&expected) {
          return Step::Reply(Err(SessionError::InvalidDimensions(format!(
            "先验掩码形状 {:?}, 期望 {:?}",
            mask.dims(),
            expected
          ))));
        }
        Some(Arc::new(mask))
      }
      None => self.cache.previous_mask.clone(),
    };

    debug!(
      "开始解码掩码, 提示点 {} 个, 先验掩码 {}",
      prompts.len(),
      if prior_mask.is_some() { "有" } else { "无" }
    );
    let input = DecoderInput {
      embedding,
      prompts: prompts.clone(),
      prior_mask,
    };
    self.pending = Some(Pending::Decode { prompts });
    self.transition(SessionState::Decoding);
    Step::Run(Job::Decode(input))
  }

  fn reset_mask(&mut self) -> Step {
    match self.state {
      SessionState::Encoded | SessionState::Ready => {
        debug!("清除掩码与提示历史");
        self.cache.clear_mask();
        Step::Reply(Ok(Reply::MaskReset))
      }
      _ => self.invalid("reset_mask"),
    }
  }

  fn reset_session(&mut self) -> Step {
    match self.state {
      SessionState::Encoded | SessionState::Ready => {
        debug!("清除会话数据");
        self.cache.clear();
        self.transition(SessionState::Ready);
        Step::Reply(Ok(Reply::SessionReset))
      }
      SessionState::Idle => Step::Reply(Ok(Reply::SessionReset)),
      _ => self.invalid("reset_session"),
    }
  }

  /// 提交引擎执行结果
  pub fn complete(&mut self, outcome: JobOutcome) -> Result<Reply, SessionError> {
    let Some(pending) = self.pending.take() else {
      error!("没有进行中的操作, 丢弃执行结果");
      return Err(SessionError::InvalidState {
        state: self.state,
        operation: "complete",
      });
    };

    let JobOutcome { result, elapsed } = outcome;
    match (pending, result) {
      (Pending::Load { .. }, Ok(JobOutput::Loaded(device))) => {
        info!("推理引擎加载完成, 设备 {}, 耗时 {:.2?}", device, elapsed);
        self.metrics.record(OperationKind::Load, elapsed, true);
        self.cache.clear();
        self.device = Some(device.clone());
        self.transition(SessionState::Ready);
        Ok(Reply::Initialized(device))
      }
      (Pending::Load { previous }, Err(err)) => {
        error!("推理引擎加载失败: {}", err);
        self.metrics.record(OperationKind::Load, elapsed, false);
        self.transition(previous);
        Err(SessionError::Initialization(err))
      }
      (Pending::Encode { .. }, Ok(JobOutput::Encoded(embedding))) => {
        info!("图像编码完成, 耗时 {:.2?}", elapsed);
        self.metrics.record(OperationKind::Encode, elapsed, true);
        self.cache.embedding = Some(Arc::new(embedding));
        self.cache.clear_mask();
        self.transition(SessionState::Encoded);
        Ok(Reply::Encoded { duration: elapsed })
      }
      (Pending::Encode { previous }, Err(err)) => {
        error!("图像编码失败: {}", err);
        self.metrics.record(OperationKind::Encode, elapsed, false);
        self.fail_or_restore(&err, previous);
        Err(SessionError::EncoderEngine(err))
      }
      (Pending::Decode { prompts }, Ok(JobOutput::Decoded(candidates))) => {
        match self.accept_candidates(prompts, candidates, elapsed) {
          Ok(outcome) => {
            self.metrics.record(OperationKind::Decode, elapsed, true);
            Ok(Reply::Decoded(Box::new(outcome)))
          }
          Err(err) => {
            error!("掩码解码结果无效: {}", err);
            self.metrics.record(OperationKind::Decode, elapsed, false);
            self.transition(SessionState::Encoded);
            Err(err)
          }
        }
      }
      (Pending::Decode { .. }, Err(err)) => {
        error!("掩码解码失败: {}", err);
        self.metrics.record(OperationKind::Decode, elapsed, false);
        self.fail_or_restore(&err, SessionState::Encoded);
        Err(SessionError::DecoderEngine(err))
      }
      (pending, Ok(output)) => {
        error!("执行结果 {:?} 与进行中的操作 {:?} 不符", output, pending);
        let previous = match pending {
          Pending::Load { previous } | Pending::Encode { previous } => previous,
          Pending::Decode { .. } => SessionState::Encoded,
        };
        self.transition(previous);
        Err(SessionError::UnexpectedReply("job_output"))
      }
    }
  }

  fn fail_or_restore(&mut self, err: &EngineError, previous: SessionState) {
    if err.is_fatal() {
      warn!("推理引擎运行错误, 会话进入 Failed, 需要重新初始化");
      self.cache.clear();
      self.device = None;
      self.transition(SessionState::Failed);
    } else {
      self.transition(previous);
    }
  }

  fn accept_candidates(
    &mut self,
    prompts: Vec<PointPrompt>,
    candidates: CandidateSet,
    elapsed: Duration,
  ) -> Result<DecodeOutcome, SessionError> {
    let (selected, index) = select_best(&candidates)?;
    let expected = self.config.model.prior_mask_dims();
    if !selected.has_dims(&expected) {
      return Err(SessionError::Decoding(format!(
        "掩码形状 {:?}, 期望 {:?}",
        selected.dims(),
        expected
      )));
    }

    info!(
      "掩码解码完成, 选择候选 {} (得分 {:.4}), 耗时 {:.2?}",
      index,
      candidates.scores()[index],
      elapsed
    );
    let selected = Arc::new(selected);
    self.cache.previous_mask = Some(selected.clone());
    self.cache.record_prompts(&prompts);
    self.transition(SessionState::Encoded);

    Ok(DecodeOutcome {
      selected,
      index,
      candidates,
      duration: elapsed,
    })
  }
}
