// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session/worker.rs - 会话工作线程与客户端
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

//! 两个线程：调度线程持有状态机并立即应答 `Busy`/`Stats`，
//! 推理线程持有引擎并串行执行任务。二者之间只通过通道通信。

use std::{
  sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
  thread::{self, JoinHandle},
  time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
  codec::encode_image_tensor,
  config::SessionConfig,
  engine::{DeviceInfo, InferenceEngine, LoadPhase},
  frame::RgbaFrame,
  prompt::PointPrompt,
  session::{
    DecodeOutcome, Envelope, ErrorKind, ErrorReport, Metrics, Reply, Request, RequestId,
    Response, SessionError, WorkerEvent,
    controller::{Job, JobOutcome, SessionController, Step},
  },
  tensor::Tensor,
};

enum Inbound {
  Request(Envelope),
  Progress(RequestId, LoadPhase),
  Finished(RequestId, JobOutcome),
  ExecutorExited,
  Shutdown,
}

/// 推理线程退出时通知调度线程
struct ExitNotice(Sender<Inbound>);

impl Drop for ExitNotice {
  fn drop(&mut self) {
    let _ = self.0.send(Inbound::ExecutorExited);
  }
}

fn disconnected() -> ErrorReport {
  SessionError::Disconnected.report()
}

pub struct SessionWorker;

impl SessionWorker {
  pub fn spawn<E>(engine: E, config: SessionConfig) -> SessionClient
  where
    E: InferenceEngine + Send + 'static,
  {
    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>();
    let (job_tx, job_rx) = mpsc::channel::<(RequestId, Job)>();
    let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

    let executor = {
      let inbound = inbound_tx.clone();
      thread::spawn(move || run_executor(engine, job_rx, inbound))
    };

    let dispatcher = {
      let controller = SessionController::new(config.clone());
      thread::spawn(move || run_dispatcher(controller, inbound_rx, job_tx, event_tx))
    };

    info!("会话工作线程已启动");
    SessionClient {
      inbound: inbound_tx,
      events: event_rx,
      next_id: 0,
      config,
      threads: vec![dispatcher, executor],
    }
  }
}

fn run_executor<E: InferenceEngine>(
  mut engine: E,
  jobs: Receiver<(RequestId, Job)>,
  inbound: Sender<Inbound>,
) {
  let _notice = ExitNotice(inbound.clone());
  for (id, job) in jobs {
    debug!("推理线程执行 {} {:?}", id, job.kind());
    let mut progress = |phase: LoadPhase| {
      let _ = inbound.send(Inbound::Progress(id, phase));
    };
    let outcome = job.run(&mut engine, &mut progress);
    if inbound.send(Inbound::Finished(id, outcome)).is_err() {
      break;
    }
  }
  debug!("推理线程退出");
}

fn run_dispatcher(
  mut controller: SessionController,
  inbound: Receiver<Inbound>,
  jobs: Sender<(RequestId, Job)>,
  events: Sender<WorkerEvent>,
) {
  let respond = |id, result: Result<Reply, SessionError>| {
    let response = Response {
      id,
      result: result.map_err(|e| e.report()),
    };
    events.send(WorkerEvent::Response(response)).is_ok()
  };

  let mut in_flight: Option<RequestId> = None;

  while let Ok(message) = inbound.recv() {
    let delivered = match message {
      Inbound::Request(Envelope { id, request }) => match controller.begin(request) {
        Step::Reply(result) => respond(id, result),
        Step::Run(job) => match jobs.send((id, job)) {
          Ok(()) => {
            in_flight = Some(id);
            true
          }
          Err(_) => {
            error!("推理线程已退出, 无法执行 {}", id);
            respond(id, controller.complete(JobOutcome::aborted("推理线程已退出")))
          }
        },
      },
      Inbound::Progress(id, phase) => events.send(WorkerEvent::Progress { id, phase }).is_ok(),
      Inbound::Finished(id, outcome) => {
        in_flight = None;
        respond(id, controller.complete(outcome))
      }
      Inbound::ExecutorExited => match in_flight.take() {
        Some(id) => {
          error!("推理线程在执行 {} 时退出", id);
          respond(id, controller.complete(JobOutcome::aborted("推理线程意外退出")))
        }
        None => true,
      },
      Inbound::Shutdown => {
        info!("收到关闭请求");
        break;
      }
    };

    if !delivered {
      warn!("调用方已断开, 调度线程退出");
      break;
    }
  }
  debug!("调度线程退出");
}

/// 调用方持有的句柄
pub struct SessionClient {
  inbound: Sender<Inbound>,
  events: Receiver<WorkerEvent>,
  next_id: u64,
  config: SessionConfig,
  threads: Vec<JoinHandle<()>>,
}

impl SessionClient {
  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn send(&mut self, request: Request) -> Result<RequestId, ErrorReport> {
    self.next_id += 1;
    let id = RequestId(self.next_id);
    debug!("发送请求 {} {}", id, request.name());
    self
      .inbound
      .send(Inbound::Request(Envelope { id, request }))
      .map_err(|_| disconnected())?;
    Ok(id)
  }

  pub fn recv(&self) -> Result<WorkerEvent, ErrorReport> {
    self.events.recv().map_err(|_| disconnected())
  }

  /// 超时返回 `Ok(None)`
  pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerEvent>, ErrorReport> {
    match self.events.recv_timeout(timeout) {
      Ok(event) => Ok(Some(event)),
      Err(RecvTimeoutError::Timeout) => Ok(None),
      Err(RecvTimeoutError::Disconnected) => Err(disconnected()),
    }
  }

  /// 等待 `id` 对应的响应，跳过关联号不符的过期响应
  pub fn wait(
    &self,
    id: RequestId,
    on_progress: &mut dyn FnMut(LoadPhase),
  ) -> Result<Reply, ErrorReport> {
    loop {
      match self.recv()? {
        WorkerEvent::Progress { id: pid, phase } if pid == id => on_progress(phase),
        WorkerEvent::Progress { id: pid, phase } => {
          debug!("忽略请求 {} 的进度 {:?}", pid, phase)
        }
        WorkerEvent::Response(Response { id: rid, result }) if rid == id => return result,
        WorkerEvent::Response(Response { id: rid, .. }) => {
          warn!("丢弃过期响应 {}, 正在等待 {}", rid, id)
        }
      }
    }
  }

  pub fn call(
    &mut self,
    request: Request,
    on_progress: &mut dyn FnMut(LoadPhase),
  ) -> Result<Reply, ErrorReport> {
    let id = self.send(request)?;
    self.wait(id, on_progress)
  }

  pub fn initialize(
    &mut self,
    on_progress: &mut dyn FnMut(LoadPhase),
  ) -> Result<DeviceInfo, ErrorReport> {
    match self.call(Request::Initialize, on_progress)? {
      Reply::Initialized(device) => Ok(device),
      other => Err(unexpected(other)),
    }
  }

  pub fn encode_image(&mut self, image: Tensor) -> Result<Duration, ErrorReport> {
    match self.call(Request::EncodeImage(image), &mut |_| {})? {
      Reply::Encoded { duration } => Ok(duration),
      other => Err(unexpected(other)),
    }
  }

  /// 先按配置编码为模型输入张量，再请求编码
  pub fn encode_frame(&mut self, frame: &RgbaFrame) -> Result<Duration, ErrorReport> {
    let tensor = encode_image_tensor(
      frame,
      self.config.model.input_size,
      &self.config.normalization,
    )?;
    self.encode_image(tensor)
  }

  pub fn decode_mask(
    &mut self,
    prompts: Vec<PointPrompt>,
    prior_mask: Option<Tensor>,
  ) -> Result<DecodeOutcome, ErrorReport> {
    match self.call(Request::DecodeMask { prompts, prior_mask }, &mut |_| {})? {
      Reply::Decoded(outcome) => Ok(*outcome),
      other => Err(unexpected(other)),
    }
  }

  pub fn reset_mask(&mut self) -> Result<(), ErrorReport> {
    match self.call(Request::ResetMask, &mut |_| {})? {
      Reply::MaskReset => Ok(()),
      other => Err(unexpected(other)),
    }
  }

  pub fn reset_session(&mut self) -> Result<(), ErrorReport> {
    match self.call(Request::ResetSession, &mut |_| {})? {
      Reply::SessionReset => Ok(()),
      other => Err(unexpected(other)),
    }
  }

  pub fn stats(&mut self) -> Result<Metrics, ErrorReport> {
    match self.call(Request::Stats, &mut |_| {})? {
      Reply::Stats(metrics) => Ok(*metrics),
      other => Err(unexpected(other)),
    }
  }

  /// 请求关闭并等待线程退出。正在执行的推理无法中断，会等待其完成。
  pub fn shutdown(mut self) {
    let _ = self.inbound.send(Inbound::Shutdown);
    for handle in self.threads.drain(..) {
      if handle.join().is_err() {
        error!("会话线程异常退出");
      }
    }
    info!("会话工作线程已关闭");
  }
}

impl Drop for SessionClient {
  fn drop(&mut self) {
    if !self.threads.is_empty() {
      let _ = self.inbound.send(Inbound::Shutdown);
    }
  }
}

fn unexpected(reply: Reply) -> ErrorReport {
  ErrorReport {
    kind: ErrorKind::InvalidState,
    message: SessionError::UnexpectedReply(reply.name()).status(),
  }
}
