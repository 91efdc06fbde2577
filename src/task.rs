// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 点击分割任务
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

use std::{
  io::BufRead,
  str::FromStr,
  sync::mpsc,
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  codec::project_mask_to_image,
  frame::RgbaFrame,
  geometry::{Point, map_image_to_model_space},
  output::Render,
  prompt::PointPrompt,
  session::{ClickSequence, DecodeOutcome, Segmenter},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 一次点击：图像像素坐标，追加点击延续当前对象
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
  pub point: Point,
  pub additive: bool,
}

impl Click {
  pub fn new(x: f32, y: f32, additive: bool) -> Self {
    Self {
      point: Point::new(x, y),
      additive,
    }
  }
}

/// `x,y` 或 `+x,y`
impl FromStr for Click {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (additive, rest) = match s.trim().strip_prefix('+') {
      Some(rest) => (true, rest),
      None => (false, s.trim()),
    };
    let (x, y) = rest
      .split_once(',')
      .ok_or_else(|| format!("点击位置应为 x,y: {}", s))?;
    let parse = |v: &str| {
      v.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("坐标无效: {}", v))
    };
    Ok(Click::new(parse(x)?, parse(y)?, additive))
  }
}

fn prepare<I, M>(mut input: I, model: &mut M) -> anyhow::Result<RgbaFrame>
where
  I: Iterator<Item = RgbaFrame>,
  M: Segmenter,
{
  let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
  let device = model.initialize(&mut |phase| info!("加载进度: {:?}", phase))?;
  info!("推理设备: {}", device);

  let elapsed = model.encode_frame(&frame)?;
  info!("图像 {} 编码完成，耗时: {:.2?}", frame.dims(), elapsed);
  Ok(frame)
}

fn click<M: Segmenter>(
  model: &mut M,
  clicks: &mut ClickSequence,
  frame: &RgbaFrame,
  click: Click,
) -> anyhow::Result<DecodeOutcome> {
  let point = map_image_to_model_space(
    click.point,
    frame.dims(),
    model.session_config().model.input_size,
  )?;
  // 解码成功后才提交点击，与会话的提示历史保持一致
  let mut next = clicks.clone();
  let prompts = next.click(PointPrompt::positive(point), click.additive).to_vec();
  let outcome = model.decode_mask(prompts, None)?;
  *clicks = next;
  Ok(outcome)
}

fn render<M, O, RE>(
  model: &M,
  output: &O,
  frame: &RgbaFrame,
  outcome: &DecodeOutcome,
) -> anyhow::Result<()>
where
  M: Segmenter,
  O: Render<RgbaFrame, RgbaFrame, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  let mask = outcome.mask_frame(model.mask_style())?;
  let mask = project_mask_to_image(&mask, frame.dims())?;
  output.render_result(frame, &mask)?;
  Ok(())
}

pub struct OneShotTask {
  clicks: Vec<Click>,
}

impl OneShotTask {
  pub fn new(clicks: Vec<Click>) -> Self {
    Self { clicks }
  }
}

impl<I, M, O, RE> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = RgbaFrame>,
  M: Segmenter,
  O: Render<RgbaFrame, RgbaFrame, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    if self.clicks.is_empty() {
      anyhow::bail!("至少需要一个点击位置");
    }
    let frame = prepare(input, &mut model)?;

    let mut sequence = ClickSequence::default();
    let mut last = None;
    for c in self.clicks {
      let outcome = click(&mut model, &mut sequence, &frame, c)?;
      info!(
        "点击 ({}, {}) 解码完成，候选 {}，得分 {:.4}，耗时: {:.2?}",
        c.point.x,
        c.point.y,
        outcome.index,
        outcome.best_score(),
        outcome.duration
      );
      last = Some(outcome);
    }

    if let Some(outcome) = last {
      render(&model, &output, &frame, &outcome)?;
      info!("渲染完成");
    }
    Ok(())
  }
}

pub struct RepeatShotTask {
  clicks: Vec<Click>,
  repeat: usize,
}

impl RepeatShotTask {
  pub fn new(clicks: Vec<Click>, repeat: usize) -> Self {
    Self { clicks, repeat }
  }
}

impl<I, M, O, RE> Task<I, M, O> for RepeatShotTask
where
  I: Iterator<Item = RgbaFrame>,
  M: Segmenter,
  O: Render<RgbaFrame, RgbaFrame, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    if self.clicks.is_empty() || self.repeat == 0 {
      anyhow::bail!("至少需要一个点击位置与一次重复");
    }
    let frame = prepare(input, &mut model)?;

    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      model.reset_mask()?;
      let mut sequence = ClickSequence::default();
      let now = Instant::now();
      for &c in &self.clicks {
        last = Some(click(&mut model, &mut sequence, &frame, c)?);
      }
      let elapsed = now.elapsed();
      info!("({})解码完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }

    // 前两次包含预热开销
    let warm = if times.len() > 2 { &times[2..] } else { &times[..] };
    warn!(
      "平均解码时间: {:.2?}",
      warm.iter().sum::<Duration>() / warm.len() as u32
    );
    let stats = model.stats()?;
    info!(
      "编码 {} 次，解码 {} 次，失败 {} 次",
      stats.encode_count, stats.decode_count, stats.failure_count
    );

    if let Some(outcome) = last {
      render(&model, &output, &frame, &outcome)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
  Click(Click),
  Reset,
  Stats,
  Quit,
}

/// `x y` 新点击，`+ x y` 追加点击，`reset`、`stats`、`quit`
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
  let mut parts = line.split_whitespace().peekable();
  let additive = match parts.peek() {
    None => return Ok(None),
    Some(&"reset") => return Ok(Some(Command::Reset)),
    Some(&"stats") => return Ok(Some(Command::Stats)),
    Some(&"quit") | Some(&"exit") => return Ok(Some(Command::Quit)),
    Some(&"+") => {
      parts.next();
      true
    }
    Some(_) => false,
  };

  let mut coord = || -> Result<f32, String> {
    let text = parts.next().ok_or_else(|| format!("缺少坐标: {}", line))?;
    text
      .parse::<f32>()
      .ok()
      .filter(|v| v.is_finite())
      .ok_or_else(|| format!("坐标无效: {}", text))
  };
  let x = coord()?;
  let y = coord()?;
  if parts.next().is_some() {
    return Err(format!("多余的参数: {}", line));
  }
  Ok(Some(Command::Click(Click::new(x, y, additive))))
}

/// 从文本流读取点击，每次点击后输出新的掩码
pub struct ContinuousTask<R> {
  reader: R,
  handle_ctrlc: bool,
}

impl<R: BufRead> ContinuousTask<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader,
      handle_ctrlc: false,
    }
  }

  pub fn with_ctrlc(mut self, handle_ctrlc: bool) -> Self {
    self.handle_ctrlc = handle_ctrlc;
    self
  }
}

impl<R, I, M, O, RE> Task<I, M, O> for ContinuousTask<R>
where
  R: BufRead,
  I: Iterator<Item = RgbaFrame>,
  M: Segmenter,
  O: Render<RgbaFrame, RgbaFrame, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();
    if self.handle_ctrlc {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let frame = prepare(input, &mut model)?;
    let mut sequence = ClickSequence::default();

    for line in self.reader.lines() {
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      let command = match parse_command(&line?) {
        Ok(Some(command)) => command,
        Ok(None) => continue,
        Err(e) => {
          warn!("忽略无效输入: {}", e);
          continue;
        }
      };

      match command {
        Command::Click(c) => {
          let now = Instant::now();
          match click(&mut model, &mut sequence, &frame, c) {
            Ok(outcome) => {
              render(&model, &output, &frame, &outcome)?;
              info!(
                "点击 ({}, {})，提示点 {} 个，耗时: {:.2?}",
                c.point.x,
                c.point.y,
                sequence.as_slice().len(),
                now.elapsed()
              );
            }
            Err(e) => warn!("解码失败: {}", e),
          }
        }
        Command::Reset => {
          sequence.clear();
          model.reset_mask()?;
          info!("掩码已清除");
        }
        Command::Stats => {
          let stats = model.stats()?;
          info!("会话统计: {}", serde_json::to_string(&stats)?);
        }
        Command::Quit => break,
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_command() {
    assert_eq!(
      parse_command("10 20").unwrap(),
      Some(Command::Click(Click::new(10.0, 20.0, false)))
    );
    assert_eq!(
      parse_command(" + 1.5 2 ").unwrap(),
      Some(Command::Click(Click::new(1.5, 2.0, true)))
    );
    assert_eq!(parse_command("reset").unwrap(), Some(Command::Reset));
    assert_eq!(parse_command("   ").unwrap(), None);
    assert!(parse_command("1").is_err());
    assert!(parse_command("1 2 3").is_err());
    assert!(parse_command("a b").is_err());
    assert!(parse_command("NaN 1").is_err());
  }

  #[test]
  fn test_click_from_str() {
    assert_eq!("3,4".parse::<Click>(), Ok(Click::new(3.0, 4.0, false)));
    assert_eq!("+3.5, 4".parse::<Click>(), Ok(Click::new(3.5, 4.0, true)));
    assert!("3;4".parse::<Click>().is_err());
    assert!("inf,4".parse::<Click>().is_err());
  }
}
