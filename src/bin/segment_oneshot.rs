// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/segment_oneshot.rs - 单次点击分割
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_seg::{
  FromUrl,
  config::SessionConfig,
  engine::SamOnnxEngineBuilder,
  input::InputWrapper,
  output::OutputWrapper,
  session::Session,
  task::{Click, OneShotTask, Task},
};
use tracing::info;

/// 点击分割参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型目录，例如 sam:///models/sam?encoder=encoder.onnx&decoder=decoder.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 点击位置 x,y（图像像素坐标），`+x,y` 表示追加点击
  #[arg(long = "point", value_name = "X,Y", required = true)]
  pub points: Vec<Click>,
  /// 所有点击都视为追加点击
  #[arg(long)]
  pub additive: bool,
  /// JSON 配置文件
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = match &args.config {
    Some(path) => SessionConfig::from_json_file(path)?,
    None => SessionConfig::default(),
  };
  let clicks = args
    .points
    .iter()
    .map(|c| Click {
      additive: c.additive || args.additive,
      ..*c
    })
    .collect();

  let input = InputWrapper::from_url(&args.input)?;
  let engine = SamOnnxEngineBuilder::from_url(&args.model)?
    .spec(config.model)
    .build();
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask::new(clicks).run_task(input, Session::new(engine, config), output)?;

  Ok(())
}
