// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_oneshot.rs - 单文件离线检测
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

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use shanan_web::{
  args::DetectorArgs,
  job::{JobPaths, MediaKind, generate_unique_id, validate_upload},
  media::create_media_backend,
  task::{ImageTask, Task, TaskError, VideoTask},
  transcode::{FfmpegLocator, TranscoderLocator},
};

/// 对单个图像或视频文件运行检测，并以 JSON 输出统计结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 输入图像或视频
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,

  /// 结果输出目录
  #[arg(long, default_value = "results", value_name = "DIR")]
  pub output_dir: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  info!("模型文件路径: {}", args.detector.model.display());
  info!("输入来源: {}", args.input.display());

  let filename = args.input.file_name().and_then(|name| name.to_str());
  let (ext, kind) = validate_upload(filename).map_err(|e| anyhow!("{}", e))?;
  std::fs::create_dir_all(&args.output_dir)
    .with_context(|| format!("无法创建目录 {}", args.output_dir.display()))?;
  let job = JobPaths::with_input(
    generate_unique_id(),
    kind,
    &ext,
    args.input.clone(),
    &args.output_dir,
  );

  let detector = args.detector.build_detector()?;
  let annotator = args.detector.build_annotator()?;

  let summary = match kind {
    MediaKind::Image => ImageTask::new(&detector, &annotator).run_task(&job)?,
    MediaKind::Video => {
      let transcoder = FfmpegLocator::new(args.detector.ffmpeg.clone())
        .locate()
        .ok_or(TaskError::TranscoderUnavailable)?;
      // 离线模式不使用摄像头
      let media = create_media_backend(&Url::parse("gst://test")?)?;
      VideoTask::new(&detector, &annotator, media.as_ref(), transcoder.as_ref()).run_task(&job)?
    }
  };

  info!("输出文件: {}", job.output.display());
  println!("{}", serde_json::to_string_pretty(&summary)?);
  Ok(())
}
