// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - Web 服务主程序
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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shanan_web::{
  args::ServerArgs,
  media::create_media_backend,
  transcode::{FfmpegLocator, TranscoderLocator},
  web::{AppState, router},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = ServerArgs::parse();
  info!("模型文件路径: {}", args.detector.model.display());
  info!("摄像头: {}", args.camera);

  let config = args.web_config();
  for dir in [&config.upload_dir, &config.result_dir] {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
  }

  info!("正在加载模型...");
  let detector = args.detector.build_detector().context("模型加载失败")?;
  let annotator = args.detector.build_annotator().context("字体加载失败")?;
  let media = create_media_backend(&args.camera).context("媒体后端初始化失败")?;

  let transcoders = FfmpegLocator::new(args.detector.ffmpeg.clone());
  if transcoders.locate().is_none() {
    warn!("未找到 FFmpeg，视频上传将不可用");
  }

  let state = AppState::new(
    config,
    Arc::new(detector),
    annotator,
    media,
    Arc::new(transcoders),
  );

  let address = args.bind_address();
  let listener = tokio::net::TcpListener::bind(&address)
    .await
    .with_context(|| format!("无法监听 {}", address))?;
  info!("服务已启动: http://{}", address);

  axum::serve(listener, router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("无法监听退出信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到退出信号，正在关闭...");
}
