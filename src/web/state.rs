// 该文件是 Shanan （山南西风） 项目的一部分。
// src/web/state.rs - 共享服务状态
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

use std::{path::PathBuf, sync::Arc};

use crate::{
  media::MediaBackend, model::Detector, output::Annotator, transcode::TranscoderLocator,
};

#[derive(Debug, Clone)]
pub struct WebConfig {
  pub static_dir: PathBuf,
  pub upload_dir: PathBuf,
  pub result_dir: PathBuf,
  /// 请求体上限（字节）
  pub max_upload_bytes: usize,
  pub jpeg_quality: u8,
}

/// 所有请求共享的状态，模型只加载一次
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<WebConfig>,
  pub detector: Arc<dyn Detector>,
  pub annotator: Arc<Annotator>,
  pub media: Arc<dyn MediaBackend>,
  pub transcoders: Arc<dyn TranscoderLocator>,
}

impl AppState {
  pub fn new(
    config: WebConfig,
    detector: Arc<dyn Detector>,
    annotator: Annotator,
    media: Arc<dyn MediaBackend>,
    transcoders: Arc<dyn TranscoderLocator>,
  ) -> Self {
    Self {
      config: Arc::new(config),
      detector,
      annotator: Arc::new(annotator),
      media,
      transcoders,
    }
  }
}
