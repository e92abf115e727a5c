// 该文件是 Shanan （山南西风） 项目的一部分。
// src/media.rs - 媒体后端：视频读取、中间文件写入与摄像头采集
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

use std::{path::Path, sync::Arc};

use thiserror::Error;
use url::Url;

use crate::{frame::FrameError, input::FrameSource, output::FrameSink};

#[derive(Error, Debug)]
pub enum MediaError {
  #[error("failed to open media source: {0}")]
  DeviceOpen(String),
  #[error("pipeline error: {0}")]
  Pipeline(String),
  #[error("failed to write frame: {0}")]
  Write(String),
  #[error("invalid camera url: {0}")]
  CameraUrl(String),
  #[error("frame error: {0}")]
  Frame(#[from] FrameError),
  #[error("media support is not compiled in")]
  Unavailable,
  #[cfg(feature = "gstreamer_media")]
  #[error("GStreamer error: {0}")]
  GStreamer(#[from] gstreamer::glib::Error),
  #[cfg(feature = "gstreamer_media")]
  #[error("GStreamer boolean error: {0}")]
  GStreamerBool(#[from] gstreamer::glib::BoolError),
  #[cfg(feature = "gstreamer_media")]
  #[error("State change error: {0}")]
  StateChange(#[from] gstreamer::StateChangeError),
}

/// 媒体后端
///
/// 每次调用都返回独立的句柄，并发任务之间不共享任何读写状态。
pub trait MediaBackend: Send + Sync {
  fn open_video(&self, path: &Path) -> Result<Box<dyn FrameSource>, MediaError>;

  fn create_writer(
    &self,
    path: &Path,
    width: u32,
    height: u32,
    fps: f64,
  ) -> Result<Box<dyn FrameSink>, MediaError>;

  fn open_camera(&self) -> Result<Box<dyn FrameSource>, MediaError>;
}

#[cfg(feature = "gstreamer_media")]
pub use self::gstreamer_backend::GStreamerMediaBackend;

#[cfg(feature = "gstreamer_media")]
mod gstreamer_backend {
  use std::path::Path;

  use url::Url;

  use super::{MediaBackend, MediaError};
  use crate::{
    FromUrl,
    input::{FrameSource, GStreamerInputPipelineBuilder},
    output::{FrameSink, GStreamerVideoOutput},
  };

  pub struct GStreamerMediaBackend {
    camera: GStreamerInputPipelineBuilder,
  }

  impl GStreamerMediaBackend {
    pub fn new(camera_url: &Url) -> Result<Self, MediaError> {
      gstreamer::init()?;
      let camera = GStreamerInputPipelineBuilder::from_url(camera_url)?;
      Ok(Self { camera })
    }
  }

  impl MediaBackend for GStreamerMediaBackend {
    fn open_video(&self, path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
      if !path.is_file() {
        return Err(MediaError::DeviceOpen(format!(
          "文件不存在: {}",
          path.display()
        )));
      }
      let input = GStreamerInputPipelineBuilder::file(path).build()?;
      Ok(Box::new(input))
    }

    fn create_writer(
      &self,
      path: &Path,
      width: u32,
      height: u32,
      fps: f64,
    ) -> Result<Box<dyn FrameSink>, MediaError> {
      Ok(Box::new(GStreamerVideoOutput::new(path, width, height, fps)?))
    }

    fn open_camera(&self) -> Result<Box<dyn FrameSource>, MediaError> {
      Ok(Box::new(self.camera.clone().build()?))
    }
  }
}

/// 未启用媒体支持时的占位后端，所有操作均失败
pub struct UnavailableMediaBackend;

impl MediaBackend for UnavailableMediaBackend {
  fn open_video(&self, _path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
    Err(MediaError::Unavailable)
  }

  fn create_writer(
    &self,
    _path: &Path,
    _width: u32,
    _height: u32,
    _fps: f64,
  ) -> Result<Box<dyn FrameSink>, MediaError> {
    Err(MediaError::Unavailable)
  }

  fn open_camera(&self) -> Result<Box<dyn FrameSource>, MediaError> {
    Err(MediaError::Unavailable)
  }
}

pub fn create_media_backend(camera_url: &Url) -> Result<Arc<dyn MediaBackend>, MediaError> {
  #[cfg(feature = "gstreamer_media")]
  {
    Ok(Arc::new(GStreamerMediaBackend::new(camera_url)?))
  }
  #[cfg(not(feature = "gstreamer_media"))]
  {
    tracing::warn!("未启用 gstreamer_media 特性，摄像头 {} 不可用", camera_url);
    Ok(Arc::new(UnavailableMediaBackend))
  }
}
