// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;

use crate::media::MediaError;

pub mod draw;
pub use self::draw::{Annotator, AnnotatorError};

#[cfg(feature = "gstreamer_media")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_media")]
pub use self::gstreamer_video_output::GStreamerVideoOutput;

/// 逐帧写入的视频输出
pub trait FrameSink: Send {
  fn write_frame(&mut self, frame: &RgbImage) -> Result<(), MediaError>;

  /// 写入结束标记并关闭文件，之后不得再写入
  fn finish(&mut self) -> Result<(), MediaError>;
}
