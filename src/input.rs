// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 视频/摄像头帧输入
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

#[cfg(feature = "gstreamer_media")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_media")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputBuilderItem, GStreamerInputPipelineBuilder,
};

/// 源未报告帧率（或报告为 0）时使用的帧率
pub const DEFAULT_FPS: f64 = 30.0;

/// 视频流基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
  pub width: u32,
  pub height: u32,
  pub fps: Option<f64>,
}

impl StreamInfo {
  pub fn fps_or_default(&self) -> f64 {
    match self.fps {
      Some(fps) if fps.is_finite() && fps > 0.0 => fps,
      _ => DEFAULT_FPS,
    }
  }

  pub fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

/// 逐帧读取的视频源
///
/// 迭代结束（返回 `None`）即视为读取完毕或设备断开，
/// 源被丢弃时必须释放底层设备。
pub trait FrameSource: Iterator<Item = RgbImage> + Send {
  fn info(&self) -> StreamInfo;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_or_zero_fps_defaults_to_thirty() {
    let mut info = StreamInfo {
      width: 1,
      height: 1,
      fps: None,
    };
    assert_eq!(info.fps_or_default(), DEFAULT_FPS);
    info.fps = Some(0.0);
    assert_eq!(info.fps_or_default(), DEFAULT_FPS);
    info.fps = Some(f64::NAN);
    assert_eq!(info.fps_or_default(), DEFAULT_FPS);
    info.fps = Some(25.0);
    assert_eq!(info.fps_or_default(), 25.0);
  }
}
