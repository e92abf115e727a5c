// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件与摄像头输入
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

//! # GStreamer 输入
//!
//! 视频文件经 `decodebin` 解码，摄像头经 `v4l2src`/`autovideosrc` 采集，
//! 统一转换为 RGB 后由 `appsink` 逐帧取出。
//!
//! 摄像头 URL 格式：
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=30`
//! - `gst://auto`：系统默认摄像头
//! - `gst://test`：测试图案

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{FrameSource, StreamInfo};
use crate::{
  FromUrl,
  frame::{ChannelOrder, rgb_image_from_packed},
  media::MediaError,
};

const GSTREAMER_INPUT_SCHEME: &str = "gst";
const STATE_CHANGE_TIMEOUT_SECS: u64 = 10;
const FIRST_SAMPLE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum GStreamerInputBuilderItem {
  /// 文件路径通过属性设置，不拼接进管道描述
  FileSource,
  CameraSource {
    device: String,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
  },
  AutoSource,
  TestSource,
  TargetFormat {
    format: String,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource => "filesrc name=src ! decodebin".to_string(),
      GStreamerInputBuilderItem::CameraSource {
        device,
        width,
        height,
        fps,
      } => {
        let mut caps = vec!["video/x-raw".to_string()];
        if let Some(width) = width {
          caps.push(format!("width={}", width));
        }
        if let Some(height) = height {
          caps.push(format!("height={}", height));
        }
        if let Some(fps) = fps {
          caps.push(format!("framerate={}/1", fps));
        }
        if caps.len() == 1 {
          format!("v4l2src device={}", device)
        } else {
          format!("v4l2src device={} ! {}", device, caps.join(","))
        }
      }
      GStreamerInputBuilderItem::AutoSource => "autovideosrc".to_string(),
      GStreamerInputBuilderItem::TestSource => "videotestsrc is-live=true".to_string(),
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 输入管道构建器
#[derive(Debug, Clone)]
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
  location: Option<PathBuf>,
  live: bool,
}

impl GStreamerInputPipelineBuilder {
  /// 读取本地视频文件
  pub fn file(path: impl AsRef<Path>) -> Self {
    Self {
      items: vec![
        GStreamerInputBuilderItem::FileSource,
        Self::rgb_target(),
      ],
      location: Some(path.as_ref().to_path_buf()),
      live: false,
    }
  }

  fn live(source: GStreamerInputBuilderItem) -> Self {
    Self {
      items: vec![source, Self::rgb_target()],
      location: None,
      live: true,
    }
  }

  fn rgb_target() -> GStreamerInputBuilderItem {
    GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    }
  }

  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let parse = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());
    Self::live(GStreamerInputBuilderItem::CameraSource {
      device: path.to_string(),
      width: parse("width"),
      height: parse("height"),
      fps: parse("fps"),
    })
  }

  pub fn items(&self) -> &[GStreamerInputBuilderItem] {
    &self.items
  }

  /// 完整管道描述
  pub fn description(&self) -> String {
    let sink = if self.live {
      // 摄像头只保留最新帧
      "appsink name=sink max-buffers=2 drop=true sync=false"
    } else {
      // 文件逐帧处理，不能丢帧
      "appsink name=sink max-buffers=4 drop=false sync=false"
    };
    let body = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!("{} ! {}", body, sink)
  }

  pub fn build(self) -> Result<GStreamerInput, MediaError> {
    gst::init()?;

    let description = self.description();
    info!("GStreamer 输入管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| MediaError::Pipeline("无法创建管道".to_string()))?;

    if let Some(location) = &self.location {
      let src = pipeline
        .by_name("src")
        .ok_or_else(|| MediaError::Pipeline("找不到 filesrc 元素".to_string()))?;
      src.set_property("location", &*location.to_string_lossy());
    }

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| MediaError::Pipeline("找不到 appsink 元素".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| MediaError::Pipeline("元素不是 appsink".to_string()))?;

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      info: StreamInfo {
        width: 0,
        height: 0,
        fps: None,
      },
      pending: None,
    };

    input
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| MediaError::DeviceOpen(e.to_string()))?;
    let (result, _, _) = input
      .pipeline
      .state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS));
    result.map_err(|e| MediaError::DeviceOpen(format!("{}: {}", e, input.bus_error())))?;

    input.read_stream_info()?;
    info!(
      "输入已打开: {}x{} @ {:?} fps",
      input.info.width, input.info.height, input.info.fps
    );

    Ok(input)
  }
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = MediaError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != GSTREAMER_INPUT_SCHEME {
      return Err(MediaError::CameraUrl(format!(
        "期望 '{}' 协议，实际为 '{}'",
        GSTREAMER_INPUT_SCHEME,
        url.scheme()
      )));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    match url.host_str() {
      Some("camera") if !url.path().is_empty() && url.path() != "/" => {
        Ok(Self::build_camera_pipeline(url.path(), &query))
      }
      Some("auto") => Ok(Self::live(GStreamerInputBuilderItem::AutoSource)),
      Some("test") => Ok(Self::live(GStreamerInputBuilderItem::TestSource)),
      _ => Err(MediaError::CameraUrl(url.to_string())),
    }
  }
}

/// GStreamer 帧输入
///
/// 丢弃时将管道置为 `Null`，释放文件句柄或摄像头设备。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  info: StreamInfo,
  /// 探测流信息时提前取出的第一帧
  pending: Option<gst::Sample>,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 输入管道失败: {}", e);
    }
  }
}

impl GStreamerInput {
  fn read_stream_info(&mut self) -> Result<(), MediaError> {
    let caps = self
      .appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps());

    let caps = match caps {
      Some(caps) => caps,
      None => {
        // 实时源在 Playing 之前没有协商好的 caps，先取一帧
        let sample = self
          .appsink
          .try_pull_sample(gst::ClockTime::from_seconds(FIRST_SAMPLE_TIMEOUT_SECS))
          .ok_or_else(|| MediaError::DeviceOpen(format!("无法读取第一帧: {}", self.bus_error())))?;
        let caps = sample
          .caps_owned()
          .ok_or_else(|| MediaError::Pipeline("样本缺少 caps".to_string()))?;
        self.pending = Some(sample);
        caps
      }
    };

    let video_info = gst_video::VideoInfo::from_caps(&caps)?;
    let fps = video_info.fps();
    self.info = StreamInfo {
      width: video_info.width(),
      height: video_info.height(),
      fps: (fps.numer() > 0 && fps.denom() > 0).then(|| fps.numer() as f64 / fps.denom() as f64),
    };
    Ok(())
  }

  fn bus_error(&self) -> String {
    self
      .pipeline
      .bus()
      .and_then(|bus| bus.pop_filtered(&[gst::MessageType::Error]))
      .and_then(|msg| match msg.view() {
        gst::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
      })
      .unwrap_or_else(|| "unknown error".to_string())
  }

  fn next_sample(&mut self) -> Option<gst::Sample> {
    if let Some(sample) = self.pending.take() {
      return Some(sample);
    }
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(_) => {
        debug!("appsink 已无更多样本");
        None
      }
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.next_sample()?;
    convert_sample(&sample)
      .map_err(|e| {
        error!("帧转换失败: {}", e);
        e
      })
      .ok()
  }
}

impl FrameSource for GStreamerInput {
  fn info(&self) -> StreamInfo {
    self.info
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<RgbImage, MediaError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| MediaError::Pipeline("样本缺少 buffer".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| MediaError::Pipeline("样本缺少 caps".to_string()))?;
  let video_info = gst_video::VideoInfo::from_caps(caps)?;

  let order = match video_info.format() {
    gst_video::VideoFormat::Rgb => ChannelOrder::Rgb,
    gst_video::VideoFormat::Bgr => ChannelOrder::Bgr,
    other => {
      return Err(MediaError::Pipeline(format!(
        "不支持的像素格式: {:?}",
        other
      )));
    }
  };

  let map = buffer.map_readable()?;
  let stride = video_info.stride()[0].max(0) as usize;
  Ok(rgb_image_from_packed(
    map.as_slice(),
    video_info.width(),
    video_info.height(),
    stride,
    order,
  )?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_url_builds_v4l2_pipeline() {
    let url = Url::parse("gst://camera/dev/video0?width=640&height=480&fps=30").unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url).unwrap();
    assert_eq!(
      builder.description(),
      "v4l2src device=/dev/video0 ! video/x-raw,width=640,height=480,framerate=30/1 \
       ! videoconvert ! video/x-raw,format=RGB \
       ! appsink name=sink max-buffers=2 drop=true sync=false"
    );
  }

  #[test]
  fn camera_url_without_caps() {
    let url = Url::parse("gst://camera/dev/video2").unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url).unwrap();
    assert!(builder.description().starts_with("v4l2src device=/dev/video2 ! videoconvert"));
  }

  #[test]
  fn auto_and_test_sources() {
    let auto = GStreamerInputPipelineBuilder::from_url(&Url::parse("gst://auto").unwrap()).unwrap();
    assert_eq!(auto.items()[0], GStreamerInputBuilderItem::AutoSource);
    let test = GStreamerInputPipelineBuilder::from_url(&Url::parse("gst://test").unwrap()).unwrap();
    assert!(test.description().starts_with("videotestsrc is-live=true"));
  }

  #[test]
  fn file_pipeline_keeps_every_frame() {
    let builder = GStreamerInputPipelineBuilder::file("/tmp/a b.mp4");
    let description = builder.description();
    assert!(description.starts_with("filesrc name=src ! decodebin"));
    assert!(description.contains("drop=false"));
    assert!(!description.contains("a b.mp4"));
  }

  #[test]
  fn unknown_url_is_rejected() {
    let url = Url::parse("gst://somewhere").unwrap();
    assert!(matches!(
      GStreamerInputPipelineBuilder::from_url(&url),
      Err(MediaError::CameraUrl(_))
    ));
    // 视频文件只能通过上传处理，不能作为摄像头
    let url = Url::parse("gst://file/tmp/clip.mp4").unwrap();
    assert!(matches!(
      GStreamerInputPipelineBuilder::from_url(&url),
      Err(MediaError::CameraUrl(_))
    ));
    let url = Url::parse("http://camera/dev/video0").unwrap();
    assert!(GStreamerInputPipelineBuilder::from_url(&url).is_err());
  }
}
