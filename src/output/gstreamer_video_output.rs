// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 中间视频文件输出
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

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use image::RgbImage;
use tracing::{debug, info, warn};

use super::FrameSink;
use crate::{
  frame::{aligned_stride, packed_rows_with_stride},
  media::MediaError,
};

const PIPELINE_DESCRIPTION: &str = "appsrc name=src ! videoconvert ! video/x-raw,format=I420 \
   ! x264enc speed-preset=fast ! h264parse ! mp4mux ! filesink name=sink";

/// 帧率以千分之一精度表示
const FPS_DENOMINATOR: i32 = 1000;

/// GStreamer 视频文件输出
///
/// 固定输出 H.264/MP4，分辨率与帧率在创建时确定。
pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  width: u32,
  height: u32,
  fps: f64,
  frame_count: u64,
  finished: bool,
}

impl GStreamerVideoOutput {
  pub fn new(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, MediaError> {
    gst::init()?;

    debug!("GStreamer 输出管道: {}", PIPELINE_DESCRIPTION);
    let pipeline = gst::parse::launch(PIPELINE_DESCRIPTION)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| MediaError::Pipeline("无法创建管道".to_string()))?;

    let filesink = pipeline
      .by_name("sink")
      .ok_or_else(|| MediaError::Pipeline("找不到 filesink 元素".to_string()))?;
    filesink.set_property("location", &*path.to_string_lossy());

    let appsrc = pipeline
      .by_name("src")
      .ok_or_else(|| MediaError::Pipeline("找不到 appsrc 元素".to_string()))?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| MediaError::Pipeline("元素不是 appsrc".to_string()))?;

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field(
        "framerate",
        gst::Fraction::new((fps * FPS_DENOMINATOR as f64).round() as i32, FPS_DENOMINATOR),
      )
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    info!(
      "视频输出已创建: {}x{} @ {} fps -> {}",
      width,
      height,
      fps,
      path.display()
    );

    Ok(Self {
      pipeline,
      appsrc,
      width,
      height,
      fps,
      frame_count: 0,
      finished: false,
    })
  }

  fn timestamp(&self, index: u64) -> gst::ClockTime {
    gst::ClockTime::from_nseconds((index as f64 * 1_000_000_000.0 / self.fps) as u64)
  }
}

impl FrameSink for GStreamerVideoOutput {
  fn write_frame(&mut self, frame: &RgbImage) -> Result<(), MediaError> {
    if self.finished {
      return Err(MediaError::Write("输出已关闭".to_string()));
    }
    if frame.dimensions() != (self.width, self.height) {
      return Err(MediaError::Write(format!(
        "帧尺寸 {:?} 与输出尺寸 {}x{} 不一致",
        frame.dimensions(),
        self.width,
        self.height
      )));
    }

    // RGB 视频帧每行需 4 字节对齐
    let data = packed_rows_with_stride(frame, aligned_stride(self.width))?;
    let mut buffer = gst::Buffer::from_mut_slice(data);
    {
      let pts = self.timestamp(self.frame_count);
      let next = self.timestamp(self.frame_count + 1);
      let buffer = buffer
        .get_mut()
        .ok_or_else(|| MediaError::Write("无法写入缓冲区".to_string()))?;
      buffer.set_pts(pts);
      buffer.set_duration(next - pts);
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| MediaError::Write(format!("推送缓冲区失败: {:?}", e)))?;
    self.frame_count += 1;
    Ok(())
  }

  fn finish(&mut self) -> Result<(), MediaError> {
    if self.finished {
      return Ok(());
    }
    self.finished = true;

    self
      .appsrc
      .end_of_stream()
      .map_err(|e| MediaError::Write(format!("发送 EOS 失败: {:?}", e)))?;

    // 等待 mp4mux 写完文件尾
    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| MediaError::Pipeline("管道没有总线".to_string()))?;
    let message = bus.timed_pop_filtered(
      gst::ClockTime::NONE,
      &[gst::MessageType::Eos, gst::MessageType::Error],
    );
    self.pipeline.set_state(gst::State::Null)?;

    if let Some(message) = message {
      if let gst::MessageView::Error(err) = message.view() {
        return Err(MediaError::Write(err.error().to_string()));
      }
    }

    info!("视频输出已关闭，共写入 {} 帧", self.frame_count);
    Ok(())
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if !self.finished {
      warn!("视频输出未正常结束，文件可能不完整");
      if let Err(e) = self.pipeline.set_state(gst::State::Null) {
        warn!("停止 GStreamer 输出管道失败: {}", e);
      }
    }
  }
}
