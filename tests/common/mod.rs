// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 集成测试用的检测器、媒体后端与转码器替身
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

#![allow(dead_code)]

use std::{
  io::{Cursor, Write},
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use image::{ImageFormat, Rgb, RgbImage};
use shanan_web::{
  input::{FrameSource, StreamInfo},
  media::{MediaBackend, MediaError},
  model::{Detection, DetectionBatch, Detector, DetectorError, StageTimings, class_name},
  output::FrameSink,
  transcode::{TranscodeError, Transcoder, TranscoderLocator},
};

pub const TIMINGS: StageTimings = StageTimings {
  preprocess: 1.5,
  inference: 8.0,
  postprocess: 0.5,
};

pub fn detection(class_id: usize, x: f32, y: f32, w: f32, h: f32) -> Detection {
  Detection {
    x,
    y,
    width: w,
    height: h,
    confidence: 0.9,
    class_id,
    class_name: class_name(class_id),
  }
}

pub fn solid_frame(width: u32, height: u32) -> RgbImage {
  RgbImage::from_pixel(width, height, Rgb([90, 120, 150]))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let mut buf = Vec::new();
  solid_frame(width, height)
    .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
    .unwrap();
  buf
}

/// 返回固定检测结果的检测器
pub struct FakeDetector {
  detections: Vec<Detection>,
  fail_from_call: Option<usize>,
  calls: AtomicUsize,
}

impl FakeDetector {
  pub fn new(detections: Vec<Detection>) -> Self {
    Self {
      detections,
      fail_from_call: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn empty() -> Self {
    Self::new(Vec::new())
  }

  /// 第 `n` 次（从 0 计）及之后的调用失败
  pub fn failing_from(mut self, n: usize) -> Self {
    self.fail_from_call = Some(n);
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Detector for FakeDetector {
  fn detect(&self, frame: &RgbImage) -> Result<DetectionBatch, DetectorError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_from_call.is_some_and(|n| call >= n) {
      return Err(DetectorError::MissingOutput("output0".to_string()));
    }
    Ok(DetectionBatch {
      detections: self.detections.clone(),
      timings: TIMINGS,
      width: frame.width(),
      height: frame.height(),
    })
  }
}

/// 按顺序吐出预置帧的视频源
pub struct VecSource {
  frames: std::vec::IntoIter<RgbImage>,
  info: StreamInfo,
  released: Arc<AtomicBool>,
}

impl Iterator for VecSource {
  type Item = RgbImage;

  fn next(&mut self) -> Option<RgbImage> {
    self.frames.next()
  }
}

impl FrameSource for VecSource {
  fn info(&self) -> StreamInfo {
    self.info
  }
}

impl Drop for VecSource {
  fn drop(&mut self) {
    self.released.store(true, Ordering::SeqCst);
  }
}

/// 每帧写一行的输出文件
pub struct FileSink {
  file: std::fs::File,
  frames: usize,
}

impl FrameSink for FileSink {
  fn write_frame(&mut self, frame: &RgbImage) -> Result<(), MediaError> {
    self.frames += 1;
    writeln!(self.file, "frame {} {}x{}", self.frames, frame.width(), frame.height())
      .map_err(|e| MediaError::Write(e.to_string()))
  }

  fn finish(&mut self) -> Result<(), MediaError> {
    self.file.flush().map_err(|e| MediaError::Write(e.to_string()))
  }
}

pub struct FakeMedia {
  pub frames: Vec<RgbImage>,
  pub info: StreamInfo,
  pub fail_open: bool,
  pub writer_created: Arc<AtomicBool>,
  pub source_released: Arc<AtomicBool>,
}

impl FakeMedia {
  pub fn new(frame_count: usize, width: u32, height: u32, fps: Option<f64>) -> Self {
    Self {
      frames: (0..frame_count).map(|_| solid_frame(width, height)).collect(),
      info: StreamInfo { width, height, fps },
      fail_open: false,
      writer_created: Arc::new(AtomicBool::new(false)),
      source_released: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn unopenable() -> Self {
    Self {
      fail_open: true,
      ..Self::new(0, 0, 0, None)
    }
  }

  fn source(&self) -> Result<Box<dyn FrameSource>, MediaError> {
    if self.fail_open {
      return Err(MediaError::DeviceOpen("cannot open".to_string()));
    }
    Ok(Box::new(VecSource {
      frames: self.frames.clone().into_iter(),
      info: self.info,
      released: self.source_released.clone(),
    }))
  }
}

impl MediaBackend for FakeMedia {
  fn open_video(&self, _path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
    self.source()
  }

  fn create_writer(
    &self,
    path: &Path,
    _width: u32,
    _height: u32,
    _fps: f64,
  ) -> Result<Box<dyn FrameSink>, MediaError> {
    self.writer_created.store(true, Ordering::SeqCst);
    let file = std::fs::File::create(path).map_err(|e| MediaError::Write(e.to_string()))?;
    Ok(Box::new(FileSink { file, frames: 0 }))
  }

  fn open_camera(&self) -> Result<Box<dyn FrameSource>, MediaError> {
    self.source()
  }
}

/// 直接复制中间文件的转码器
pub struct CopyTranscoder;

impl Transcoder for CopyTranscoder {
  fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
    std::fs::copy(input, output)?;
    Ok(())
  }
}

/// 写出部分结果后失败的转码器
pub struct FailingTranscoder;

impl Transcoder for FailingTranscoder {
  fn transcode(&self, _input: &Path, output: &Path) -> Result<(), TranscodeError> {
    std::fs::write(output, b"partial")?;
    Err(TranscodeError::Exit {
      code: Some(1),
      stderr: "Conversion failed!".to_string(),
    })
  }
}

pub struct CopyLocator;

impl TranscoderLocator for CopyLocator {
  fn locate(&self) -> Option<Box<dyn Transcoder>> {
    Some(Box::new(CopyTranscoder))
  }
}

pub struct NoTranscoder;

impl TranscoderLocator for NoTranscoder {
  fn locate(&self) -> Option<Box<dyn Transcoder>> {
    None
  }
}
