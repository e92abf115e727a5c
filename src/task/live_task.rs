// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task/live_task.rs - 摄像头实时检测 MJPEG 流
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

use bytes::{Bytes, BytesMut};
use image::{ImageError, RgbImage, codecs::jpeg::JpegEncoder};
use tracing::{debug, info, warn};

use super::{Task, TaskError};
use crate::{media::MediaBackend, model::Detector, output::Annotator};

/// multipart 分隔符
pub const BOUNDARY: &str = "frame";

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
  let mut buf = Vec::new();
  JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
  Ok(buf)
}

/// 将一帧 JPEG 包装为 multipart 的一个部分
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
  let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
  let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
  part.extend_from_slice(header.as_bytes());
  part.extend_from_slice(jpeg);
  part.extend_from_slice(b"\r\n");
  part.freeze()
}

/// 实时流任务，不收集统计信息
pub struct LiveTask<'a> {
  detector: &'a dyn Detector,
  annotator: &'a Annotator,
  media: &'a dyn MediaBackend,
  jpeg_quality: u8,
}

impl<'a> LiveTask<'a> {
  pub fn new(
    detector: &'a dyn Detector,
    annotator: &'a Annotator,
    media: &'a dyn MediaBackend,
    jpeg_quality: u8,
  ) -> Self {
    Self {
      detector,
      annotator,
      media,
      jpeg_quality,
    }
  }
}

/// 输入为发送回调，回调返回 `false` 表示客户端已断开。
/// 摄像头读取失败或客户端断开时结束，返回已发送的帧数。
impl<F: FnMut(Bytes) -> bool> Task<F> for LiveTask<'_> {
  type Output = u64;

  fn run_task(&self, mut emit: F) -> Result<Self::Output, TaskError> {
    let mut camera = self.media.open_camera().map_err(TaskError::DeviceOpen)?;
    let info = camera.info();
    info!("摄像头已打开: {}x{}", info.width, info.height);

    let mut sent: u64 = 0;
    for frame in camera.by_ref() {
      let batch = self.detector.detect(&frame)?;
      let annotated = self.annotator.annotate(&frame, &batch.detections);

      let jpeg = match encode_jpeg(&annotated, self.jpeg_quality) {
        Ok(jpeg) => jpeg,
        Err(e) => {
          warn!("JPEG 编码失败，丢弃该帧: {}", e);
          continue;
        }
      };

      if !emit(multipart_part(&jpeg)) {
        info!("客户端已断开");
        break;
      }
      sent += 1;
      debug!("已发送第 {} 帧", sent);
    }

    info!("实时流结束，共发送 {} 帧", sent);
    Ok(sent)
  }
}
