// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolo.rs - 基于 ONNX Runtime 的 YOLO 目标检测器
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

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
  time::Instant,
};

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array4, ArrayD, Axis, Ix3};
use ort::{inputs, session::Session, value::TensorRef};
use tracing::{debug, info};

use super::{Detection, DetectionBatch, Detector, DetectorError, StageTimings, class_name};

const YOLO_INPUT_NAME: &str = "images";
const YOLO_OUTPUT_NAME: &str = "output0";
const YOLO_INPUT_W: u32 = 640;
const YOLO_INPUT_H: u32 = 640;
const YOLO_BOX_FIELDS: usize = 4;

const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_NMS_THRESHOLD: f32 = 0.7;

pub struct YoloDetectorBuilder {
  model_path: PathBuf,
  confidence_threshold: f32,
  nms_threshold: f32,
}

impl YoloDetectorBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      confidence_threshold: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
    }
  }

  pub fn confidence(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<YoloDetector, DetectorError> {
    if !self.model_path.is_file() {
      return Err(DetectorError::ModelPath(
        self.model_path.display().to_string(),
      ));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?.commit_from_file(&self.model_path)?;
    info!(
      "模型加载完成，输入尺寸 {}x{}，置信度阈值 {}，NMS 阈值 {}",
      YOLO_INPUT_W, YOLO_INPUT_H, self.confidence_threshold, self.nms_threshold
    );

    Ok(YoloDetector {
      session: Mutex::new(session),
      decoder: YoloDecoder {
        input_width: YOLO_INPUT_W,
        input_height: YOLO_INPUT_H,
        confidence_threshold: self.confidence_threshold,
        nms_threshold: self.nms_threshold,
      },
    })
  }
}

/// YOLO 输出解码参数
///
/// 输出格式为 `[1, 4 + num_classes, num_anchors]`，前四行为 cx, cy, w, h。
#[derive(Debug, Clone, Copy)]
struct YoloDecoder {
  /// 模型输入宽度
  input_width: u32,
  /// 模型输入高度
  input_height: u32,
  /// 置信度阈值
  confidence_threshold: f32,
  /// NMS IOU 阈值
  nms_threshold: f32,
}

impl YoloDecoder {
  /// 解码模型输出，坐标缩放回原始图像尺寸并裁剪到图像范围内
  fn decode(
    &self,
    output: ArrayD<f32>,
    original_width: u32,
    original_height: u32,
  ) -> Result<Vec<Detection>, DetectorError> {
    let output = output.into_dimensionality::<Ix3>()?;
    let output = output.index_axis(Axis(0), 0);
    let num_classes = output.shape()[0].saturating_sub(YOLO_BOX_FIELDS);
    if num_classes == 0 {
      return Ok(Vec::new());
    }

    let (frame_w, frame_h) = (original_width as f32, original_height as f32);
    let scale_x = frame_w / self.input_width as f32;
    let scale_y = frame_h / self.input_height as f32;

    let mut detections = Vec::new();
    for anchor in output.axis_iter(Axis(1)) {
      // 找到最高类别分数
      let (class_id, confidence) = anchor
        .iter()
        .skip(YOLO_BOX_FIELDS)
        .copied()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (id, score)| {
          if score > best.1 { (id, score) } else { best }
        });

      if confidence < self.confidence_threshold {
        continue;
      }

      let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
      let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, frame_w);
      let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, frame_h);
      let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, frame_w);
      let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, frame_h);
      if x2 <= x1 || y2 <= y1 {
        continue;
      }

      detections.push(Detection {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
        confidence,
        class_id,
        class_name: class_name(class_id),
      });
    }

    Ok(non_maximum_suppression(detections, self.nms_threshold))
  }
}

/// YOLO 目标检测器
pub struct YoloDetector {
  /// 推理会话，同一时刻只允许一个请求使用
  session: Mutex<Session>,
  decoder: YoloDecoder,
}

impl YoloDetector {
  /// 预处理图像：缩放到模型输入尺寸并归一化为 NCHW
  fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
    let (width, height) = (self.decoder.input_width, self.decoder.input_height);
    let resized = image::imageops::resize(image, width, height, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
      let (x, y) = (x as usize, y as usize);
      let [r, g, b] = pixel.0;
      input[[0, 0, y, x]] = r as f32 / 255.0;
      input[[0, 1, y, x]] = g as f32 / 255.0;
      input[[0, 2, y, x]] = b as f32 / 255.0;
    }
    input
  }

  fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, DetectorError> {
    let mut session = self.session.lock().map_err(|_| DetectorError::Poisoned)?;
    let outputs = session.run(inputs![YOLO_INPUT_NAME => TensorRef::from_array_view(input)?])?;
    let output = outputs
      .get(YOLO_OUTPUT_NAME)
      .ok_or_else(|| DetectorError::MissingOutput(YOLO_OUTPUT_NAME.to_string()))?;
    Ok(output.try_extract_array::<f32>()?.to_owned())
  }
}

impl Detector for YoloDetector {
  fn detect(&self, frame: &RgbImage) -> Result<DetectionBatch, DetectorError> {
    let (width, height) = frame.dimensions();

    let now = Instant::now();
    let input = self.preprocess(frame);
    let preprocess = now.elapsed();

    let now = Instant::now();
    let output = self.infer(&input)?;
    let inference = now.elapsed();

    let now = Instant::now();
    let detections = self.decoder.decode(output, width, height)?;
    let postprocess = now.elapsed();

    debug!(
      "检测到 {} 个物体，耗时 {:.2?} / {:.2?} / {:.2?}",
      detections.len(),
      preprocess,
      inference,
      postprocess
    );

    Ok(DetectionBatch {
      detections,
      timings: StageTimings {
        preprocess: preprocess.as_secs_f64() * 1000.0,
        inference: inference.as_secs_f64() * 1000.0,
        postprocess: postprocess.as_secs_f64() * 1000.0,
      },
      width,
      height,
    })
  }
}

/// 非极大值抑制，仅在同类别之间比较
pub fn non_maximum_suppression(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
  // 按置信度降序排序
  detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut result: Vec<Detection> = Vec::with_capacity(detections.len());
  for det in detections {
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == det.class_id && iou(kept, &det) >= threshold);
    if !suppressed {
      result.push(det);
    }
  }
  result
}

/// 计算两个边界框的 IoU
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = (a.x + a.width).min(b.x + b.width);
  let y2 = (a.y + a.height).min(b.y + b.height);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.width * a.height + b.width * b.height - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}
