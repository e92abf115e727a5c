// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 检测模型适配层
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

use image::{ImageReader, RgbImage};
use thiserror::Error;

mod yolo;
pub use self::yolo::{YoloDetector, YoloDetectorBuilder, iou, non_maximum_suppression};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 类别编号对应的名称，超出表范围时退化为编号本身
pub fn class_name(class_id: usize) -> String {
  COCO_CLASSES
    .get(class_id)
    .map(|name| name.to_string())
    .unwrap_or_else(|| class_id.to_string())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
  /// 边界框左上角 x 坐标（像素）
  pub x: f32,
  /// 边界框左上角 y 坐标（像素）
  pub y: f32,
  /// 边界框宽度
  pub width: f32,
  /// 边界框高度
  pub height: f32,
  /// 置信度
  pub confidence: f32,
  /// 类别索引
  pub class_id: usize,
  /// 类别名称
  pub class_name: String,
}

/// 模型各阶段耗时，单位毫秒
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageTimings {
  pub preprocess: f64,
  pub inference: f64,
  pub postprocess: f64,
}

/// 单帧检测结果
#[derive(Clone, Debug)]
pub struct DetectionBatch {
  pub detections: Vec<Detection>,
  pub timings: StageTimings,
  /// 源帧宽度
  pub width: u32,
  /// 源帧高度
  pub height: u32,
}

impl DetectionBatch {
  pub fn resolution(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("model file not found: {0}")]
  ModelPath(String),
  #[error("ONNX runtime error: {0}")]
  Ort(#[from] ort::Error),
  #[error("unexpected model output shape: {0}")]
  Shape(#[from] ndarray::ShapeError),
  #[error("model returned no output named '{0}'")]
  MissingOutput(String),
  #[error("failed to decode image: {0}")]
  Decode(#[from] image::ImageError),
  #[error("failed to read image: {0}")]
  Io(#[from] std::io::Error),
  #[error("model session lock poisoned")]
  Poisoned,
}

/// 目标检测器
///
/// 进程启动时加载一次，之后被所有请求只读共享，
/// 实现者必须允许并发调用或在内部串行化。
pub trait Detector: Send + Sync {
  fn detect(&self, frame: &RgbImage) -> Result<DetectionBatch, DetectorError>;

  /// 从文件读取图像后检测，返回解码后的图像以便后续绘制
  ///
  /// 按文件内容识别格式，扩展名与内容不符的图像也能读取。
  fn detect_file(&self, path: &Path) -> Result<(RgbImage, DetectionBatch), DetectorError> {
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    let batch = self.detect(&image)?;
    Ok((image, batch))
  }
}
