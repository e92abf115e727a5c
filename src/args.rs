// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::{Args, Parser};
use url::Url;

use crate::{
  model::{DetectorError, YoloDetector, YoloDetectorBuilder},
  output::{Annotator, AnnotatorError},
  web::WebConfig,
};

const MIB: usize = 1024 * 1024;

/// 检测模型参数
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// ONNX 模型文件路径
  #[arg(long, env = "SHANAN_MODEL", default_value = "yolov8n.onnx", value_name = "FILE")]
  pub model: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "SHANAN_CONFIDENCE", default_value_t = 0.25, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "SHANAN_IOU_THRESHOLD", default_value_t = 0.7, value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 标注字体（TTF），缺省使用内置字体
  #[arg(long, env = "SHANAN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// FFmpeg 可执行文件路径，缺省时在 PATH 中查找
  #[arg(long, env = "SHANAN_FFMPEG", value_name = "FILE")]
  pub ffmpeg: Option<PathBuf>,
}

impl DetectorArgs {
  pub fn build_detector(&self) -> Result<YoloDetector, DetectorError> {
    YoloDetectorBuilder::new(&self.model)
      .confidence(self.confidence)
      .nms_threshold(self.iou_threshold)
      .build()
  }

  pub fn build_annotator(&self) -> Result<Annotator, AnnotatorError> {
    match &self.font {
      Some(path) => Annotator::from_font_file(path),
      None => Ok(Annotator::new()?),
    }
  }
}

/// Web 服务参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
  /// 监听地址
  #[arg(long, env = "SHANAN_HOST", default_value = "127.0.0.1")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "SHANAN_PORT", default_value_t = 5000)]
  pub port: u16,

  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 静态资源目录
  #[arg(long, env = "SHANAN_STATIC_DIR", default_value = "static", value_name = "DIR")]
  pub static_dir: PathBuf,

  /// 上传文件保存目录
  #[arg(long, env = "SHANAN_UPLOAD_DIR", default_value = "static/uploads", value_name = "DIR")]
  pub upload_dir: PathBuf,

  /// 结果文件保存目录
  #[arg(long, env = "SHANAN_RESULT_DIR", default_value = "static/results", value_name = "DIR")]
  pub result_dir: PathBuf,

  /// 上传大小上限（MiB）
  #[arg(long, env = "SHANAN_MAX_UPLOAD_MB", default_value_t = 100)]
  pub max_upload_mb: usize,

  /// 实时流摄像头
  /// 支持格式:
  /// - gst://auto
  /// - gst://camera/dev/video0?width=640&height=480&fps=30
  /// - gst://test
  #[arg(long, env = "SHANAN_CAMERA", default_value = "gst://auto", value_name = "URL")]
  pub camera: Url,

  /// 实时流 JPEG 质量 (1 - 100)
  #[arg(long, env = "SHANAN_JPEG_QUALITY", default_value_t = 95,
        value_parser = clap::value_parser!(u8).range(1..=100))]
  pub jpeg_quality: u8,
}

impl ServerArgs {
  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn web_config(&self) -> WebConfig {
    WebConfig {
      static_dir: self.static_dir.clone(),
      upload_dir: self.upload_dir.clone(),
      result_dir: self.result_dir.clone(),
      max_upload_bytes: self.max_upload_mb.saturating_mul(MIB),
      jpeg_quality: self.jpeg_quality,
    }
  }
}
