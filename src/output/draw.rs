// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::model::Detection;

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: u32 = 2;
const BOX_THICKNESS: u32 = 2;
const PALETTE_SIZE: usize = 80;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum AnnotatorError {
  #[error("failed to read font file: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid font: {0}")]
  Font(#[from] InvalidFont),
}

/// 帧标注器
///
/// 在帧上绘制边界框与“类别 置信度”标签，相同输入总是得到相同输出。
#[derive(Clone)]
pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
  colors: Vec<Rgb<u8>>,
}

impl Annotator {
  /// 使用内置字体
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    Ok(Self::with_font(FontArc::try_from_slice(font_data)?))
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, AnnotatorError> {
    let data = std::fs::read(path)?;
    Ok(Self::with_font(FontArc::try_from_vec(data)?))
  }

  pub fn with_font(font: FontArc) -> Self {
    // 每个 COCO 类别一种颜色
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
    }
  }

  pub fn color_of(&self, class_id: usize) -> Rgb<u8> {
    self.colors[class_id % self.colors.len()]
  }

  /// 返回标注后的新图像，输入保持不变
  pub fn annotate(&self, frame: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut annotated = frame.clone();
    self.draw_detections(&mut annotated, detections);
    annotated
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_one(image, detection);
    }
  }

  fn draw_one(&self, image: &mut RgbImage, detection: &Detection) {
    let (img_w, img_h) = (image.width() as i32, image.height() as i32);
    if img_w == 0 || img_h == 0 {
      return;
    }
    let color = self.color_of(detection.class_id);

    let x_min = (detection.x.floor() as i32).clamp(0, img_w - 1);
    let y_min = (detection.y.floor() as i32).clamp(0, img_h - 1);
    let x_max = ((detection.x + detection.width).ceil() as i32).clamp(0, img_w - 1);
    let y_max = ((detection.y + detection.height).ceil() as i32).clamp(0, img_h - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..BOX_THICKNESS as i32 {
      let w = x_max - x_min + 1 - 2 * t;
      let h = y_max - y_min + 1 - 2 * t;
      if w <= 0 || h <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(w as u32, h as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = format!("{} {:.2}", detection.class_name, detection.confidence);
    let (text_w, text_h) = text_size(self.font_scale, &self.font, &label);
    let label_w = (text_w + 2 * LABEL_PADDING).min((img_w - x_min) as u32);
    let label_h = text_h + 2 * LABEL_PADDING;
    // 框上方放不下时画在框内
    let label_y = if y_min >= label_h as i32 {
      y_min - label_h as i32
    } else {
      y_min
    };

    if label_w > 0 && label_h > 0 {
      let background = Rect::at(x_min, label_y).of_size(label_w, label_h);
      draw_filled_rect_mut(image, background, color);
      draw_text_mut(
        image,
        TEXT_COLOR,
        x_min + LABEL_PADDING as i32,
        label_y + LABEL_PADDING as i32,
        self.font_scale,
        &self.font,
        &label,
      );
    }
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::class_name;

  fn detection(x: f32, y: f32, w: f32, h: f32, class_id: usize) -> Detection {
    Detection {
      x,
      y,
      width: w,
      height: h,
      confidence: 0.87,
      class_id,
      class_name: class_name(class_id),
    }
  }

  fn gray(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([40, 40, 40]))
  }

  #[test]
  fn annotation_is_deterministic() {
    let annotator = Annotator::new().unwrap();
    let frame = gray(160, 120);
    let dets = vec![detection(20.0, 40.0, 60.0, 50.0, 0), detection(90.0, 5.0, 40.0, 40.0, 16)];
    let first = annotator.annotate(&frame, &dets);
    let second = annotator.annotate(&frame, &dets);
    assert_eq!(first, second);
    assert_eq!(first.dimensions(), frame.dimensions());
    assert_ne!(first, frame);
  }

  #[test]
  fn no_detections_leaves_frame_unchanged() {
    let annotator = Annotator::new().unwrap();
    let frame = gray(64, 48);
    assert_eq!(annotator.annotate(&frame, &[]), frame);
  }

  #[test]
  fn box_outside_frame_is_clamped() {
    let annotator = Annotator::new().unwrap();
    let frame = gray(32, 32);
    let out = annotator.annotate(&frame, &[detection(-10.0, -10.0, 500.0, 500.0, 2)]);
    assert_eq!(out.dimensions(), (32, 32));
    assert_eq!(*out.get_pixel(31, 31), annotator.color_of(2));
  }

  #[test]
  fn degenerate_box_draws_nothing() {
    let annotator = Annotator::new().unwrap();
    let frame = gray(32, 32);
    let out = annotator.annotate(&frame, &[detection(10.0, 10.0, 0.0, 0.0, 1)]);
    assert_eq!(out, frame);
  }
}
