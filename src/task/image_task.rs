// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task/image_task.rs - 单张图像检测任务
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

use std::time::Instant;

use tracing::info;

use super::{Task, TaskError};
use crate::{
  job::JobPaths,
  model::Detector,
  output::Annotator,
  stats::{StatsAccumulator, StatsSummary},
};

pub struct ImageTask<'a> {
  detector: &'a dyn Detector,
  annotator: &'a Annotator,
}

impl<'a> ImageTask<'a> {
  pub fn new(detector: &'a dyn Detector, annotator: &'a Annotator) -> Self {
    Self {
      detector,
      annotator,
    }
  }
}

impl<'j> Task<&'j JobPaths> for ImageTask<'_> {
  type Output = StatsSummary;

  fn run_task(&self, job: &'j JobPaths) -> Result<Self::Output, TaskError> {
    info!("开始图像任务 {}: {}", job.id, job.input.display());

    let now = Instant::now();
    let (image, batch) = self.detector.detect_file(&job.input)?;
    let round_trip = now.elapsed();
    info!(
      "检测完成，{} 个物体，耗时: {:.2?}",
      batch.detections.len(),
      round_trip
    );

    let annotated = self.annotator.annotate(&image, &batch.detections);
    if let Some(parent) = job.output.parent() {
      std::fs::create_dir_all(parent)?;
    }
    annotated.save(&job.output)?;

    let mut stats = StatsAccumulator::start();
    stats.accumulate(&batch, round_trip);
    Ok(stats.finalize(1, batch.resolution(), 0.0))
  }
}
