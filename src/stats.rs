// 该文件是 Shanan （山南西风） 项目的一部分。
// src/stats.rs - 检测结果统计汇总
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

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::model::{DetectionBatch, StageTimings};

/// 各阶段耗时，单位毫秒
///
/// 视频任务中 `preprocess`/`inference`/`postprocess` 为每帧平均值，
/// `total` 为所有帧往返耗时之和。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeStats {
  pub preprocess: f64,
  pub inference: f64,
  pub postprocess: f64,
  pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSummary {
  pub time: TimeStats,
  pub objects: BTreeMap<String, u64>,
  pub resolution: String,
  pub fps: f64,
}

impl Default for StatsSummary {
  fn default() -> Self {
    Self {
      time: TimeStats::default(),
      objects: BTreeMap::new(),
      resolution: "Unknown".to_string(),
      fps: 0.0,
    }
  }
}

impl StatsSummary {
  /// 解析结果页携带的统计 JSON，失败时退回默认值
  pub fn from_json_or_default(raw: Option<&str>) -> Self {
    raw
      .and_then(|s| serde_json::from_str(s).ok())
      .unwrap_or_default()
  }
}

pub fn format_resolution(width: u32, height: u32) -> String {
  format!("{}x{}", width, height)
}

/// 统计累加器
#[derive(Debug, Default)]
pub struct StatsAccumulator {
  stage_sums: StageTimings,
  total_ms: f64,
  objects: BTreeMap<String, u64>,
}

impl StatsAccumulator {
  pub fn start() -> Self {
    Self::default()
  }

  /// 累加一帧的检测结果，`round_trip` 为该帧检测调用的整体耗时
  pub fn accumulate(&mut self, batch: &DetectionBatch, round_trip: Duration) {
    self.stage_sums.preprocess += batch.timings.preprocess;
    self.stage_sums.inference += batch.timings.inference;
    self.stage_sums.postprocess += batch.timings.postprocess;
    self.total_ms += round_trip.as_secs_f64() * 1000.0;

    for det in &batch.detections {
      *self.objects.entry(det.class_name.clone()).or_insert(0) += 1;
    }
  }

  pub fn finalize(self, frame_count: u64, resolution: (u32, u32), fps: f64) -> StatsSummary {
    let mut time = TimeStats {
      preprocess: self.stage_sums.preprocess,
      inference: self.stage_sums.inference,
      postprocess: self.stage_sums.postprocess,
      total: self.total_ms,
    };

    if frame_count > 1 {
      let n = frame_count as f64;
      time.preprocess /= n;
      time.inference /= n;
      time.postprocess /= n;
    } else if frame_count == 0 {
      time.preprocess = 0.0;
      time.inference = 0.0;
      time.postprocess = 0.0;
    }

    StatsSummary {
      time,
      objects: self.objects,
      resolution: format_resolution(resolution.0, resolution.1),
      fps,
    }
  }
}
