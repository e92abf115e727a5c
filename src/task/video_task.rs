// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task/video_task.rs - 视频逐帧检测与转码任务
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
  io::ErrorKind,
  path::{Path, PathBuf},
  time::Instant,
};

use tracing::{debug, error, info, warn};

use super::{Task, TaskError};
use crate::{
  job::JobPaths,
  media::MediaBackend,
  model::Detector,
  output::Annotator,
  stats::{StatsAccumulator, StatsSummary},
  transcode::Transcoder,
};

/// 中间视频文件，丢弃时删除
pub struct IntermediateFile {
  path: PathBuf,
}

impl IntermediateFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for IntermediateFile {
  fn drop(&mut self) {
    match std::fs::remove_file(&self.path) {
      Ok(()) => debug!("已删除中间文件 {}", self.path.display()),
      Err(e) if e.kind() == ErrorKind::NotFound => {}
      Err(e) => warn!("删除中间文件 {} 失败: {}", self.path.display(), e),
    }
  }
}

pub struct VideoTask<'a> {
  detector: &'a dyn Detector,
  annotator: &'a Annotator,
  media: &'a dyn MediaBackend,
  transcoder: &'a dyn Transcoder,
}

impl<'a> VideoTask<'a> {
  pub fn new(
    detector: &'a dyn Detector,
    annotator: &'a Annotator,
    media: &'a dyn MediaBackend,
    transcoder: &'a dyn Transcoder,
  ) -> Self {
    Self {
      detector,
      annotator,
      media,
      transcoder,
    }
  }
}

impl<'j> Task<&'j JobPaths> for VideoTask<'_> {
  type Output = StatsSummary;

  fn run_task(&self, job: &'j JobPaths) -> Result<Self::Output, TaskError> {
    info!("开始视频任务 {}: {}", job.id, job.input.display());

    let mut source = self
      .media
      .open_video(&job.input)
      .map_err(TaskError::DeviceOpen)?;
    let info = source.info();
    let fps = info.fps_or_default();
    info!(
      "视频信息: {}x{} @ {} fps（源报告 {:?}）",
      info.width, info.height, fps, info.fps
    );

    if let Some(parent) = job.temp.parent() {
      std::fs::create_dir_all(parent)?;
    }
    // 先于 writer 声明，保证 writer 先关闭再删除文件
    let temp = IntermediateFile::new(&job.temp);
    let mut writer = self
      .media
      .create_writer(temp.path(), info.width, info.height, fps)?;

    let mut stats = StatsAccumulator::start();
    let mut frames: u64 = 0;
    let started = Instant::now();
    for frame in source.by_ref() {
      let now = Instant::now();
      let batch = self.detector.detect(&frame)?;
      let round_trip = now.elapsed();
      stats.accumulate(&batch, round_trip);

      let annotated = self.annotator.annotate(&frame, &batch.detections);
      writer.write_frame(&annotated)?;
      frames += 1;
      debug!(
        "第 {} 帧: {} 个物体，耗时 {:.2?}",
        frames,
        batch.detections.len(),
        round_trip
      );
    }
    drop(source);
    writer.finish()?;
    drop(writer);
    info!("逐帧处理完成，共 {} 帧，耗时: {:.2?}", frames, started.elapsed());

    let summary = stats.finalize(frames, info.resolution(), fps);

    if let Some(parent) = job.output.parent() {
      std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = self.transcoder.transcode(temp.path(), &job.output) {
      error!("转码失败: {}", e);
      if let Err(remove) = std::fs::remove_file(&job.output) {
        if remove.kind() != ErrorKind::NotFound {
          warn!("删除不完整输出 {} 失败: {}", job.output.display(), remove);
        }
      }
      return Err(e.into());
    }

    info!("视频任务 {} 完成: {}", job.id, job.output.display());
    Ok(summary)
  }
}
