// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 图像、视频与实时流处理任务
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

use thiserror::Error;

use crate::{
  job::UploadError, media::MediaError, model::DetectorError, transcode::TranscodeError,
};

mod image_task;
mod live_task;
mod video_task;

pub use self::image_task::ImageTask;
pub use self::live_task::{BOUNDARY, LiveTask, encode_jpeg, multipart_part};
pub use self::video_task::{IntermediateFile, VideoTask};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("{0}")]
  Validation(#[from] UploadError),
  #[error("model invocation failed: {0}")]
  ModelInvocation(#[from] DetectorError),
  #[error("failed to open media: {0}")]
  DeviceOpen(MediaError),
  #[error("FFmpeg not found. Please install FFmpeg")]
  TranscoderUnavailable,
  #[error("transcoding failed: {0}")]
  TranscodeExit(TranscodeError),
  #[error("media error: {0}")]
  Media(#[from] MediaError),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("image error: {0}")]
  Image(#[from] image::ImageError),
  #[error("task aborted: {0}")]
  Aborted(String),
}

impl From<TranscodeError> for TaskError {
  fn from(e: TranscodeError) -> Self {
    match e {
      TranscodeError::Unavailable => TaskError::TranscoderUnavailable,
      other => TaskError::TranscodeExit(other),
    }
  }
}

impl TaskError {
  /// 展示给用户的提示信息
  pub fn user_message(&self) -> String {
    match self {
      TaskError::Validation(e) => e.to_string(),
      TaskError::TranscoderUnavailable => self.to_string(),
      other => format!("Processing error: {}", other),
    }
  }
}

/// 处理任务
///
/// `J` 为任务输入，实现者在当前线程上同步执行完整流程。
pub trait Task<J> {
  type Output;

  fn run_task(&self, job: J) -> Result<Self::Output, TaskError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn user_messages() {
    assert_eq!(
      TaskError::from(UploadError::UnsupportedType).user_message(),
      "Unsupported file type"
    );
    assert_eq!(
      TaskError::from(TranscodeError::Unavailable).user_message(),
      "FFmpeg not found. Please install FFmpeg"
    );
    let exit = TaskError::from(TranscodeError::Exit {
      code: Some(1),
      stderr: "boom".to_string(),
    });
    assert!(matches!(exit, TaskError::TranscodeExit(_)));
    assert!(exit.user_message().starts_with("Processing error: "));
  }
}
