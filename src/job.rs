// 该文件是 Shanan （山南西风） 项目的一部分。
// src/job.rs - 上传校验与任务文件路径
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "webm"];

/// 视频结果统一封装格式
pub const VIDEO_OUTPUT_EXTENSION: &str = "mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  pub fn from_extension(ext: &str) -> Option<Self> {
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
      Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
      Some(MediaKind::Video)
    } else {
      None
    }
  }

  /// 结果文件扩展名：图像保持原扩展名，视频统一为 mp4
  pub fn output_extension<'a>(&self, input_ext: &'a str) -> &'a str {
    match self {
      MediaKind::Image => input_ext,
      MediaKind::Video => VIDEO_OUTPUT_EXTENSION,
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
  #[error("No file uploaded")]
  NoFile,
  #[error("No file selected")]
  EmptyFilename,
  #[error("Unsupported file type")]
  UnsupportedType,
}

/// 取最后一个 `.` 之后的部分并转为小写
pub fn extension_of(filename: &str) -> Option<String> {
  let (_, ext) = filename.rsplit_once('.')?;
  Some(ext.to_ascii_lowercase())
}

pub fn is_allowed_extension(ext: &str) -> bool {
  MediaKind::from_extension(ext).is_some()
}

pub fn generate_unique_id() -> String {
  Uuid::new_v4().simple().to_string()
}

/// 校验上传文件名，返回小写扩展名与任务类型
pub fn validate_upload(filename: Option<&str>) -> Result<(String, MediaKind), UploadError> {
  let filename = filename.ok_or(UploadError::NoFile)?;
  if filename.is_empty() {
    return Err(UploadError::EmptyFilename);
  }

  let ext = extension_of(filename).ok_or(UploadError::UnsupportedType)?;
  let kind = MediaKind::from_extension(&ext).ok_or(UploadError::UnsupportedType)?;
  Ok((ext, kind))
}

/// 一次任务涉及的全部文件路径，共用同一个唯一标识
#[derive(Debug, Clone)]
pub struct JobPaths {
  pub id: String,
  pub kind: MediaKind,
  pub input: PathBuf,
  pub output: PathBuf,
  pub temp: PathBuf,
}

impl JobPaths {
  pub fn new(
    id: impl Into<String>,
    kind: MediaKind,
    ext: &str,
    upload_dir: &Path,
    result_dir: &Path,
  ) -> Self {
    let id = id.into();
    let input = upload_dir.join(format!("{}.{}", id, ext));
    Self::with_input(id, kind, ext, input, result_dir)
  }

  /// 为新上传分配唯一路径
  pub fn allocate(kind: MediaKind, ext: &str, upload_dir: &Path, result_dir: &Path) -> Self {
    Self::new(generate_unique_id(), kind, ext, upload_dir, result_dir)
  }

  /// 输入文件已存在时（命令行）只生成输出路径
  pub fn with_input(
    id: impl Into<String>,
    kind: MediaKind,
    ext: &str,
    input: PathBuf,
    result_dir: &Path,
  ) -> Self {
    let id = id.into();
    let output = result_dir.join(format!("{}.{}", id, kind.output_extension(ext)));
    let temp = result_dir.join(format!("temp_{}.{}", id, VIDEO_OUTPUT_EXTENSION));
    Self {
      id,
      kind,
      input,
      output,
      temp,
    }
  }

  pub fn input_file_name(&self) -> Option<String> {
    file_name(&self.input)
  }

  pub fn output_file_name(&self) -> Option<String> {
    file_name(&self.output)
  }
}

fn file_name(path: &Path) -> Option<String> {
  path
    .file_name()
    .and_then(|name| name.to_str())
    .map(String::from)
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn validation_messages() {
    assert_eq!(validate_upload(None), Err(UploadError::NoFile));
    assert_eq!(validate_upload(Some("")), Err(UploadError::EmptyFilename));
    assert_eq!(
      validate_upload(Some("notes.txt")),
      Err(UploadError::UnsupportedType)
    );
    assert_eq!(
      validate_upload(Some("no_extension")),
      Err(UploadError::UnsupportedType)
    );
    assert_eq!(UploadError::NoFile.to_string(), "No file uploaded");
    assert_eq!(UploadError::EmptyFilename.to_string(), "No file selected");
    assert_eq!(
      UploadError::UnsupportedType.to_string(),
      "Unsupported file type"
    );
  }

  #[test]
  fn allowed_extensions() {
    assert!(is_allowed_extension("webp"));
    assert!(is_allowed_extension("MOV"));
    assert!(!is_allowed_extension("gif"));
    assert_eq!(extension_of("a.b.JPEG").as_deref(), Some("jpeg"));
    assert_eq!(extension_of("noext"), None);
  }

  #[test]
  fn kind_is_resolved_case_insensitively() {
    assert_eq!(
      validate_upload(Some("Photo.JPG")),
      Ok(("jpg".to_string(), MediaKind::Image))
    );
    assert_eq!(
      validate_upload(Some("clip.tar.webm")),
      Ok(("webm".to_string(), MediaKind::Video))
    );
  }

  #[test]
  fn video_output_is_normalized_to_mp4() {
    let paths = JobPaths::new(
      "abc",
      MediaKind::Video,
      "avi",
      Path::new("up"),
      Path::new("res"),
    );
    assert_eq!(paths.input, Path::new("up/abc.avi"));
    assert_eq!(paths.output, Path::new("res/abc.mp4"));
    assert_eq!(paths.temp, Path::new("res/temp_abc.mp4"));
    assert_eq!(paths.output_file_name().as_deref(), Some("abc.mp4"));
  }

  #[test]
  fn image_output_keeps_extension() {
    let paths = JobPaths::new(
      "abc",
      MediaKind::Image,
      "png",
      Path::new("up"),
      Path::new("res"),
    );
    assert_eq!(paths.output, Path::new("res/abc.png"));
    assert_eq!(paths.input_file_name().as_deref(), Some("abc.png"));
  }

  #[test]
  fn allocated_paths_do_not_collide() {
    let mut seen = HashSet::new();
    for _ in 0..1000 {
      let paths = JobPaths::allocate(MediaKind::Video, "mp4", Path::new("u"), Path::new("r"));
      assert!(seen.insert(paths.input));
      assert!(seen.insert(paths.output));
      assert!(seen.insert(paths.temp));
    }
  }
}
