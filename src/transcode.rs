// 该文件是 Shanan （山南西风） 项目的一部分。
// src/transcode.rs - 外部 FFmpeg 转码
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
  ffi::{OsStr, OsString},
  path::{Path, PathBuf},
  process::{Command, Stdio},
};

use thiserror::Error;
use tracing::{debug, info};

const FFMPEG_BINARY: &str = "ffmpeg";

/// Windows 下的常见安装位置
const WINDOWS_FALLBACK_PATHS: [&str; 3] = [
  r"C:\ffmpeg\bin\ffmpeg.exe",
  r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
  r"C:\Program Files (x86)\ffmpeg\bin\ffmpeg.exe",
];

#[derive(Error, Debug)]
pub enum TranscodeError {
  #[error("FFmpeg not found. Please install FFmpeg")]
  Unavailable,
  #[error("failed to launch transcoder: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("transcoder exited with status {code:?}: {stderr}")]
  Exit { code: Option<i32>, stderr: String },
}

/// 将中间视频转码为最终交付格式
pub trait Transcoder: Send + Sync {
  fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// 查找可用的转码器，找不到时返回 `None`
pub trait TranscoderLocator: Send + Sync {
  fn locate(&self) -> Option<Box<dyn Transcoder>>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegLocator {
  explicit: Option<PathBuf>,
}

impl FfmpegLocator {
  pub fn new(explicit: Option<PathBuf>) -> Self {
    Self { explicit }
  }
}

impl TranscoderLocator for FfmpegLocator {
  fn locate(&self) -> Option<Box<dyn Transcoder>> {
    find_ffmpeg_with(self.explicit.as_deref(), std::env::var_os("PATH").as_deref())
      .map(|path| Box::new(FfmpegTranscoder::new(path)) as Box<dyn Transcoder>)
  }
}

/// 查找顺序：显式配置路径，`path_var` 中的搜索路径，Windows 常见位置
pub fn find_ffmpeg_with(explicit: Option<&Path>, path_var: Option<&OsStr>) -> Option<PathBuf> {
  if let Some(path) = explicit {
    if path.is_file() {
      return Some(path.to_path_buf());
    }
    debug!("配置的 FFmpeg 路径不存在: {}", path.display());
  }

  let cwd = std::env::current_dir().unwrap_or_default();
  let search = path_var.map(OsString::from).unwrap_or_default();
  if let Ok(path) = which::which_in(FFMPEG_BINARY, Some(search), cwd) {
    return Some(path);
  }

  if cfg!(windows) {
    return WINDOWS_FALLBACK_PATHS
      .iter()
      .map(PathBuf::from)
      .find(|path| path.is_file());
  }

  None
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
  path: PathBuf,
}

impl FfmpegTranscoder {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// H.264、fast 预设、faststart 与 yuv420p，保证浏览器可直接播放
  pub fn build_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
    args.extend(
      [
        "-c:v",
        "libx264",
        "-preset",
        "fast",
        "-movflags",
        "+faststart",
        "-pix_fmt",
        "yuv420p",
        "-loglevel",
        "error",
      ]
      .into_iter()
      .map(OsString::from),
    );
    args.push(output.into());
    args
  }
}

impl Transcoder for FfmpegTranscoder {
  fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
    let args = Self::build_args(input, output);
    debug!("执行转码: {} {:?}", self.path.display(), args);

    let result = Command::new(&self.path)
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .output()?;

    if !result.status.success() {
      return Err(TranscodeError::Exit {
        code: result.status.code(),
        stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
      });
    }

    info!("转码完成: {}", output.display());
    Ok(())
  }
}
