// 该文件是 Shanan （山南西风） 项目的一部分。
// src/web/handlers.rs - HTTP 请求处理
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

use std::{convert::Infallible, path::Path};

use axum::{
  body::Body,
  extract::{Multipart, Query, State, multipart::MultipartError},
  http::{StatusCode, header},
  response::{Html, IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{error, info, warn};

use super::{pages, state::AppState};
use crate::{
  job::{JobPaths, MediaKind, UploadError, validate_upload},
  stats::StatsSummary,
  task::{BOUNDARY, ImageTask, LiveTask, Task, TaskError, VideoTask},
};

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
  error: Option<String>,
}

pub async fn index(Query(query): Query<IndexQuery>) -> Html<String> {
  Html(pages::index_page(query.error.as_deref()))
}

pub async fn realtime() -> Html<String> {
  Html(pages::realtime_page())
}

enum PredictError {
  /// 请求体超过上限
  TooLarge,
  Task(TaskError),
}

impl From<TaskError> for PredictError {
  fn from(e: TaskError) -> Self {
    PredictError::Task(e)
  }
}

impl From<UploadError> for PredictError {
  fn from(e: UploadError) -> Self {
    PredictError::Task(TaskError::Validation(e))
  }
}

impl From<std::io::Error> for PredictError {
  fn from(e: std::io::Error) -> Self {
    PredictError::Task(TaskError::Io(e))
  }
}

fn multipart_error(e: MultipartError) -> PredictError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    PredictError::TooLarge
  } else {
    PredictError::Task(TaskError::Aborted(e.body_text()))
  }
}

fn redirect_with_error(message: &str) -> Response {
  Redirect::to(&format!("/?error={}", urlencoding::encode(message))).into_response()
}

pub async fn predict(State(state): State<AppState>, multipart: Multipart) -> Response {
  match handle_predict(state, multipart).await {
    Ok(location) => Redirect::to(&location).into_response(),
    Err(PredictError::TooLarge) => {
      warn!("上传文件超过大小限制");
      StatusCode::PAYLOAD_TOO_LARGE.into_response()
    }
    Err(PredictError::Task(TaskError::Validation(e))) => redirect_with_error(&e.to_string()),
    Err(PredictError::Task(e)) => {
      error!("处理文件失败: {}", e);
      redirect_with_error(&e.user_message())
    }
  }
}

/// 读取上传字段，返回客户端文件名与内容
///
/// 没有 `file` 字段时文件名为 `None`；有字段但未选择文件时为空字符串。
async fn read_upload(
  multipart: &mut Multipart,
) -> Result<(Option<String>, Bytes), PredictError> {
  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let filename = field.file_name().unwrap_or_default().to_string();
    let data = field.bytes().await.map_err(multipart_error)?;
    return Ok((Some(filename), data));
  }
  Ok((None, Bytes::new()))
}

async fn handle_predict(state: AppState, mut multipart: Multipart) -> Result<String, PredictError> {
  let (filename, data) = read_upload(&mut multipart).await?;
  let (ext, kind) = validate_upload(filename.as_deref())?;

  let config = state.config.clone();
  let job = JobPaths::allocate(kind, &ext, &config.upload_dir, &config.result_dir);
  tokio::fs::create_dir_all(&config.upload_dir).await?;
  tokio::fs::create_dir_all(&config.result_dir).await?;
  tokio::fs::write(&job.input, &data).await?;
  info!(
    "收到上传 {:?}，{} 字节，保存为 {}",
    filename,
    data.len(),
    job.input.display()
  );

  let stats = match kind {
    MediaKind::Image => {
      let job = job.clone();
      let state = state.clone();
      tokio::task::spawn_blocking(move || {
        ImageTask::new(state.detector.as_ref(), &state.annotator).run_task(&job)
      })
      .await
      .map_err(|e| TaskError::Aborted(e.to_string()))??
    }
    MediaKind::Video => {
      // 在读取任何帧之前确认转码器可用
      let transcoder = state
        .transcoders
        .locate()
        .ok_or(TaskError::TranscoderUnavailable)?;
      let job = job.clone();
      let state = state.clone();
      tokio::task::spawn_blocking(move || {
        VideoTask::new(
          state.detector.as_ref(),
          &state.annotator,
          state.media.as_ref(),
          transcoder.as_ref(),
        )
        .run_task(&job)
      })
      .await
      .map_err(|e| TaskError::Aborted(e.to_string()))??
    }
  };

  let stats = serde_json::to_string(&stats).map_err(|e| TaskError::Aborted(e.to_string()))?;
  let input = job.input_file_name().unwrap_or_default();
  let output = job.output_file_name().unwrap_or_default();
  Ok(format!(
    "/results?input={}&output={}&stats={}",
    urlencoding::encode(&input),
    urlencoding::encode(&output),
    urlencoding::encode(&stats)
  ))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
  input: Option<String>,
  output: Option<String>,
  stats: Option<String>,
}

/// 仅接受目录下真实存在的单层文件名
fn existing_artifact<'a>(dir: &Path, name: &'a str) -> Option<&'a str> {
  let path = Path::new(name);
  let bare = path.file_name().is_some_and(|f| f == path.as_os_str());
  (bare && dir.join(path).is_file()).then_some(name)
}

pub async fn results(
  State(state): State<AppState>,
  Query(query): Query<ResultsQuery>,
) -> Html<String> {
  let media_url = |dir: &Path, prefix: &str, name: Option<&str>| {
    name
      .and_then(|name| existing_artifact(dir, name))
      .map(|name| format!("{}/{}", prefix, urlencoding::encode(name)))
  };

  let input = media_url(
    &state.config.upload_dir,
    "/media/uploads",
    query.input.as_deref(),
  );
  let output = media_url(
    &state.config.result_dir,
    "/media/results",
    query.output.as_deref(),
  );
  let stats = StatsSummary::from_json_or_default(query.stats.as_deref());

  Html(pages::results_page(
    input.as_deref(),
    output.as_deref(),
    &stats,
  ))
}

/// MJPEG 实时流
///
/// 检测在阻塞线程上运行，通过容量为 1 的通道逐帧发送；
/// 客户端断开后通道关闭，任务结束并释放摄像头。
pub async fn video_feed(State(state): State<AppState>) -> Response {
  let (tx, rx) = mpsc::channel::<Bytes>(1);

  tokio::task::spawn_blocking(move || {
    let task = LiveTask::new(
      state.detector.as_ref(),
      &state.annotator,
      state.media.as_ref(),
      state.config.jpeg_quality,
    );
    match task.run_task(|part: Bytes| tx.blocking_send(part).is_ok()) {
      Ok(frames) => info!("实时流任务结束，共 {} 帧", frames),
      Err(e) => error!("实时流任务异常结束: {}", e),
    }
  });

  let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
  (
    [(
      header::CONTENT_TYPE,
      format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
    )],
    Body::from_stream(stream),
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_bare_existing_names_are_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("abc.png"), b"x").unwrap();

    assert_eq!(existing_artifact(dir.path(), "abc.png"), Some("abc.png"));
    assert_eq!(existing_artifact(dir.path(), "missing.png"), None);
    assert_eq!(existing_artifact(dir.path(), "../abc.png"), None);
    assert_eq!(existing_artifact(dir.path(), "sub/abc.png"), None);
    assert_eq!(existing_artifact(dir.path(), ".."), None);
    assert_eq!(existing_artifact(dir.path(), ""), None);
  }
}
