// 该文件是 Shanan （山南西风） 项目的一部分。
// src/web.rs - HTTP 服务路由
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

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

mod handlers;
mod pages;
mod state;

pub use self::pages::escape_html;
pub use self::state::{AppState, WebConfig};

/// 构建完整路由
///
/// 上传大小由 `RequestBodyLimitLayer` 统一限制，超限请求直接返回 413。
pub fn router(state: AppState) -> Router {
  let config = state.config.clone();

  Router::new()
    .route("/", get(handlers::index))
    .route("/predict", post(handlers::predict))
    .route("/results", get(handlers::results))
    .route("/realtime", get(handlers::realtime))
    .route("/video_feed", get(handlers::video_feed))
    .nest_service("/static", ServeDir::new(&config.static_dir))
    .nest_service("/media/uploads", ServeDir::new(&config.upload_dir))
    .nest_service("/media/results", ServeDir::new(&config.result_dir))
    .layer(DefaultBodyLimit::disable())
    .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
