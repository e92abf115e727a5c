// 该文件是 Shanan （山南西风） 项目的一部分。
// src/web/pages.rs - HTML 页面
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

use std::fmt::Write;

use crate::{
  job::{IMAGE_EXTENSIONS, MediaKind, VIDEO_EXTENSIONS, extension_of},
  stats::StatsSummary,
};

pub fn escape_html(raw: &str) -> String {
  let mut escaped = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      c => escaped.push(c),
    }
  }
  escaped
}

fn layout(title: &str, body: &str) -> String {
  format!(
    r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Upload</a> | <a href="/realtime">Realtime</a></nav>
<main>
{body}
</main>
</body>
</html>
"#,
    title = escape_html(title),
    body = body
  )
}

pub fn index_page(error: Option<&str>) -> String {
  let accept = IMAGE_EXTENSIONS
    .iter()
    .chain(VIDEO_EXTENSIONS.iter())
    .map(|ext| format!(".{}", ext))
    .collect::<Vec<_>>()
    .join(",");

  let mut body = String::from("<h1>Object Detection</h1>\n");
  if let Some(error) = error.filter(|e| !e.is_empty()) {
    let _ = writeln!(body, r#"<div class="flash error">{}</div>"#, escape_html(error));
  }
  let _ = write!(
    body,
    r#"<form action="/predict" method="post" enctype="multipart/form-data">
<input type="file" name="file" accept="{accept}">
<button type="submit">Detect</button>
</form>
<p>Images: {images}. Videos: {videos}.</p>"#,
    accept = accept,
    images = IMAGE_EXTENSIONS.join(", "),
    videos = VIDEO_EXTENSIONS.join(", "),
  );
  layout("Object Detection", &body)
}

fn media_element(url: &str) -> String {
  let url = escape_html(url);
  let kind = extension_of(&url).and_then(|ext| MediaKind::from_extension(&ext));
  match kind {
    Some(MediaKind::Video) => format!(
      r#"<video src="{}" controls preload="metadata" width="100%"></video>"#,
      url
    ),
    _ => format!(r#"<img src="{}" alt="" style="max-width:100%">"#, url),
  }
}

pub fn results_page(input_url: Option<&str>, output_url: Option<&str>, stats: &StatsSummary) -> String {
  let mut body = String::from("<h1>Detection Results</h1>\n<div class=\"media\">\n");

  for (title, url) in [("Input", input_url), ("Output", output_url)] {
    let _ = writeln!(body, "<section><h2>{}</h2>", title);
    match url {
      Some(url) => {
        let _ = writeln!(body, "{}", media_element(url));
      }
      None => body.push_str("<p>Not available</p>\n"),
    }
    body.push_str("</section>\n");
  }
  body.push_str("</div>\n");

  let _ = write!(
    body,
    r#"<h2>Statistics</h2>
<table class="stats">
<tr><th>Resolution</th><td>{resolution}</td></tr>
<tr><th>FPS</th><td>{fps:.2}</td></tr>
<tr><th>Preprocess</th><td>{pre:.2} ms</td></tr>
<tr><th>Inference</th><td>{inf:.2} ms</td></tr>
<tr><th>Postprocess</th><td>{post:.2} ms</td></tr>
<tr><th>Total</th><td>{total:.2} ms</td></tr>
</table>
"#,
    resolution = escape_html(&stats.resolution),
    fps = stats.fps,
    pre = stats.time.preprocess,
    inf = stats.time.inference,
    post = stats.time.postprocess,
    total = stats.time.total,
  );

  body.push_str("<h2>Objects</h2>\n");
  if stats.objects.is_empty() {
    body.push_str("<p>No objects detected</p>\n");
  } else {
    body.push_str("<ul class=\"objects\">\n");
    for (name, count) in &stats.objects {
      let _ = writeln!(body, "<li>{}: {}</li>", escape_html(name), count);
    }
    body.push_str("</ul>\n");
  }

  layout("Detection Results", &body)
}

pub fn realtime_page() -> String {
  layout(
    "Realtime Detection",
    r#"<h1>Realtime Detection</h1>
<img src="/video_feed" alt="live feed" style="max-width:100%">"#,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn html_is_escaped() {
    assert_eq!(
      escape_html(r#"<b a="1">&'"#),
      "&lt;b a=&quot;1&quot;&gt;&amp;&#39;"
    );
  }

  #[test]
  fn index_shows_flash_message() {
    let page = index_page(Some("No file <selected>"));
    assert!(page.contains("No file &lt;selected&gt;"));
    assert!(!index_page(None).contains("flash"));
  }

  #[test]
  fn results_render_media_by_kind() {
    let page = results_page(
      Some("/media/uploads/a.avi"),
      Some("/media/results/a.mp4"),
      &StatsSummary::default(),
    );
    assert!(page.contains(r#"<video src="/media/results/a.mp4""#));
    assert!(page.contains("Unknown"));
    assert!(page.contains("No objects detected"));

    let page = results_page(None, Some("/media/results/b.png"), &StatsSummary::default());
    assert!(page.contains(r#"<img src="/media/results/b.png""#));
    assert!(page.contains("Not available"));
  }

  #[test]
  fn results_list_object_counts() {
    let mut stats = StatsSummary::default();
    stats.objects.insert("person".to_string(), 2);
    let page = results_page(None, None, &stats);
    assert!(page.contains("<li>person: 2</li>"));
  }
}
