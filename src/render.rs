//! Server-rendered dashboard pages. Everything here is a pure function of the
//! `ViewState` handed in.

use crate::state::{Board, DayGroup, Screen, ViewState};
use crate::types::{is_video, ViolationRecord};

const STYLE: &str = r#"
body { font-family: 'Segoe UI', Tahoma, sans-serif; margin: 0 auto; max-width: 960px; padding: 20px; }
.upload-box { border: 2px dashed #888; border-radius: 8px; padding: 24px; text-align: center; }
.upload-box.dragging { background: #eef5ff; }
.btn-upload { cursor: pointer; display: inline-block; padding: 6px 14px; background: #0066cc; color: #fff; border-radius: 4px; }
.search-box { width: 100%; margin: 16px 0; padding: 8px; font-size: 16px; }
.violation-table { width: 100%; border-collapse: collapse; margin-bottom: 24px; }
.violation-table th, .violation-table td { border: 1px solid #ccc; padding: 6px; text-align: left; }
.thumb { border: 0; padding: 0; cursor: zoom-in; }
.notice { color: #666; }
.error { color: #b00020; padding: 20px; }
.overlay { position: fixed; inset: 0; background: rgba(0, 0, 0, 0.8); display: flex; align-items: center; justify-content: center; margin: 0; }
.popup img, .popup video { max-width: 90vw; max-height: 90vh; }
"#;

const DROP_SCRIPT: &str = r#"
const zone = document.getElementById('drop-zone');
const form = document.getElementById('upload-form');
form.file.addEventListener('change', () => { if (form.file.files.length) form.submit(); });
zone.addEventListener('dragover', (e) => { e.preventDefault(); zone.classList.add('dragging'); });
zone.addEventListener('dragleave', () => zone.classList.remove('dragging'));
zone.addEventListener('drop', (e) => {
    e.preventDefault();
    zone.classList.remove('dragging');
    if (!e.dataTransfer.files.length) return;
    form.file.files = e.dataTransfer.files;
    form.origin.value = 'drop';
    form.submit();
});
"#;

pub fn page(state: &ViewState) -> String {
    match state.screen() {
        Screen::Loading => layout("<div>Đang tải...</div>", true),
        Screen::Failed(message) => layout(&error_block(message), false),
        Screen::Board(board) => layout(&board_body(&board), board.busy()),
    }
}

fn layout(body: &str, refresh: bool) -> String {
    let refresh = if refresh {
        r#"<meta http-equiv="refresh" content="2">"#
    } else {
        ""
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="vi">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    {}
    <title>Danh sách vi phạm</title>
    <style>{}</style>
</head>
<body>
{}
</body>
</html>"#,
        refresh, STYLE, body
    )
}

fn error_block(message: &str) -> String {
    format!(
        r#"<div class="error">
    <p>{}</p>
    <form method="post" action="/error/dismiss"><button type="submit">Đóng</button></form>
</div>"#,
        html_escape(message)
    )
}

fn board_body(board: &Board) -> String {
    let mut body = String::from("<h1>📸 DANH SÁCH VI PHẠM</h1>\n");
    body.push_str(
        r#"<div class="upload-section">
    <form id="upload-form" method="post" action="/upload" enctype="multipart/form-data">
        <div id="drop-zone" class="upload-box">
            <p>Kéo và thả ảnh / video vào đây, hoặc:</p>
            <label class="btn-upload">📂 Chọn tệp
                <input type="file" name="file" accept="image/*,video/*,.csv" hidden>
            </label>
            <input type="hidden" name="origin" value="picker">
        </div>
    </form>
"#,
    );
    if board.uploading {
        body.push_str("    <p>⏳ Đang phân tích...</p>\n");
    } else if board.pending_uploads > 0 {
        body.push_str("    <p>⏳ Đang xử lý tệp tải lên...</p>\n");
    }
    if board.empty_response {
        body.push_str(r#"    <p class="notice">Không phát hiện vi phạm nào trong tệp vừa tải lên.</p>"#);
        body.push('\n');
    }
    body.push_str("</div>\n");

    body.push_str(&format!(
        r#"<form method="post" action="/search">
    <input type="text" name="q" value="{}" placeholder="🔍 Tìm theo thời gian hoặc biển số..." class="search-box">
</form>
"#,
        html_escape(board.search)
    ));

    if !board.has_data() {
        body.push_str(r#"<p class="notice">Chưa có dữ liệu vi phạm.</p>"#);
        body.push('\n');
    }
    for group in &board.groups {
        body.push_str(&day_group(group));
    }
    if let Some(url) = board.selected_media {
        body.push_str(&preview(url));
    }
    body.push_str(&format!("<script>{}</script>\n", DROP_SCRIPT));
    body
}

fn day_group(group: &DayGroup) -> String {
    let rows: String = group.records.iter().map(|r| record_row(r)).collect();
    format!(
        r#"<div class="day-group">
    <h2>🗓️ {}</h2>
    <table class="violation-table">
        <thead><tr><th>Thời gian</th><th>Ảnh</th><th>Biển số</th></tr></thead>
        <tbody>
{}        </tbody>
    </table>
</div>
"#,
        html_escape(group.date),
        rows
    )
}

fn record_row(record: &ViolationRecord) -> String {
    let media = if record.is_remote() {
        format!(
            r#"<form method="post" action="/preview"><input type="hidden" name="url" value="{url}"><input type="image" class="thumb" src="{url}" alt="{alt}" width="100"></form>"#,
            url = html_escape(record.image_url()),
            alt = html_escape(record.time())
        )
    } else if record.image_url().is_empty() {
        "<span>—</span>".to_string()
    } else {
        format!("<span>Tệp cục bộ: {}</span>", html_escape(record.image_url()))
    };
    format!(
        "            <tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        html_escape(record.time()),
        media,
        html_escape(record.license_plate())
    )
}

/// Clicking anywhere on the overlay except the media itself closes it.
fn preview(url: &str) -> String {
    let url = html_escape(url);
    let media = if is_video(&url) {
        format!(r#"<video src="{}" controls autoplay></video>"#, url)
    } else {
        format!(r#"<img src="{}" alt="Preview">"#, url)
    };
    format!(
        r#"<form class="overlay" method="post" action="/preview/close" onclick="if (!event.target.closest('img, video')) this.submit()">
    <div class="popup">{}</div>
</form>
"#,
        media
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
