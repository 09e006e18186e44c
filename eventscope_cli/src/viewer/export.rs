//! Standalone HTML snapshot of a viewer session

use super::detail;
use super::highlight::escape_html;
use super::render::Row;
use super::store::MessageStore;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Eventscope session</title>
    <style>
        * { box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #fafafa;
            color: #333;
            font-size: 14px;
            margin: 0;
            padding: 1rem;
        }
        h1 { font-size: 1.1rem; font-weight: 600; }
        .meta { color: #666; font-size: 0.8rem; margin-bottom: 1rem; }
        table { width: 100%; border-collapse: collapse; background: #fff; }
        th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #eee; vertical-align: top; }
        th { font-weight: 500; color: #666; }
        pre { margin: 0; font-family: 'SF Mono', Monaco, monospace; font-size: 12px; white-space: pre-wrap; }
        .incoming { color: #dc3545; }
        .outgoing { color: #198754; }
        .badge { font-size: 0.75rem; padding: 0.15rem 0.45rem; border-radius: 3px; font-weight: 600; }
        .text-bg-warning { background: #ffc107; color: #000; }
        .text-bg-success { background: #198754; color: #fff; }
        .text-bg-secondary { background: #6c757d; color: #fff; }
        details { margin-top: 0.4rem; }
        summary { cursor: pointer; color: #666; font-size: 0.8rem; }
        .section-title { font-weight: 500; color: #666; margin: 0.5rem 0 0.25rem; }
        .key { color: #881391; }
        .string { color: #c41a16; }
        .number { color: #1c00cf; }
        .boolean { color: #0d22aa; }
        .null { color: #808080; }
    </style>
</head>
<body>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// Render every retained message as an HTML page
pub fn render_session(store: &MessageStore, endpoint: &str, exported_at: &str) -> String {
    let mut html = String::from(PAGE_HEAD);

    let _ = writeln!(html, "<h1>Eventscope session</h1>");
    let _ = writeln!(
        html,
        "<div class=\"meta\">{} &middot; {} messages &middot; exported {}</div>",
        escape_html(endpoint),
        store.len(),
        escape_html(exported_at)
    );
    if store.is_empty() {
        html.push_str("<p class=\"meta\">No messages received.</p>\n");
        html.push_str(PAGE_TAIL);
        return html;
    }

    html.push_str("<table>\n<thead><tr><th>Time</th><th>Action</th><th>Resource</th><th>Data</th></tr></thead>\n<tbody>\n");

    for (id, message) in store.iter() {
        let row = Row::new(id, message);
        let panel = detail::show(id, message);
        let direction_class = message.direction.as_str().to_lowercase();

        let _ = writeln!(
            html,
            "<tr data-id=\"{}\"><td><span class=\"{}\">{}</span> {}</td><td><span class=\"badge {}\">{}</span></td><td>{}</td><td><pre>{}</pre>",
            id,
            direction_class,
            row.glyph(),
            escape_html(&row.date_time),
            row.badge.css_class(),
            escape_html(&row.action),
            escape_html(&row.resource),
            escape_html(&row.preview),
        );

        html.push_str("<details><summary>Details</summary>\n");
        if let Some(message_id) = panel.message_id {
            let _ = writeln!(html, "<div class=\"section-title\">Message id {}</div>", message_id);
        }
        if let Some(code) = panel.code {
            let _ = writeln!(html, "<div class=\"section-title\">Code {}</div>", code);
        }
        if let Some(body) = &panel.body {
            let _ = writeln!(
                html,
                "<div class=\"section-title\">Data</div><pre>{}</pre>",
                body.html
            );
        }
        let _ = writeln!(
            html,
            "<div class=\"section-title\">Source</div><pre>{}</pre>",
            panel.source.html
        );
        html.push_str("</details></td></tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html.push_str(PAGE_TAIL);
    html
}

/// Write the session snapshot to `path`
pub fn write_session(path: &Path, store: &MessageStore, endpoint: &str) -> Result<()> {
    let exported_at = chrono::Local::now().format("%y-%m-%d %H:%M:%S %z").to_string();
    let html = render_session(store, endpoint, &exported_at);
    fs::write(path, html).with_context(|| format!("Failed to write export to {}", path.display()))?;
    tracing::info!("Exported {} messages to {}", store.len(), path.display());
    Ok(())
}
