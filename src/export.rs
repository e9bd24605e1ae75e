//! Printable HTML documents. The document prints itself once loaded, so
//! "export to PDF" is the browser's print-to-PDF.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calendar::parse_date_key;
use crate::models::DayRecord;
use crate::tracker::Tracker;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create export directory: {0}")]
    DirectoryError(String),
    #[error("Failed to write export file: {0}")]
    WriteError(#[from] std::io::Error),
}

const STYLE: &str = "body { font-family: system-ui, -apple-system, 'Segoe UI', sans-serif; margin: 40px; color: #111827; }
h1 { font-size: 24px; margin-bottom: 4px; }
h2 { font-size: 18px; margin-top: 24px; }
hr { margin: 20px 0; border: none; border-top: 1px solid #e5e7eb; }
small { color: #6b7280; }
figure { width: 180px; margin: 0; }
figure img { width: 100%; height: auto; border-radius: 8px; border: 1px solid #e5e7eb; }
figcaption { font-size: 11px; color: #4b5563; margin-top: 4px; word-break: break-word; }
.gallery { display: flex; flex-wrap: wrap; gap: 12px; }";

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn display_date(key: &str) -> String {
    parse_date_key(key)
        .map(|d| d.format("%A, %-d %B %Y").to_string())
        .unwrap_or_else(|_| key.to_string())
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n<script>window.onload = function () {{ window.print(); }};</script>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

fn empty_note(text: &str) -> String {
    format!("<p><em>{}</em></p>", text)
}

fn gallery<'a>(items: impl Iterator<Item = (&'a str, &'a str, Option<&'a str>)>) -> String {
    let mut html = String::from("<div class=\"gallery\">");
    for (src, caption, subtitle) in items {
        let _ = write!(
            html,
            "<figure><img src=\"{src}\" alt=\"{caption}\"/><figcaption>{caption}",
            src = escape_html(src),
            caption = escape_html(caption)
        );
        if let Some(sub) = subtitle {
            let _ = write!(html, "<br/><small>{}</small>", escape_html(sub));
        }
        html.push_str("</figcaption></figure>");
    }
    html.push_str("</div>");
    html
}

/// Printable document for a single day
pub fn render_day(day: &DayRecord) -> String {
    let date = display_date(&day.date);
    let mut body = format!(
        "<h1>Study journal: {}</h1>\n<small>Exported from studylog</small>\n<hr/>\n<h2>Summary</h2>\n",
        escape_html(&date)
    );

    if day.summary.is_empty() {
        body.push_str(&empty_note("No summary for this day."));
    } else {
        let _ = write!(
            body,
            "<p style=\"white-space:pre-wrap;line-height:1.6;\">{}</p>",
            escape_html(&day.summary).replace('\n', "<br/>")
        );
    }

    body.push_str("\n<hr/>\n<h2>Study links</h2>\n");
    if day.links.is_empty() {
        body.push_str(&empty_note("No study links."));
    } else {
        body.push_str("<ul>");
        for link in &day.links {
            let title = if link.title.is_empty() { link.url.as_str() } else { link.title.as_str() };
            let _ = write!(
                body,
                "<li><strong>{}</strong><br/><a href=\"{url}\" target=\"_blank\">{url}</a></li>",
                escape_html(title),
                url = escape_html(&link.url)
            );
        }
        body.push_str("</ul>");
    }

    body.push_str("\n<hr/>\n<h2>Captures</h2>\n");
    if day.captures.is_empty() {
        body.push_str(&empty_note("No captures."));
    } else {
        body.push_str(&gallery(
            day.captures
                .iter()
                .map(|c| (c.url.as_str(), c.title.as_str(), None)),
        ));
    }

    document(&format!("Study journal - {}", date), &body)
}

/// Printable document for the whole tracker
pub fn render_tracker(tracker: &Tracker, generated_at: &str) -> String {
    let stats = tracker.stats();
    let mut body = format!(
        "<h1>Study journal</h1>\n<small>Generated {}</small>\n<p>{} of {} tasks done, {} hours logged, {} videos mastered</p>\n<hr/>\n<h2>Journal entries</h2>\n",
        escape_html(generated_at),
        stats.completed_tasks,
        stats.total_tasks,
        stats.total_hours,
        stats.mastered_videos
    );

    let entries = tracker.entries_by_date();
    if entries.is_empty() {
        body.push_str(&empty_note("No entries yet."));
    }
    for entry in entries {
        let _ = write!(
            body,
            "<section><h3>{}</h3><p><strong>Study hours:</strong> {}</p><pre style=\"white-space:pre-wrap;font-family:inherit;\">{}</pre></section>",
            escape_html(&display_date(&entry.date)),
            entry.hours,
            escape_html(&entry.notes)
        );
    }

    body.push_str("\n<hr/>\n<h2>Tasks</h2>\n");
    if tracker.tasks().is_empty() {
        body.push_str(&empty_note("No tasks recorded."));
    } else {
        body.push_str("<ul>");
        for task in tracker.tasks() {
            let text = match task.text.trim() {
                "" => "(no description)",
                t => t,
            };
            let _ = write!(
                body,
                "<li>[{}] {}</li>",
                if task.done { "x" } else { " " },
                escape_html(text)
            );
        }
        body.push_str("</ul>");
    }

    body.push_str("\n<hr/>\n<h2>Videos</h2>\n");
    if tracker.videos().is_empty() {
        body.push_str(&empty_note("No videos recorded."));
    } else {
        body.push_str("<ul>");
        for video in tracker.videos() {
            let url = if video.url.is_empty() { "(no link)" } else { video.url.as_str() };
            let _ = write!(
                body,
                "<li><strong>{}</strong><br/>Status: {}<br/>Link: {}</li>",
                escape_html(&video.title),
                video.status.label(),
                escape_html(url)
            );
        }
        body.push_str("</ul>");
    }

    body.push_str("\n<hr/>\n<h2>Screenshots</h2>\n");
    if tracker.screenshots().is_empty() {
        body.push_str(&empty_note("No screenshots recorded."));
    } else {
        body.push_str(&gallery(tracker.screenshots().iter().map(|s| {
            (s.data_url.as_str(), s.name.as_str(), Some(s.created_at.as_str()))
        })));
    }

    document("Study journal", &body)
}

/// Writes documents to a directory and optionally hands them to the
/// platform's default browser
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Write `html` to `<out_dir>/<stem>.html`
    pub fn write(&self, stem: &str, html: &str) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| ExportError::DirectoryError(e.to_string()))?;
        let path = self.out_dir.join(format!("{}.html", stem));
        std::fs::write(&path, html)?;
        Ok(path)
    }

    /// Write the document and, if asked, open it. A failed open is logged and
    /// otherwise ignored.
    pub fn export(&self, stem: &str, html: &str, open: bool) -> Result<PathBuf, ExportError> {
        let path = self.write(stem, html)?;
        if open {
            open_in_browser(&path);
        }
        Ok(path)
    }
}

/// Launch the default viewer for `path`; `false` if it could not be opened
pub fn open_in_browser(path: &Path) -> bool {
    match open::that(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not open export: {e}");
            false
        }
    }
}
