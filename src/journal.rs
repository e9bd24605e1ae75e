use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use thiserror::Error;

use crate::models::{CaptureItem, DayRecord, LinkItem};
use crate::sync::{PendingWrite, SyncCoordinator};

/// Fallback title for a capture with neither title nor file name
pub const DEFAULT_CAPTURE_TITLE: &str = "Capture";

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to read capture file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Not an image file: {0}")]
    NotAnImage(String),
}

/// Replace the summary with trimmed `text`
pub fn with_summary(mut day: DayRecord, text: &str) -> DayRecord {
    day.summary = text.trim().to_string();
    day
}

/// Link built from raw form input, or `None` when the URL is blank.
/// The title falls back to the URL.
pub fn build_link(title: &str, url: &str) -> Option<LinkItem> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let title = match title.trim() {
        "" => url,
        t => t,
    };
    Some(LinkItem::new(title.to_string(), url.to_string()))
}

/// Capture built from raw form input, or `None` without image data.
/// The title falls back to the file name, then to [`DEFAULT_CAPTURE_TITLE`].
pub fn build_capture(title: &str, file_name: &str, data_url: &str) -> Option<CaptureItem> {
    if data_url.trim().is_empty() {
        return None;
    }
    let title = [title.trim(), file_name.trim()]
        .into_iter()
        .find(|t| !t.is_empty())
        .unwrap_or(DEFAULT_CAPTURE_TITLE);
    Some(CaptureItem::new(title.to_string(), data_url.to_string()))
}

pub fn without_link(mut day: DayRecord, id: &str) -> DayRecord {
    day.links.retain(|l| l.id != id);
    day
}

pub fn without_capture(mut day: DayRecord, id: &str) -> DayRecord {
    day.captures.retain(|c| c.id != id);
    day
}

/// Read an image file and encode it as a `data:` URL.
/// Returns the file name alongside the URL.
pub fn capture_from_file(path: &Path) -> Result<(String, String), JournalError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(JournalError::NotAnImage(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let data_url = format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok((file_name, data_url))
}

/// One day of the calendar, edited through the coordinator
pub struct DayJournal {
    sync: SyncCoordinator,
    date: String,
}

impl DayJournal {
    pub fn new(sync: SyncCoordinator, date: impl Into<String>) -> Self {
        Self {
            sync,
            date: date.into(),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn record(&self) -> DayRecord {
        self.sync.get_record(&self.date)
    }

    pub fn save_summary(&self, text: &str) -> PendingWrite {
        self.sync
            .update_record(&self.date, |day| with_summary(day, text))
            .1
    }

    pub fn add_link(&self, title: &str, url: &str) -> Option<(LinkItem, PendingWrite)> {
        let link = build_link(title, url)?;
        let added = link.clone();
        let (_, pending) = self.sync.update_record(&self.date, move |mut day| {
            day.links.push(added);
            day
        });
        Some((link, pending))
    }

    pub fn delete_link(&self, id: &str) -> PendingWrite {
        self.sync
            .update_record(&self.date, |day| without_link(day, id))
            .1
    }

    pub fn add_capture(&self, title: &str, file_name: &str, data_url: &str) -> Option<(CaptureItem, PendingWrite)> {
        let capture = build_capture(title, file_name, data_url)?;
        let added = capture.clone();
        let (_, pending) = self.sync.update_record(&self.date, move |mut day| {
            day.captures.push(added);
            day
        });
        Some((capture, pending))
    }

    pub fn delete_capture(&self, id: &str) -> PendingWrite {
        self.sync
            .update_record(&self.date, |day| without_capture(day, id))
            .1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_title_falls_back_to_url() {
        let link = build_link("  ", " http://x ").unwrap();
        assert_eq!(link.title, "http://x");
        assert_eq!(link.url, "http://x");
        assert!(build_link("title", "   ").is_none());
    }

    #[test]
    fn capture_title_fallbacks() {
        assert_eq!(build_capture("", "shot.png", "data:x").unwrap().title, "shot.png");
        assert_eq!(build_capture("", "", "data:x").unwrap().title, DEFAULT_CAPTURE_TITLE);
        assert_eq!(build_capture(" Board ", "shot.png", "data:x").unwrap().title, "Board");
        assert!(build_capture("t", "f", "").is_none());
    }

    #[test]
    fn removing_every_item_leaves_an_empty_record() {
        let link = build_link("X", "http://x").unwrap();
        let mut day = DayRecord::empty("2025-11-16");
        day.links.push(link.clone());

        let day = without_link(day, &link.id);
        assert!(day.is_empty());
        assert_eq!(day.date, "2025-11-16");
    }

    #[test]
    fn summary_is_trimmed() {
        let day = with_summary(DayRecord::empty("2025-11-16"), "  read ch. 4\n");
        assert_eq!(day.summary, "read ch. 4");
    }

    #[test]
    fn image_files_become_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let (name, url) = capture_from_file(&path).unwrap();
        assert_eq!(name, "board.png");
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn non_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hi").unwrap();
        assert!(matches!(capture_from_file(&path), Err(JournalError::NotAnImage(_))));
    }
}
