use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{ENTRIES_KEY, LocalCache, SCREENSHOTS_KEY, TASKS_KEY, VIDEOS_KEY};
use crate::models::{JournalEntry, Screenshot, TaskItem, VideoItem, VideoStatus};

/// Totals shown in the tracker header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_hours: f64,
    pub entries: usize,
    pub mastered_videos: usize,
}

/// Study hours typed by a user. Accepts `,` as decimal separator; anything
/// blank, negative or unparsable counts as zero.
pub fn parse_hours(raw: &str) -> f64 {
    let normalized = raw.replace(',', ".");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return 0.0;
    }
    match normalized.parse::<f64>() {
        Ok(h) if h.is_finite() && h >= 0.0 => h,
        _ => 0.0,
    }
}

/// Task list, journal entries, videos and screenshots, each persisted under
/// its own cache key. Newest items come first.
pub struct Tracker {
    cache: LocalCache,
    tasks: Vec<TaskItem>,
    entries: Vec<JournalEntry>,
    videos: Vec<VideoItem>,
    screenshots: Vec<Screenshot>,
}

fn load_or_empty<T: DeserializeOwned>(cache: &LocalCache, key: &str) -> Vec<T> {
    match cache.load::<Vec<T>>(key) {
        Ok(Some(items)) => items,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(key, "ignoring unreadable cached collection: {e}");
            Vec::new()
        }
    }
}

impl Tracker {
    pub fn load(cache: LocalCache) -> Self {
        Self {
            tasks: load_or_empty(&cache, TASKS_KEY),
            entries: load_or_empty(&cache, ENTRIES_KEY),
            videos: load_or_empty(&cache, VIDEOS_KEY),
            screenshots: load_or_empty(&cache, SCREENSHOTS_KEY),
            cache,
        }
    }

    fn persist<T: Serialize>(cache: &LocalCache, key: &str, items: &[T]) {
        if let Err(e) = cache.store(key, items) {
            tracing::warn!(key, "could not save collection: {e}");
        }
    }

    pub fn tasks(&self) -> &[TaskItem] {
        &self.tasks
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn videos(&self) -> &[VideoItem] {
        &self.videos
    }

    pub fn screenshots(&self) -> &[Screenshot] {
        &self.screenshots
    }

    /// Entries ordered by date, newest first; same-date entries keep insertion order
    pub fn entries_by_date(&self) -> Vec<&JournalEntry> {
        let mut sorted: Vec<&JournalEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            total_tasks: self.tasks.len(),
            completed_tasks: self.tasks.iter().filter(|t| t.done).count(),
            total_hours: self.entries.iter().map(|e| e.hours).sum(),
            entries: self.entries.len(),
            mastered_videos: self
                .videos
                .iter()
                .filter(|v| v.status == VideoStatus::Mastered)
                .count(),
        }
    }

    // Tasks

    pub fn add_task(&mut self, text: &str) -> Option<&TaskItem> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.tasks.insert(0, TaskItem::new(text.to_string()));
        Self::persist(&self.cache, TASKS_KEY, &self.tasks);
        self.tasks.first()
    }

    /// Flip a task's done flag; returns the new state if the task exists
    pub fn toggle_task(&mut self, id: &str) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.done = !task.done;
        let done = task.done;
        Self::persist(&self.cache, TASKS_KEY, &self.tasks);
        Some(done)
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        Self::persist(&self.cache, TASKS_KEY, &self.tasks);
        self.tasks.len() != before
    }

    // Journal entries

    /// New entry for `date`. Ignored when both notes and hours are blank.
    pub fn add_entry(&mut self, date: &str, notes: &str, hours: &str) -> Option<&JournalEntry> {
        let notes = notes.trim();
        if notes.is_empty() && hours.trim().is_empty() {
            return None;
        }
        let entry = JournalEntry::new(date.to_string(), notes.to_string(), parse_hours(hours));
        self.entries.insert(0, entry);
        Self::persist(&self.cache, ENTRIES_KEY, &self.entries);
        self.entries.first()
    }

    pub fn delete_entry(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        Self::persist(&self.cache, ENTRIES_KEY, &self.entries);
        self.entries.len() != before
    }

    // Videos

    /// New video. Ignored when both title and URL are blank; the title
    /// falls back to the URL.
    pub fn add_video(&mut self, title: &str, url: &str, status: VideoStatus) -> Option<&VideoItem> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() && url.is_empty() {
            return None;
        }
        let title = if title.is_empty() { url } else { title };
        self.videos
            .insert(0, VideoItem::new(title.to_string(), url.to_string(), status));
        Self::persist(&self.cache, VIDEOS_KEY, &self.videos);
        self.videos.first()
    }

    pub fn set_video_status(&mut self, id: &str, status: VideoStatus) -> bool {
        let Some(video) = self.videos.iter_mut().find(|v| v.id == id) else {
            return false;
        };
        video.status = status;
        Self::persist(&self.cache, VIDEOS_KEY, &self.videos);
        true
    }

    pub fn delete_video(&mut self, id: &str) -> bool {
        let before = self.videos.len();
        self.videos.retain(|v| v.id != id);
        Self::persist(&self.cache, VIDEOS_KEY, &self.videos);
        self.videos.len() != before
    }

    // Screenshots

    pub fn add_screenshot(&mut self, name: &str, data_url: &str) -> Option<&Screenshot> {
        if data_url.trim().is_empty() {
            return None;
        }
        self.screenshots
            .insert(0, Screenshot::new(name.trim().to_string(), data_url.to_string()));
        Self::persist(&self.cache, SCREENSHOTS_KEY, &self.screenshots);
        self.screenshots.first()
    }

    pub fn delete_screenshot(&mut self, id: &str) -> bool {
        let before = self.screenshots.len();
        self.screenshots.retain(|s| s.id != id);
        Self::persist(&self.cache, SCREENSHOTS_KEY, &self.screenshots);
        self.screenshots.len() != before
    }
}
