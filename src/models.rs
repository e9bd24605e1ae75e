use serde::{Deserialize, Serialize};

/// Generate a fresh opaque identifier for a collection item
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureItem {
    pub id: String,
    pub title: String,
    pub url: String, // usually a data: URL
}

/// Everything recorded for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: String, // YYYY-MM-DD, local time zone
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub links: Vec<LinkItem>,
    #[serde(default)]
    pub captures: Vec<CaptureItem>,
}

/// Row shape of the remote `calendar_days` table. Every column but `date` is nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRow {
    pub date: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<LinkItem>>,
    #[serde(default)]
    pub captures: Option<Vec<CaptureItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    ToWatch,
    Watched,
    Mastered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub status: VideoStatus,
}

/// Free-form dated journal entry; several may share a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: String, // YYYY-MM-DD
    pub notes: String,
    #[serde(default)]
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: String,
    pub name: String,
    pub data_url: String,
    pub created_at: String, // RFC 3339
}

impl LinkItem {
    pub fn new(title: String, url: String) -> Self {
        Self {
            id: new_id(),
            title,
            url,
        }
    }
}

impl CaptureItem {
    pub fn new(title: String, url: String) -> Self {
        Self {
            id: new_id(),
            title,
            url,
        }
    }
}

impl DayRecord {
    /// The record synthesized for a date nobody has written to yet
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            summary: String::new(),
            links: Vec::new(),
            captures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.links.is_empty() && self.captures.is_empty()
    }
}

impl From<CalendarRow> for DayRecord {
    fn from(row: CalendarRow) -> Self {
        Self {
            date: row.date,
            summary: row.summary.unwrap_or_default(),
            links: row.links.unwrap_or_default(),
            captures: row.captures.unwrap_or_default(),
        }
    }
}

impl From<&DayRecord> for CalendarRow {
    fn from(day: &DayRecord) -> Self {
        Self {
            date: day.date.clone(),
            summary: Some(day.summary.clone()),
            links: Some(day.links.clone()),
            captures: Some(day.captures.clone()),
        }
    }
}

impl TaskItem {
    pub fn new(text: String) -> Self {
        Self {
            id: new_id(),
            text,
            done: false,
        }
    }
}

impl VideoStatus {
    pub fn label(self) -> &'static str {
        match self {
            VideoStatus::ToWatch => "To watch",
            VideoStatus::Watched => "Watched",
            VideoStatus::Mastered => "Watched and learned",
        }
    }
}

impl std::str::FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "to_watch" | "to-watch" => Ok(VideoStatus::ToWatch),
            "watched" => Ok(VideoStatus::Watched),
            "mastered" => Ok(VideoStatus::Mastered),
            other => Err(format!("Unknown video status: {}", other)),
        }
    }
}

impl VideoItem {
    pub fn new(title: String, url: String, status: VideoStatus) -> Self {
        Self {
            id: new_id(),
            title,
            url,
            status,
        }
    }
}

impl JournalEntry {
    pub fn new(date: String, notes: String, hours: f64) -> Self {
        Self {
            id: new_id(),
            date,
            notes,
            hours,
        }
    }
}

impl Screenshot {
    pub fn new(name: String, data_url: String) -> Self {
        Self {
            id: new_id(),
            name,
            data_url,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_columns_become_empty_fields() {
        let row: CalendarRow =
            serde_json::from_str(r#"{"date":"2025-11-16","summary":null,"links":null,"captures":null}"#)
                .unwrap();
        assert_eq!(DayRecord::from(row), DayRecord::empty("2025-11-16"));
    }

    #[test]
    fn video_status_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&VideoStatus::ToWatch).unwrap();
        assert_eq!(json, "\"to_watch\"");
        assert_eq!("mastered".parse::<VideoStatus>(), Ok(VideoStatus::Mastered));
        assert!("later".parse::<VideoStatus>().is_err());
    }

    #[test]
    fn ids_are_distinct() {
        let a = LinkItem::new("a".into(), "http://a".into());
        let b = LinkItem::new("a".into(), "http://a".into());
        assert_ne!(a.id, b.id);
    }
}
