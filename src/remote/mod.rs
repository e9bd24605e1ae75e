//! The remote row store that mirrors the calendar days.
//!
//! One row per date. The coordinator only ever needs three things from it:
//! a bulk read ordered by date, an upsert keyed on `date`, and a stream of
//! change notifications for any row.

pub mod memory;
pub mod realtime;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::CalendarRow;

pub use memory::MemoryMirror;
pub use rest::RestMirror;

/// Default table name of the mirrored calendar
pub const DEFAULT_TABLE: &str = "calendar_days";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("WebSocket error: {0}")]
    WebSocketError(String),
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row changed somewhere, possibly on another device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub date: Option<String>,
}

/// Stream of change notifications; ends when the subscription drops
pub type ChangeStream = mpsc::Receiver<RowChange>;

/// Capacity of change-notification channels
pub(crate) const CHANGE_BUFFER: usize = 32;

#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Every row, ordered by date ascending
    async fn select_all(&self) -> Result<Vec<CalendarRow>, RemoteError>;

    /// Insert or replace the row for `row.date`
    async fn upsert(&self, row: CalendarRow) -> Result<(), RemoteError>;

    /// Subscribe to insert/update/delete events on any row
    async fn subscribe(&self) -> Result<ChangeStream, RemoteError>;
}
