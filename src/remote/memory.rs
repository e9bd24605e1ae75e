use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{CHANGE_BUFFER, ChangeKind, ChangeStream, RemoteError, RemoteMirror, RowChange};
use crate::models::CalendarRow;

/// In-process mirror. Used when no remote is configured and in tests, where
/// its failure switch and per-upsert delays let callers stage slow or broken
/// remotes.
#[derive(Default)]
pub struct MemoryMirror {
    rows: Mutex<BTreeMap<String, CalendarRow>>,
    subscribers: Mutex<Vec<mpsc::Sender<RowChange>>>,
    upsert_delays: Mutex<VecDeque<Duration>>,
    failing: AtomicBool,
    upserts: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror pre-populated with `rows`
    pub fn with_rows(rows: impl IntoIterator<Item = CalendarRow>) -> Self {
        let mirror = Self::new();
        {
            let mut stored = lock(&mirror.rows);
            for row in rows {
                stored.insert(row.date.clone(), row);
            }
        }
        mirror
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay applied to the next upserts, one entry per call, in call order
    pub fn queue_upsert_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        lock(&self.upsert_delays).extend(delays);
    }

    pub fn row(&self, date: &str) -> Option<CalendarRow> {
        lock(&self.rows).get(date).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upserts that reached the store
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Write a row as another device would, notifying subscribers
    pub fn write_external(&self, row: CalendarRow) {
        let kind = self.store(row.clone());
        self.notify(RowChange {
            kind,
            date: Some(row.date),
        });
    }

    fn store(&self, row: CalendarRow) -> ChangeKind {
        match lock(&self.rows).insert(row.date.clone(), row) {
            Some(_) => ChangeKind::Update,
            None => ChangeKind::Insert,
        }
    }

    fn notify(&self, change: RowChange) {
        lock(&self.subscribers).retain(|tx| match tx.try_send(change.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("dropping change notification for a slow subscriber");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("memory mirror set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    async fn select_all(&self) -> Result<Vec<CalendarRow>, RemoteError> {
        self.check_available()?;
        // BTreeMap iteration is already ordered by date key
        Ok(lock(&self.rows).values().cloned().collect())
    }

    async fn upsert(&self, row: CalendarRow) -> Result<(), RemoteError> {
        let delay = lock(&self.upsert_delays).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let date = row.date.clone();
        let kind = self.store(row);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.notify(RowChange {
            kind,
            date: Some(date),
        });
        Ok(())
    }

    async fn subscribe(&self) -> Result<ChangeStream, RemoteError> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        lock(&self.subscribers).push(tx);
        Ok(rx)
    }
}
