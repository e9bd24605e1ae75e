//! Keeps the in-memory day map, the local cache and the remote mirror in step.
//!
//! Local state is authoritative for the running process: every update is
//! applied and persisted to the cache before the call returns. The remote
//! write happens afterwards and never feeds back into local state. Loading
//! from the remote goes the other way: fetched rows replace local records for
//! the same date.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::cache::{CALENDAR_DAYS_KEY, LocalCache};
use crate::models::{CalendarRow, DayRecord};
use crate::remote::{RemoteError, RemoteMirror};

/// Date key to record
pub type DayMap = BTreeMap<String, DayRecord>;

/// How remote upserts are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// One spawned task per update. Writes for the same date may land out of
    /// order, so the remote can end up with an older version than local.
    #[default]
    Detached,
    /// All upserts go through one queue and land in call order.
    Serialized,
}

/// Completion handle for a remote write. Dropping it detaches the write.
#[derive(Debug)]
pub struct PendingWrite {
    done: oneshot::Receiver<bool>,
}

impl PendingWrite {
    /// Wait for the remote write; `true` if the remote accepted it
    pub async fn wait(self) -> bool {
        self.done.await.unwrap_or(false)
    }
}

/// Counts a write as in flight until dropped
struct InFlightGuard(watch::Sender<usize>);

impl InFlightGuard {
    fn new(counter: &watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct WriteJob {
    row: CalendarRow,
    ack: oneshot::Sender<bool>,
    _guard: InFlightGuard,
}

struct Inner {
    days: Mutex<DayMap>,
    cache: Mutex<LocalCache>,
    mirror: Arc<dyn RemoteMirror>,
    writer: Option<mpsc::UnboundedSender<WriteJob>>,
    in_flight: watch::Sender<usize>,
}

/// State container for the calendar. Cheap to clone; clones share state.
///
/// Must be created and used inside a Tokio runtime, since remote work is
/// spawned onto it.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn push(mirror: &dyn RemoteMirror, row: CalendarRow) -> bool {
    let date = row.date.clone();
    match mirror.upsert(row).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(date = %date, "failed to save day to remote: {e}");
            false
        }
    }
}

impl SyncCoordinator {
    pub fn new(cache: LocalCache, mirror: Arc<dyn RemoteMirror>, mode: WriteMode) -> Self {
        let writer = match mode {
            WriteMode::Detached => None,
            WriteMode::Serialized => Some(Self::spawn_writer(Arc::clone(&mirror))),
        };
        let (in_flight, _) = watch::channel(0usize);

        Self {
            inner: Arc::new(Inner {
                days: Mutex::new(DayMap::new()),
                cache: Mutex::new(cache),
                mirror,
                writer,
                in_flight,
            }),
        }
    }

    fn spawn_writer(mirror: Arc<dyn RemoteMirror>) -> mpsc::UnboundedSender<WriteJob> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let ok = push(mirror.as_ref(), job.row).await;
                let _ = job.ack.send(ok);
            }
        });
        tx
    }

    pub fn write_mode(&self) -> WriteMode {
        if self.inner.writer.is_some() {
            WriteMode::Serialized
        } else {
            WriteMode::Detached
        }
    }

    /// Read the cached map. Unreadable or corrupt data leaves the map as is.
    pub fn load_local(&self) {
        let loaded = lock(&self.inner.cache).load::<DayMap>(CALENDAR_DAYS_KEY);
        match loaded {
            Ok(Some(map)) => {
                tracing::debug!(days = map.len(), "loaded days from local cache");
                *lock(&self.inner.days) = map;
            }
            Ok(None) => {}
            Err(e) => tracing::error!("could not read days from local cache: {e}"),
        }
    }

    /// Load the local cache now and fetch the remote in the background
    pub fn load(&self) -> JoinHandle<()> {
        self.load_local();
        let this = self.clone();
        tokio::spawn(async move {
            this.refresh().await;
        })
    }

    /// Fetch every remote row and merge it in; returns how many rows merged
    pub async fn try_refresh(&self) -> Result<usize, RemoteError> {
        let rows = self.inner.mirror.select_all().await?;
        Ok(self.merge_rows(rows))
    }

    /// Best-effort [`try_refresh`](Self::try_refresh): failures are logged and ignored
    pub async fn refresh(&self) {
        if let Err(e) = self.try_refresh().await {
            tracing::error!("error loading days from remote: {e}");
        }
    }

    /// Remote rows replace local records with the same date; other local
    /// records are kept.
    fn merge_rows(&self, rows: Vec<CalendarRow>) -> usize {
        let count = rows.len();
        let mut days = lock(&self.inner.days);
        for row in rows {
            let record = DayRecord::from(row);
            days.insert(record.date.clone(), record);
        }
        self.persist(&days);
        count
    }

    fn persist(&self, days: &DayMap) {
        if let Err(e) = lock(&self.inner.cache).store(CALENDAR_DAYS_KEY, days) {
            tracing::error!("could not save days to local cache: {e}");
        }
    }

    /// Stored record for `date`, or an empty one. Never inserts.
    pub fn get_record(&self, date: &str) -> DayRecord {
        lock(&self.inner.days)
            .get(date)
            .cloned()
            .unwrap_or_else(|| DayRecord::empty(date))
    }

    pub fn has_data(&self, date: &str) -> bool {
        lock(&self.inner.days).get(date).is_some_and(|d| !d.is_empty())
    }

    /// Apply `mutator` to the current (or empty) record for `date`, store and
    /// persist the result, then hand the row to the remote without waiting.
    ///
    /// The remote outcome never changes local state. Two updates to the same
    /// date in [`WriteMode::Detached`] race on the remote.
    pub fn update_record<F>(&self, date: &str, mutator: F) -> (DayRecord, PendingWrite)
    where
        F: FnOnce(DayRecord) -> DayRecord,
    {
        let next = {
            let mut days = lock(&self.inner.days);
            let current = days.get(date).cloned().unwrap_or_else(|| DayRecord::empty(date));
            let mut next = mutator(current);
            next.date = date.to_string();
            days.insert(date.to_string(), next.clone());
            self.persist(&days);
            next
        };

        let pending = self.dispatch(CalendarRow::from(&next));
        (next, pending)
    }

    fn dispatch(&self, row: CalendarRow) -> PendingWrite {
        let (ack, done) = oneshot::channel();
        let guard = InFlightGuard::new(&self.inner.in_flight);

        match &self.inner.writer {
            Some(writer) => {
                let job = WriteJob {
                    row,
                    ack,
                    _guard: guard,
                };
                if let Err(mpsc::error::SendError(job)) = writer.send(job) {
                    tracing::error!(date = %job.row.date, "remote writer has stopped; write dropped");
                }
            }
            None => {
                let mirror = Arc::clone(&self.inner.mirror);
                tokio::spawn(async move {
                    let _guard = guard;
                    let ok = push(mirror.as_ref(), row).await;
                    let _ = ack.send(ok);
                });
            }
        }

        PendingWrite { done }
    }

    /// Refresh on every remote change until the returned task is aborted
    pub async fn watch(&self) -> Result<JoinHandle<()>, RemoteError> {
        let mut changes = self.inner.mirror.subscribe().await?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                tracing::debug!(kind = ?change.kind, date = ?change.date, "remote change");
                this.refresh().await;
            }
            tracing::debug!("remote change stream ended");
        }))
    }

    /// All records, ordered by date
    pub fn snapshot(&self) -> Vec<DayRecord> {
        lock(&self.inner.days).values().cloned().collect()
    }

    /// Remote writes dispatched but not yet finished
    pub fn pending_writes(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Wait up to `timeout` for in-flight remote writes; `false` on timeout
    pub async fn flush(&self, timeout: Duration) -> bool {
        let mut rx = self.inner.in_flight.subscribe();
        let finished = tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await;
        finished.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkItem;
    use crate::remote::MemoryMirror;

    fn coordinator(mirror: Arc<MemoryMirror>, mode: WriteMode) -> SyncCoordinator {
        SyncCoordinator::new(LocalCache::open_in_memory().unwrap(), mirror, mode)
    }

    #[tokio::test]
    async fn get_record_does_not_insert() {
        let sync = coordinator(Arc::new(MemoryMirror::new()), WriteMode::Detached);
        let day = sync.get_record("2025-11-16");
        assert_eq!(day, DayRecord::empty("2025-11-16"));
        assert!(sync.snapshot().is_empty());
    }

    #[tokio::test]
    async fn mutator_cannot_move_a_record_to_another_date() {
        let sync = coordinator(Arc::new(MemoryMirror::new()), WriteMode::Detached);
        let (day, pending) = sync.update_record("2025-11-16", |mut d| {
            d.date = "1999-01-01".into();
            d
        });
        pending.wait().await;
        assert_eq!(day.date, "2025-11-16");
        assert_eq!(sync.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_update() {
        let mirror = Arc::new(MemoryMirror::new());
        mirror.set_failing(true);
        let sync = coordinator(mirror.clone(), WriteMode::Detached);

        let (_, pending) = sync.update_record("2025-11-16", |mut d| {
            d.links.push(LinkItem::new("X".into(), "http://x".into()));
            d
        });

        assert!(!pending.wait().await);
        assert_eq!(sync.get_record("2025-11-16").links.len(), 1);
        assert!(mirror.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_state_untouched() {
        let mirror = Arc::new(MemoryMirror::new());
        let sync = coordinator(mirror.clone(), WriteMode::Detached);
        let (_, pending) = sync.update_record("2025-11-16", |mut d| {
            d.summary = "local".into();
            d
        });
        pending.wait().await;

        mirror.set_failing(true);
        assert!(sync.try_refresh().await.is_err());
        sync.refresh().await;
        assert_eq!(sync.get_record("2025-11-16").summary, "local");
    }

    #[tokio::test]
    async fn flush_waits_for_slow_writes() {
        let mirror = Arc::new(MemoryMirror::new());
        mirror.queue_upsert_delays([Duration::from_millis(30)]);
        let sync = coordinator(mirror.clone(), WriteMode::Detached);

        drop(sync.update_record("2025-11-16", |d| d).1);
        assert_eq!(sync.pending_writes(), 1);
        assert!(sync.flush(Duration::from_secs(5)).await);
        assert_eq!(sync.pending_writes(), 0);
        assert_eq!(mirror.upsert_count(), 1);
    }

    #[tokio::test]
    async fn flush_times_out_on_stuck_writes() {
        let mirror = Arc::new(MemoryMirror::new());
        mirror.queue_upsert_delays([Duration::from_secs(60)]);
        let sync = coordinator(mirror, WriteMode::Serialized);

        drop(sync.update_record("2025-11-16", |d| d).1);
        assert!(!sync.flush(Duration::from_millis(20)).await);
    }
}
