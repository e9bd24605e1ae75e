pub mod cache;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod export;
pub mod journal;
pub mod models;
pub mod remote;
pub mod sync;
pub mod tracker;
pub mod utils;

pub use cache::LocalCache;
pub use config::Config;
pub use models::{CaptureItem, DayRecord, JournalEntry, LinkItem, Screenshot, TaskItem, VideoItem, VideoStatus};
pub use remote::{MemoryMirror, RemoteMirror, RestMirror};
pub use sync::{SyncCoordinator, WriteMode};
pub use tracker::Tracker;
pub use utils::Profile;
