use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{CacheError, LocalCache};
use crate::calendar::{self, DateKeyError, MonthView};
use crate::config::Config;
use crate::export::{self, ExportError, Exporter};
use crate::journal::{self, DayJournal, JournalError};
use crate::models::{DayRecord, VideoStatus};
use crate::remote::{MemoryMirror, RemoteError, RemoteMirror, RestMirror};
use crate::sync::SyncCoordinator;
use crate::tracker::Tracker;

#[derive(Parser)]
#[command(name = "studylog")]
#[command(about = "Study journal - calendar days, tasks and videos, mirrored to a remote table")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/cache)
    #[arg(long)]
    pub dev: bool,

    /// Work from the local cache only; never contact the remote
    #[arg(long)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or edit one calendar day
    Day {
        #[command(subcommand)]
        action: DayCommand,
    },
    /// Print a month grid; days with content are marked with *
    Calendar {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Manage the task list
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Manage dated journal entries
    Entry {
        #[command(subcommand)]
        action: EntryCommand,
    },
    /// Track study videos
    Video {
        #[command(subcommand)]
        action: VideoCommand,
    },
    /// Manage screenshots
    Shot {
        #[command(subcommand)]
        action: ShotCommand,
    },
    /// Write a printable document (print it to PDF from the browser)
    Export {
        #[command(subcommand)]
        target: ExportCommand,
    },
    /// Talk to the remote mirror
    Sync {
        #[command(subcommand)]
        action: SyncCommand,
    },
}

#[derive(Subcommand)]
pub enum DayCommand {
    /// Print a day's summary, links and captures
    Show {
        /// Day (YYYY-MM-DD), defaults to today
        date: Option<String>,
    },
    /// Replace the day's summary
    Summary {
        text: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Add a study link
    AddLink {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Remove a link by id
    RmLink {
        id: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Attach an image file as a capture
    AddCapture {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Remove a capture by id
    RmCapture {
        id: String,
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    Add { text: String },
    /// Toggle a task between done and not done
    Done { id: String },
    Rm { id: String },
    List,
}

#[derive(Subcommand)]
pub enum EntryCommand {
    Add {
        #[arg(long, default_value = "")]
        notes: String,
        /// Study hours; "1,5" and "1.5" both work
        #[arg(long, default_value = "")]
        hours: String,
        #[arg(long)]
        date: Option<String>,
    },
    Rm { id: String },
    List,
}

#[derive(Subcommand)]
pub enum VideoCommand {
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        url: String,
        /// to_watch, watched or mastered
        #[arg(long, default_value = "to_watch")]
        status: VideoStatus,
    },
    Status { id: String, status: VideoStatus },
    Rm { id: String },
    List,
}

#[derive(Subcommand)]
pub enum ShotCommand {
    Add { file: PathBuf },
    Rm { id: String },
    List,
}

#[derive(Subcommand)]
pub enum ExportCommand {
    /// One calendar day
    Day {
        date: Option<String>,
        /// Open the document in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Tasks, entries, videos and screenshots
    Tracker {
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Fetch every remote day and merge it into the local cache
    Pull,
    /// Keep merging remote changes until Ctrl-C
    Watch,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),
    #[error("{0}")]
    DateError(#[from] DateKeyError),
    #[error("{0}")]
    JournalError(#[from] JournalError),
    #[error("Export error: {0}")]
    ExportError(#[from] ExportError),
    #[error("Remote error: {0}")]
    RemoteError(#[from] RemoteError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unavailable(String),
}

/// What every command handler needs
pub struct Context {
    pub config: Config,
    pub offline: bool,
}

impl Context {
    pub fn new(config: Config, offline: bool) -> Self {
        Self { config, offline }
    }

    pub fn open_cache(&self) -> Result<LocalCache, CliError> {
        let path = self.config.get_database_path();
        Ok(LocalCache::new(&path.to_string_lossy())?)
    }

    /// The configured remote, or an in-process stand-in when offline or unconfigured
    pub fn mirror(&self) -> Result<Arc<dyn RemoteMirror>, CliError> {
        match self.config.remote_settings() {
            Some(remote) if !self.offline => {
                Ok(Arc::new(RestMirror::new(&remote.url, &remote.api_key, &remote.table)?))
            }
            _ => {
                tracing::debug!("no remote in use; changes stay local");
                Ok(Arc::new(MemoryMirror::new()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        !self.offline && self.config.remote_settings().is_some()
    }

    /// Coordinator with the local cache loaded and, when connected, one
    /// remote fetch merged in (bounded by the flush timeout)
    pub async fn coordinator(&self) -> Result<SyncCoordinator, CliError> {
        let sync = SyncCoordinator::new(self.open_cache()?, self.mirror()?, self.config.sync.write_mode);
        if self.is_connected() {
            let fetch = sync.load();
            if tokio::time::timeout(self.config.flush_timeout(), fetch).await.is_err() {
                tracing::warn!("remote fetch timed out; showing local data");
            }
        } else {
            sync.load_local();
        }
        Ok(sync)
    }

    /// Give dispatched remote writes a chance to land before the process exits
    pub async fn finish(&self, sync: &SyncCoordinator) {
        if !sync.flush(self.config.flush_timeout()).await {
            tracing::warn!(pending = sync.pending_writes(), "exiting with remote writes still in flight");
        }
    }
}

/// Normalize a user-supplied date, defaulting to today
pub fn resolve_date(date: Option<String>) -> Result<String, CliError> {
    match date {
        Some(raw) => Ok(calendar::format_date_key(calendar::parse_date_key(&raw)?)),
        None => Ok(calendar::today_key()),
    }
}

fn print_day(day: &DayRecord) {
    println!("{}", day.date);
    if day.summary.is_empty() {
        println!("  (no summary)");
    } else {
        for line in day.summary.lines() {
            println!("  {}", line);
        }
    }
    println!("Links:");
    for link in &day.links {
        println!("  {}  {} <{}>", link.id, link.title, link.url);
    }
    println!("Captures:");
    for capture in &day.captures {
        println!("  {}  {} ({} bytes)", capture.id, capture.title, capture.url.len());
    }
}

/// Handle the day subcommands
pub async fn handle_day(action: DayCommand, ctx: &Context) -> Result<(), CliError> {
    let sync = ctx.coordinator().await?;

    match action {
        DayCommand::Show { date } => {
            let date = resolve_date(date)?;
            print_day(&sync.get_record(&date));
            return Ok(());
        }
        DayCommand::Summary { text, date } => {
            let day = DayJournal::new(sync.clone(), resolve_date(date)?);
            drop(day.save_summary(&text));
            println!("Summary saved for {}", day.date());
        }
        DayCommand::AddLink { url, title, date } => {
            let day = DayJournal::new(sync.clone(), resolve_date(date)?);
            let (link, _) = day
                .add_link(title.as_deref().unwrap_or(""), &url)
                .ok_or_else(|| CliError::InvalidInput("link URL is empty".to_string()))?;
            println!("Link added (ID: {})", link.id);
        }
        DayCommand::RmLink { id, date } => {
            let day = DayJournal::new(sync.clone(), resolve_date(date)?);
            if !day.record().links.iter().any(|l| l.id == id) {
                return Err(CliError::NotFound(format!("link {}", id)));
            }
            drop(day.delete_link(&id));
            println!("Link removed");
        }
        DayCommand::AddCapture { file, title, date } => {
            let day = DayJournal::new(sync.clone(), resolve_date(date)?);
            let (file_name, data_url) = journal::capture_from_file(&file)?;
            let (capture, _) = day
                .add_capture(title.as_deref().unwrap_or(""), &file_name, &data_url)
                .ok_or_else(|| CliError::InvalidInput(format!("no image data in {}", file.display())))?;
            println!("Capture added (ID: {})", capture.id);
        }
        DayCommand::RmCapture { id, date } => {
            let day = DayJournal::new(sync.clone(), resolve_date(date)?);
            if !day.record().captures.iter().any(|c| c.id == id) {
                return Err(CliError::NotFound(format!("capture {}", id)));
            }
            drop(day.delete_capture(&id));
            println!("Capture removed");
        }
    }

    ctx.finish(&sync).await;
    Ok(())
}

/// Handle the calendar command
pub async fn handle_calendar(month: Option<String>, ctx: &Context) -> Result<(), CliError> {
    let view = match month {
        Some(arg) => MonthView::parse(&arg)?,
        None => MonthView::containing(calendar::today()),
    };
    let sync = ctx.coordinator().await?;
    print!("{}", view.render_text(|key| sync.has_data(key)));
    Ok(())
}

/// Handle the task subcommands
pub fn handle_task(action: TaskCommand, ctx: &Context) -> Result<(), CliError> {
    let mut tracker = Tracker::load(ctx.open_cache()?);

    match action {
        TaskCommand::Add { text } => match tracker.add_task(&text) {
            Some(task) => println!("Task created successfully (ID: {})", task.id),
            None => println!("Nothing to add"),
        },
        TaskCommand::Done { id } => {
            let done = tracker
                .toggle_task(&id)
                .ok_or_else(|| CliError::NotFound(format!("task {}", id)))?;
            println!("Task marked {}", if done { "done" } else { "not done" });
        }
        TaskCommand::Rm { id } => {
            if !tracker.delete_task(&id) {
                return Err(CliError::NotFound(format!("task {}", id)));
            }
            println!("Task deleted");
        }
        TaskCommand::List => {
            let stats = tracker.stats();
            println!("{} of {} done", stats.completed_tasks, stats.total_tasks);
            for task in tracker.tasks() {
                println!("[{}] {}  {}", if task.done { "x" } else { " " }, task.id, task.text);
            }
        }
    }
    Ok(())
}

/// Handle the entry subcommands
pub fn handle_entry(action: EntryCommand, ctx: &Context) -> Result<(), CliError> {
    let mut tracker = Tracker::load(ctx.open_cache()?);

    match action {
        EntryCommand::Add { notes, hours, date } => {
            let date = resolve_date(date)?;
            match tracker.add_entry(&date, &notes, &hours) {
                Some(entry) => println!("Journal entry created successfully (ID: {})", entry.id),
                None => println!("Nothing to add"),
            }
        }
        EntryCommand::Rm { id } => {
            if !tracker.delete_entry(&id) {
                return Err(CliError::NotFound(format!("entry {}", id)));
            }
            println!("Entry deleted");
        }
        EntryCommand::List => {
            println!("{} hours logged", tracker.stats().total_hours);
            for entry in tracker.entries_by_date() {
                println!("{}  {}h  {}  {}", entry.date, entry.hours, entry.id, entry.notes);
            }
        }
    }
    Ok(())
}

/// Handle the video subcommands
pub fn handle_video(action: VideoCommand, ctx: &Context) -> Result<(), CliError> {
    let mut tracker = Tracker::load(ctx.open_cache()?);

    match action {
        VideoCommand::Add { title, url, status } => match tracker.add_video(&title, &url, status) {
            Some(video) => println!("Video added (ID: {})", video.id),
            None => println!("Nothing to add"),
        },
        VideoCommand::Status { id, status } => {
            if !tracker.set_video_status(&id, status) {
                return Err(CliError::NotFound(format!("video {}", id)));
            }
            println!("Video marked {}", status.label());
        }
        VideoCommand::Rm { id } => {
            if !tracker.delete_video(&id) {
                return Err(CliError::NotFound(format!("video {}", id)));
            }
            println!("Video deleted");
        }
        VideoCommand::List => {
            for video in tracker.videos() {
                println!("{:<20} {}  {}  {}", video.status.label(), video.id, video.title, video.url);
            }
        }
    }
    Ok(())
}

/// Handle the screenshot subcommands
pub fn handle_shot(action: ShotCommand, ctx: &Context) -> Result<(), CliError> {
    let mut tracker = Tracker::load(ctx.open_cache()?);

    match action {
        ShotCommand::Add { file } => {
            let (name, data_url) = journal::capture_from_file(&file)?;
            if let Some(shot) = tracker.add_screenshot(&name, &data_url) {
                println!("Screenshot added (ID: {})", shot.id);
            }
        }
        ShotCommand::Rm { id } => {
            if !tracker.delete_screenshot(&id) {
                return Err(CliError::NotFound(format!("screenshot {}", id)));
            }
            println!("Screenshot deleted");
        }
        ShotCommand::List => {
            for shot in tracker.screenshots() {
                println!("{}  {}  {}", shot.created_at, shot.id, shot.name);
            }
        }
    }
    Ok(())
}

/// Handle the export subcommands
pub async fn handle_export(target: ExportCommand, ctx: &Context) -> Result<(), CliError> {
    let exporter = Exporter::new(ctx.config.get_export_dir());

    let path = match target {
        ExportCommand::Day { date, open } => {
            let date = resolve_date(date)?;
            let sync = ctx.coordinator().await?;
            let html = export::render_day(&sync.get_record(&date));
            exporter.export(&format!("day-{}", date), &html, open)?
        }
        ExportCommand::Tracker { open } => {
            let tracker = Tracker::load(ctx.open_cache()?);
            let generated = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
            let html = export::render_tracker(&tracker, &generated);
            exporter.export(&format!("journal-{}", calendar::today_key()), &html, open)?
        }
    };

    println!("Exported to {}", path.display());
    Ok(())
}

/// Handle the sync subcommands
pub async fn handle_sync(action: SyncCommand, ctx: &Context) -> Result<(), CliError> {
    let remote = ctx
        .config
        .remote_settings()
        .filter(|_| !ctx.offline)
        .ok_or_else(|| CliError::Unavailable("no remote configured (set [remote] url and api_key)".to_string()))?;

    let sync = SyncCoordinator::new(ctx.open_cache()?, ctx.mirror()?, ctx.config.sync.write_mode);
    sync.load_local();

    match action {
        SyncCommand::Pull => {
            let merged = sync.try_refresh().await?;
            println!("Merged {} days from {}", merged, remote.table);
        }
        SyncCommand::Watch => {
            if !remote.realtime {
                return Err(CliError::Unavailable("realtime is disabled in config".to_string()));
            }
            sync.refresh().await;
            let mut watcher = sync.watch().await?;
            println!("Watching {} for changes (Ctrl-C to stop)", remote.table);
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    watcher.abort();
                    signal?;
                }
                _ = &mut watcher => {
                    eprintln!("Realtime connection closed");
                }
            }
        }
    }
    Ok(())
}
