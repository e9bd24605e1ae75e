use studylog::cache::TASKS_KEY;
use studylog::export::{Exporter, render_tracker};
use studylog::models::TaskItem;
use studylog::{LocalCache, Tracker, VideoStatus};

fn task(id: &str, text: &str, done: bool) -> TaskItem {
    TaskItem {
        id: id.to_string(),
        text: text.to_string(),
        done,
    }
}

#[test]
fn deleting_a_task_by_id_keeps_the_rest() {
    let cache = LocalCache::open_in_memory().unwrap();
    cache
        .store(TASKS_KEY, &vec![task("1", "A", false), task("2", "B", true)])
        .unwrap();
    let mut tracker = Tracker::load(cache);

    assert!(tracker.delete_task("1"));
    assert_eq!(tracker.tasks(), &[task("2", "B", true)]);
    assert!(!tracker.delete_task("1"));
}

#[test]
fn collections_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let path = path.to_str().unwrap();

    let video_id = {
        let mut tracker = Tracker::load(LocalCache::new(path).unwrap());
        tracker.add_task("write summary");
        tracker.add_entry("2025-11-16", "ownership chapter", "2,5");
        tracker.add_screenshot("board.png", "data:image/png;base64,AA==");
        tracker
            .add_video("Lifetimes", "https://videos/1", VideoStatus::ToWatch)
            .unwrap()
            .id
            .clone()
    };

    let mut tracker = Tracker::load(LocalCache::new(path).unwrap());
    assert_eq!(tracker.tasks()[0].text, "write summary");
    assert_eq!(tracker.entries()[0].hours, 2.5);
    assert_eq!(tracker.screenshots()[0].name, "board.png");

    assert!(tracker.set_video_status(&video_id, VideoStatus::Mastered));
    let reloaded = Tracker::load(LocalCache::new(path).unwrap());
    assert_eq!(reloaded.videos()[0].status, VideoStatus::Mastered);
    assert_eq!(reloaded.stats().mastered_videos, 1);
}

#[test]
fn tracker_export_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = Tracker::load(LocalCache::open_in_memory().unwrap());
    tracker.add_task("<b>bold</b> task");

    let html = render_tracker(&tracker, "2025-11-16 09:00");
    let path = Exporter::new(dir.path()).export("journal", &html, false).unwrap();

    let written = std::fs::read_to_string(path).unwrap();
    assert!(written.starts_with("<!DOCTYPE html>"));
    assert!(written.contains("&lt;b&gt;bold&lt;/b&gt; task"));
}
