use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::downloader::test_helpers::{
    CopyTranscoder, FakeSource, RAW_MARKER, create_test_manager, queue_item, song_tags, test_config,
    watch_url,
};
use crate::downloader::{DownloadManager, ManagerState};
use crate::error::{Error, ErrorCategory};
use crate::types::{Event, ItemStatus, Stage, TagField};

mod queue;

/// Everything currently buffered on `rx`
fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Files directly inside `dir`
fn files_in(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => vec![],
    }
}

/// Every file below `dir`, at any depth
fn files_under(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}
