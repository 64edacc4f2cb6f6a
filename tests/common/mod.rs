//! Shared fixtures for the integration tests
//!
//! `FixtureSource` and `CopyTranscoder` implement the public seams with
//! in-memory data so the whole pipeline runs without network or ffmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use music_downloader::source::{AudioStream, CollectionInfo, ItemInfo, MediaSource};
use music_downloader::transcode::Transcoder;
use music_downloader::{AudioFormat, Config, Error, Result, TagMode};

pub const ALBUM_URL: &str = "https://www.youtube.com/playlist?list=PLfixture";

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn video_id(url: &str) -> String {
    url.rsplit("v=").next().unwrap_or(url).to_string()
}

/// Platform client serving fixed metadata and a few bytes of "audio"
#[derive(Default)]
pub struct FixtureSource {
    fetches: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FixtureSource {
    async fn resolve_item(&self, url: &str) -> Result<ItemInfo> {
        let id = video_id(url);
        Ok(ItemInfo {
            url: url.to_string(),
            title: format!("Track {}", id),
            id,
            author: "Fixture Artist".to_string(),
            upload_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            audio_streams: vec![AudioStream {
                format_id: "251".to_string(),
                ext: "webm".to_string(),
                codec: Some("opus".to_string()),
                bitrate_kbps: Some(160.0),
            }],
        })
    }

    async fn resolve_collection(&self, url: &str) -> Result<CollectionInfo> {
        let item_urls: Vec<String> = ["a", "b", "c"].iter().map(|id| watch_url(id)).collect();
        Ok(CollectionInfo {
            url: url.to_string(),
            id: "PLfixture".to_string(),
            title: "Fixture Album".to_string(),
            owner: "Fixture Owner".to_string(),
            item_count: item_urls.len(),
            item_urls,
            last_updated: NaiveDate::from_ymd_opt(2021, 3, 4),
        })
    }

    async fn fetch_audio(
        &self,
        item: &ItemInfo,
        stream: &AudioStream,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let path = dest_dir.join(format!("{}-{}.{}", item.id, n, stream.ext));
        tokio::fs::write(&path, format!("raw audio of {}", item.id)).await?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Transcoder that copies its input
pub struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, _format: AudioFormat) -> Result<()> {
        tokio::fs::copy(input, output).await.map_err(Error::Io)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}

/// Configuration writing into `temp_dir` with short timeouts and no retries
pub fn fixture_config(temp_dir: &TempDir, tag_mode: TagMode) -> Config {
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("music");
    config.download.temp_dir = Some(temp_dir.path().join("raw"));
    config.tagging.tag_mode = tag_mode;
    config.retry.max_attempts = 0;
    config.timeouts.fetch = Duration::from_secs(10);
    config.timeouts.transcode = Duration::from_secs(10);
    config.timeouts.tag = Duration::from_secs(10);
    config
}

/// Regular files directly inside `dir`, sorted by name
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
