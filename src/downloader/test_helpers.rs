//! Shared fakes and helpers for download manager tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::Config;
use crate::downloader::DownloadManager;
use crate::error::{SourceError, TranscodeError};
use crate::source::{AudioStream, CollectionInfo, ItemInfo, MediaSource, validate_url};
use crate::transcode::Transcoder;
use crate::types::{AudioFormat, QueueItem, TagSet};

/// Bytes every fake raw download starts with
pub(crate) const RAW_MARKER: &[u8] = b"FAKE-RAW-AUDIO:";

/// In-memory media source
///
/// Resolves any http(s) URL, fetching writes a small file into the temp dir.
#[derive(Default)]
pub(crate) struct FakeSource {
    fetch_delay: Duration,
    hanging: HashSet<String>,
    failing: HashSet<String>,
    silent: HashSet<String>,
    collections: HashMap<String, CollectionInfo>,
    /// URLs in the order their fetch started
    pub(crate) fetch_log: Mutex<Vec<String>>,
    /// Raw files handed out by `fetch_audio`
    pub(crate) fetched_paths: Mutex<Vec<PathBuf>>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) resolve_calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every fetch takes `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Fetching `url` writes a partial raw file and never finishes
    pub(crate) fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// Fetching `url` fails with a permanent error
    pub(crate) fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// `url` resolves but has no audio-only stream
    pub(crate) fn without_audio(mut self, url: &str) -> Self {
        self.silent.insert(url.to_string());
        self
    }

    pub(crate) fn with_collection(mut self, collection: CollectionInfo) -> Self {
        self.collections.insert(collection.url.clone(), collection);
        self
    }

    pub(crate) fn fetch_order(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

/// Video id of a watch URL (`...?v=<id>`), or its last path segment
pub(crate) fn video_id(url: &str) -> String {
    url.rsplit_once("v=")
        .map(|(_, id)| id)
        .or_else(|| url.rsplit('/').next())
        .unwrap_or(url)
        .to_string()
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn resolve_item(&self, url: &str) -> crate::Result<ItemInfo> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        validate_url(url)?;

        let id = video_id(url);
        let audio_streams = if self.silent.contains(url) {
            vec![]
        } else {
            vec![
                AudioStream {
                    format_id: "249".to_string(),
                    ext: "webm".to_string(),
                    codec: Some("opus".to_string()),
                    bitrate_kbps: Some(50.0),
                },
                AudioStream {
                    format_id: "251".to_string(),
                    ext: "webm".to_string(),
                    codec: Some("opus".to_string()),
                    bitrate_kbps: Some(135.0),
                },
            ]
        };

        Ok(ItemInfo {
            url: url.to_string(),
            title: format!("Song {}", id),
            author: "Uploader".to_string(),
            upload_date: None,
            audio_streams,
            id,
        })
    }

    async fn resolve_collection(&self, url: &str) -> crate::Result<CollectionInfo> {
        validate_url(url)?;
        self.collections.get(url).cloned().ok_or_else(|| {
            SourceError::ResolveFailed {
                url: url.to_string(),
                reason: "ERROR: The playlist does not exist".to_string(),
            }
            .into()
        })
    }

    async fn fetch_audio(
        &self,
        item: &ItemInfo,
        stream: &AudioStream,
        dest_dir: &Path,
    ) -> crate::Result<PathBuf> {
        self.fetch_log.lock().unwrap().push(item.url.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(&item.url) {
            // Bytes land at the final path while the download is still running
            let partial = dest_dir.join(format!("{}.{}", item.id, stream.ext));
            tokio::fs::write(&partial, RAW_MARKER).await?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&item.url) {
            return Err(SourceError::FetchFailed {
                url: item.url.clone(),
                reason: "ERROR: HTTP Error 403: Forbidden".to_string(),
            }
            .into());
        }

        // Must be selected over the lower-bitrate variant
        assert_eq!(stream.format_id, "251");

        let path = dest_dir.join(format!("{}.{}", item.id, stream.ext));
        let mut contents = RAW_MARKER.to_vec();
        contents.extend_from_slice(item.url.as_bytes());
        tokio::fs::write(&path, contents).await?;
        self.fetched_paths.lock().unwrap().push(path.clone());
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Transcoder that copies the input to the output
#[derive(Default)]
pub(crate) struct CopyTranscoder {
    /// Inputs whose file name contains one of these ids fail after writing a partial output
    failing_ids: HashSet<String>,
    pub(crate) calls: AtomicUsize,
}

impl CopyTranscoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_for(mut self, url: &str) -> Self {
        self.failing_ids.insert(video_id(url));
        self
    }
}

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _format: AudioFormat,
    ) -> crate::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_ids.contains(&stem) {
            tokio::fs::write(output, b"partial").await?;
            return Err(TranscodeError::Failed {
                input: input.to_path_buf(),
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            }
            .into());
        }

        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}

/// Config rooted in `temp_dir` with short timeouts and no retry delays
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("out");
    config.download.temp_dir = Some(temp_dir.path().join("tmp"));
    config.download.parallel = false;
    config.download.max_concurrent_downloads = 3;
    config.retry.max_attempts = 0;
    config.retry.jitter = false;
    config.timeouts.fetch = Duration::from_secs(5);
    config.timeouts.transcode = Duration::from_secs(5);
    config.timeouts.tag = Duration::from_secs(5);
    config
}

/// Manager wired to the given fakes
pub(crate) fn create_test_manager(
    config: Config,
    source: Arc<FakeSource>,
    transcoder: Arc<CopyTranscoder>,
) -> DownloadManager {
    DownloadManager::new(Arc::new(config), source, transcoder)
}

/// Item writing `out/<name>.mp3` under `temp_dir`
pub(crate) fn queue_item(
    temp_dir: &TempDir,
    url: &str,
    name: &str,
    tags: Option<TagSet>,
) -> QueueItem {
    QueueItem::new(url, temp_dir.path().join("out").join(format!("{}.mp3", name)), tags)
}

pub(crate) fn song_tags(title: &str, artist: &str) -> TagSet {
    TagSet {
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        ..Default::default()
    }
}

pub(crate) fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}
