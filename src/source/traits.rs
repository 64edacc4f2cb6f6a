//! Traits and types for the remote video-platform client

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

/// One audio-only stream variant offered for an item
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    /// Platform format identifier (passed back when fetching)
    pub format_id: String,
    /// Container extension of the raw stream (e.g., "webm", "m4a")
    pub ext: String,
    /// Audio codec (e.g., "opus")
    pub codec: Option<String>,
    /// Average audio bitrate in kbit/s
    pub bitrate_kbps: Option<f64>,
}

/// Metadata of a single item (one video)
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInfo {
    /// Canonical URL of the item
    pub url: String,
    /// Platform identifier of the item
    pub id: String,
    /// Video title
    pub title: String,
    /// Channel / uploader name
    pub author: String,
    /// Upload date, when the platform reports one
    pub upload_date: Option<NaiveDate>,
    /// Audio-only stream variants
    pub audio_streams: Vec<AudioStream>,
}

impl ItemInfo {
    /// Highest-quality audio-only stream (by bitrate; unknown bitrates rank last)
    #[must_use]
    pub fn best_audio_stream(&self) -> Option<&AudioStream> {
        self.audio_streams.iter().max_by(|a, b| {
            let a = a.bitrate_kbps.unwrap_or(-1.0);
            let b = b.bitrate_kbps.unwrap_or(-1.0);
            a.total_cmp(&b)
        })
    }
}

/// Metadata of a collection (one playlist)
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    /// Canonical URL of the collection
    pub url: String,
    /// Platform identifier of the collection
    pub id: String,
    /// Collection title
    pub title: String,
    /// Owner of the collection
    pub owner: String,
    /// Member URLs, in collection order
    pub item_urls: Vec<String>,
    /// Date of the last update, when the platform reports one
    pub last_updated: Option<NaiveDate>,
    /// Number of items as reported by the platform
    pub item_count: usize,
}

impl CollectionInfo {
    /// Year of the last update
    pub fn release_year(&self) -> Option<i32> {
        self.last_updated.map(|d| d.year())
    }
}

/// Remote video-platform client
///
/// Implementations can wrap an external binary or talk to the platform
/// directly; tests use in-memory fakes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve an item URL to its metadata and audio stream variants
    ///
    /// # Errors
    ///
    /// Returns a source error if the URL is invalid or the item cannot be resolved.
    async fn resolve_item(&self, url: &str) -> crate::Result<ItemInfo>;

    /// Resolve a collection URL to its metadata and member URLs
    ///
    /// # Errors
    ///
    /// Returns a source error if the URL is invalid or the collection cannot be resolved.
    async fn resolve_collection(&self, url: &str) -> crate::Result<CollectionInfo>;

    /// Fetch one stream variant of `item` into `dest_dir`
    ///
    /// Returns the path of the raw audio file. The file name is unique per call,
    /// so concurrent fetches of the same item never share a file.
    async fn fetch_audio(
        &self,
        item: &ItemInfo,
        stream: &AudioStream,
        dest_dir: &Path,
    ) -> crate::Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
