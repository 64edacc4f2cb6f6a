//! Core types for music-downloader

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ErrorCategory;

/// How tag data is sourced for every item of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Write no tags at all
    None,
    /// Derive tags from the remote metadata
    #[default]
    Auto,
    /// Ask the user for every field, showing the remote value as default
    Manual,
}

impl TagMode {
    /// Lowercase name as accepted on the command line and in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            TagMode::None => "none",
            TagMode::Auto => "auto",
            TagMode::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TagMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(TagMode::None),
            "auto" => Ok(TagMode::Auto),
            "manual" => Ok(TagMode::Manual),
            other => Err(crate::error::Error::Config {
                message: format!(
                    "invalid tag mode '{}': must be 'none', 'auto', or 'manual'",
                    other
                ),
                key: Some("tag_mode".to_string()),
            }),
        }
    }
}

/// Metadata attached to one output file.
///
/// Every field is optional; `None` means "do not write this field". A `TagSet`
/// is produced once by the resolver and consumed once by the tag writer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    /// Song title (or album title for a collection-level set)
    pub title: Option<String>,
    /// Performing artist
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// 1-based position within the album
    pub track_num: Option<u32>,
    /// Release year
    pub release_year: Option<i32>,
    /// Genre
    pub genre: Option<String>,
}

impl TagSet {
    /// Fields of this set that carry a value
    pub fn present_fields(&self) -> BTreeSet<TagField> {
        let mut fields = BTreeSet::new();
        if self.title.is_some() {
            fields.insert(TagField::Title);
        }
        if self.artist.is_some() {
            fields.insert(TagField::Artist);
        }
        if self.album.is_some() {
            fields.insert(TagField::Album);
        }
        if self.track_num.is_some() {
            fields.insert(TagField::TrackNum);
        }
        if self.release_year.is_some() {
            fields.insert(TagField::ReleaseYear);
        }
        if self.genre.is_some() {
            fields.insert(TagField::Genre);
        }
        fields
    }
}

/// A single tag field name, as reported by the tag writer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    /// Song title
    Title,
    /// Artist
    Artist,
    /// Album
    Album,
    /// Track number
    TrackNum,
    /// Release year
    ReleaseYear,
    /// Genre
    Genre,
}

impl TagField {
    /// snake_case field name
    pub fn as_str(&self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::TrackNum => "track_num",
            TagField::ReleaseYear => "release_year",
            TagField::Genre => "genre",
        }
    }
}

impl std::fmt::Display for TagField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output audio container produced by the transcoder
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1 Layer III (default)
    #[default]
    Mp3,
    /// RIFF WAVE, tagged through an ID3 chunk
    Wav,
}

impl AudioFormat {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// One unit of pipeline work. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    source_url: String,
    destination_path: PathBuf,
    tags: Option<TagSet>,
}

impl QueueItem {
    /// Create a new queue item
    pub fn new(
        source_url: impl Into<String>,
        destination_path: impl Into<PathBuf>,
        tags: Option<TagSet>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            tags,
        }
    }

    /// URL of the remote video the audio is taken from
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Final path of the transcoded, tagged file
    pub fn destination_path(&self) -> &std::path::Path {
        &self.destination_path
    }

    /// Resolved tags, `None` when running with [`TagMode::None`]
    pub fn tags(&self) -> Option<&TagSet> {
        self.tags.as_ref()
    }
}

/// Summary of a queued item, as listed by `view_queue`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 1-based position in the queue
    pub index: usize,
    /// Source URL
    pub source_url: String,
    /// Destination path
    pub destination_path: PathBuf,
    /// Whether the item carries tag data
    pub has_tags: bool,
}

/// Pipeline stage of a worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Resolve the audio stream and fetch it to a temporary file
    Fetch,
    /// Transcode the temporary file into the destination format
    Convert,
    /// Delete the temporary file
    Cleanup,
    /// Write tags into the destination file
    Tag,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Convert => "convert",
            Stage::Cleanup => "cleanup",
            Stage::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// Final status of one worker run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// All stages finished
    Succeeded {
        /// Tag fields actually written into the file
        tags_written: BTreeSet<TagField>,
    },
    /// A stage failed; later stages were not run
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Error category
        category: ErrorCategory,
        /// Human-readable error message
        message: String,
    },
}

/// Per-item result collected by the download manager
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// 1-based position in the queue
    pub index: usize,
    /// Source URL of the item
    pub source_url: String,
    /// Destination path of the item
    pub destination_path: PathBuf,
    /// What happened
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// Whether the item went through every stage
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded { .. })
    }
}

/// Aggregate result of `DownloadManager::download`, ordered by queue index
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    /// One outcome per queued item, in queue order
    pub outcomes: Vec<ItemOutcome>,
}

impl DownloadReport {
    /// Number of items that succeeded
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of items that failed
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when every item succeeded (vacuously true for an empty queue)
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Outcomes of the failed items
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Process exit code for this run
    ///
    /// 0 when every item succeeded, the cancelled code when `cancelled` is set
    /// or any item failed as cancelled, otherwise
    /// [`EXIT_PARTIAL_FAILURE`](crate::error::EXIT_PARTIAL_FAILURE).
    pub fn exit_code(&self, cancelled: bool) -> i32 {
        use crate::error::{EXIT_PARTIAL_FAILURE, ToExitCode};

        if self.all_succeeded() {
            return 0;
        }
        let any_cancelled = self.failures().any(|o| {
            matches!(
                o.status,
                ItemStatus::Failed {
                    category: ErrorCategory::Cancelled,
                    ..
                }
            )
        });
        if cancelled || any_cancelled {
            ErrorCategory::Cancelled.exit_code()
        } else {
            EXIT_PARTIAL_FAILURE
        }
    }
}

/// Event emitted during a download run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item added to the queue
    Queued {
        /// 1-based queue position
        index: usize,
        /// Source URL
        url: String,
        /// Destination path
        destination: PathBuf,
    },

    /// A worker picked up an item
    WorkerStarted {
        /// 1-based queue position
        index: usize,
    },

    /// A stage started for an item
    StageStarted {
        /// 1-based queue position
        index: usize,
        /// Stage
        stage: Stage,
    },

    /// A stage completed for an item
    StageCompleted {
        /// 1-based queue position
        index: usize,
        /// Stage
        stage: Stage,
    },

    /// Item fully processed
    ItemComplete {
        /// 1-based queue position
        index: usize,
        /// Path of the finished file
        path: PathBuf,
        /// Tag fields written
        tags_written: BTreeSet<TagField>,
    },

    /// Item failed
    ItemFailed {
        /// 1-based queue position
        index: usize,
        /// Stage that failed
        stage: Stage,
        /// Error category
        category: ErrorCategory,
        /// Error message
        error: String,
    },

    /// Every worker has finished
    BatchComplete {
        /// Number of items that succeeded
        succeeded: usize,
        /// Number of items that failed
        failed: usize,
    },
}
