//! Error types for music-downloader
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Source, Transcode, Tag, Config)
//! - A coarse [`ErrorCategory`] used in per-item outcomes
//! - Process exit code mapping for the command line binary

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::types::TagField;

/// Result type alias for music-downloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for music-downloader
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or argument error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "tag_mode")
        key: Option<String>,
    },

    /// Remote source could not be resolved or fetched
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Transcoder failed
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Tag resolution or tag writing failed
    #[error("tag error: {0}")]
    Tag(#[from] TagError),

    /// Operation not allowed in the download manager's current state
    #[error("cannot {operation} while the download manager is {state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "add to queue")
        operation: String,
        /// The current state (e.g., "running")
        state: String,
    },

    /// Two queue items would write the same file
    #[error("destination {0} is already queued")]
    DuplicateDestination(PathBuf),

    /// The run was cancelled before this operation finished
    #[error("cancelled")]
    Cancelled,

    /// A stage took longer than its configured timeout
    #[error("{stage} timed out after {limit:?}")]
    Timeout {
        /// Name of the stage that timed out
        stage: String,
        /// Configured timeout
        limit: std::time::Duration,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors resolving a URL or fetching its audio stream
#[derive(Debug, Error)]
pub enum SourceError {
    /// URL is not a valid http(s) URL
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The platform client could not resolve the URL
    #[error("could not resolve {url}: {reason}")]
    ResolveFailed {
        /// The URL being resolved
        url: String,
        /// The client's diagnostic
        reason: String,
    },

    /// The item has no audio-only stream variant
    #[error("no audio stream available for {url}")]
    NoAudioStream {
        /// The URL of the item
        url: String,
    },

    /// Fetching the stream to local storage failed
    #[error("fetching {url} failed: {reason}")]
    FetchFailed {
        /// The URL being fetched
        url: String,
        /// The client's diagnostic
        reason: String,
    },

    /// The client's metadata output could not be understood
    #[error("unexpected metadata for {url}: {reason}")]
    MalformedMetadata {
        /// The URL whose metadata was malformed
        url: String,
        /// What was wrong
        reason: String,
    },
}

/// Errors from the external transcoder
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Transcoder exited with a non-zero status
    #[error("transcoding {input} failed with exit code {code:?}: {stderr}")]
    Failed {
        /// Input file
        input: PathBuf,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Error-level diagnostics printed by the transcoder
        stderr: String,
    },

    /// Transcoder reported success but produced no output file
    #[error("transcoder produced no output at {output}")]
    MissingOutput {
        /// Expected output path
        output: PathBuf,
    },
}

/// Errors resolving or writing tag data
#[derive(Debug, Error)]
pub enum TagError {
    /// A field value cannot be written (e.g., non-numeric or out-of-range year)
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: TagField,
        /// Why the value was rejected
        reason: String,
    },

    /// The tag container could not be written to disk
    #[error("failed to write tags to {path}: {reason}")]
    WriteFailed {
        /// File being tagged
        path: PathBuf,
        /// Library diagnostic
        reason: String,
    },

    /// Reading the interactive answer failed
    #[error("failed to read answer for {field}: {reason}")]
    PromptFailed {
        /// Field being prompted for
        field: String,
        /// Underlying I/O problem
        reason: String,
    },
}

/// Coarse error taxonomy used in per-item outcomes and exit codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// URL invalid or stream unavailable
    SourceResolution,
    /// Transcoder failure
    Transcode,
    /// Malformed tag value or failure writing tags
    TagWrite,
    /// Invalid configuration or arguments
    Configuration,
    /// Work was cancelled or timed out
    Cancelled,
    /// Anything else
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::SourceResolution => "source-resolution",
            ErrorCategory::Transcode => "transcode",
            ErrorCategory::TagWrite => "tag-write",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Source(_) => ErrorCategory::SourceResolution,
            Error::Transcode(_) => ErrorCategory::Transcode,
            Error::Tag(_) => ErrorCategory::TagWrite,
            Error::Config { .. } | Error::DuplicateDestination(_) => ErrorCategory::Configuration,
            Error::Cancelled | Error::Timeout { .. } => ErrorCategory::Cancelled,
            Error::InvalidState { .. }
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::ExternalTool(_)
            | Error::NotSupported(_)
            | Error::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Shorthand for a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Exit code used when a batch ran but at least one item failed
pub const EXIT_PARTIAL_FAILURE: i32 = 6;

/// Convert errors to process exit codes for the command line binary
pub trait ToExitCode {
    /// Process exit code for this error
    fn exit_code(&self) -> i32;

    /// Machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for ErrorCategory {
    fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Configuration => 2,
            ErrorCategory::SourceResolution => 3,
            ErrorCategory::Transcode => 4,
            ErrorCategory::TagWrite => 5,
            ErrorCategory::Cancelled => 130,
            ErrorCategory::Internal => 1,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            ErrorCategory::Configuration => "config_error",
            ErrorCategory::SourceResolution => "source_error",
            ErrorCategory::Transcode => "transcode_error",
            ErrorCategory::TagWrite => "tag_error",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Internal => "internal_error",
        }
    }
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Source(e) => match e {
                SourceError::InvalidUrl { .. } => "invalid_url",
                SourceError::ResolveFailed { .. } => "resolve_failed",
                SourceError::NoAudioStream { .. } => "no_audio_stream",
                SourceError::FetchFailed { .. } => "fetch_failed",
                SourceError::MalformedMetadata { .. } => "malformed_metadata",
            },
            Error::Transcode(e) => match e {
                TranscodeError::Failed { .. } => "transcode_failed",
                TranscodeError::MissingOutput { .. } => "transcode_missing_output",
            },
            Error::Tag(e) => match e {
                TagError::InvalidValue { .. } => "invalid_tag_value",
                TagError::WriteFailed { .. } => "tag_write_failed",
                TagError::PromptFailed { .. } => "prompt_failed",
            },
            Error::InvalidState { .. } => "invalid_state",
            Error::DuplicateDestination(_) => "duplicate_destination",
            Error::Cancelled => "cancelled",
            Error::Timeout { .. } => "timeout",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}
