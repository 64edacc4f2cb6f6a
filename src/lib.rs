//! # music-downloader
//!
//! Download audio from a video platform, transcode it and tag the result,
//! for a single song or a whole playlist treated as an album.
//!
//! ## Pipeline
//!
//! Every queued item goes through the same ordered stages in its own worker:
//!
//! 1. **fetch** - resolve the best audio-only stream and download it to a temp file
//! 2. **convert** - transcode the temp file into the destination format
//! 3. **cleanup** - delete the temp file
//! 4. **tag** - write the resolved [`TagSet`] into the destination file
//!
//! A failure stops that item only; the [`DownloadReport`] returned by
//! [`DownloadManager::download`] carries one outcome per item.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use music_downloader::{Config, Orchestrator, StdioPrompter};
//! use music_downloader::source::YtDlpSource;
//! use music_downloader::transcode::FfmpegTranscoder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     let source = YtDlpSource::from_path().ok_or("yt-dlp not found")?;
//!     let ffmpeg = FfmpegTranscoder::from_path().ok_or("ffmpeg not found")?;
//!
//!     let orchestrator = Orchestrator::new(
//!         config,
//!         Arc::new(source),
//!         Arc::new(ffmpeg),
//!         Arc::new(StdioPrompter::default()),
//!     );
//!
//!     let report = orchestrator
//!         .download_album("https://www.youtube.com/playlist?list=PL...")
//!         .await?;
//!     println!("{} ok, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download manager and pipeline workers
pub mod downloader;
/// Error types
pub mod error;
/// Song and album targets
pub mod orchestrator;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote video-platform client
pub mod source;
/// Tag resolution and writing
pub mod tagging;
/// External transcoder
pub mod transcode;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, ConfigOverrides, ExecutionMode, FileCollisionAction};
pub use downloader::{DownloadManager, ManagerState};
pub use error::{Error, ErrorCategory, Result, ToExitCode};
pub use orchestrator::Orchestrator;
pub use tagging::{Prompter, StdioPrompter, TagResolver, append_tags};
pub use types::{
    AudioFormat, DownloadReport, Event, ItemOutcome, ItemStatus, QueueEntry, QueueItem, Stage,
    TagField, TagMode, TagSet,
};

/// Cancel `token` when the process receives a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// In-flight workers stop at their current stage and are reported as cancelled.
///
/// # Example
///
/// ```no_run
/// use music_downloader::cancel_on_signal;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let token = CancellationToken::new();
/// tokio::spawn(cancel_on_signal(token.clone()));
/// # }
/// ```
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => token.cancel(),
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
