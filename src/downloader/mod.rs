//! Download manager: owns the queue and runs one pipeline worker per item.
//!
//! The `DownloadManager` struct and its methods are organized by concern:
//! - [`queue`] - Enqueue phase (`add_to_queue`, `view_queue`)
//! - [`queue_processor`] - Download phase, sequential or bounded-parallel
//! - [`worker`] - The fetch → convert → cleanup → tag sequence for one item
//!
//! A manager moves through `Empty → Accepting → Running → Drained` and is not
//! reusable once drained; create a fresh one per logical target.

mod queue;
mod queue_processor;
pub(crate) mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExecutionMode};
use crate::source::MediaSource;
use crate::transcode::Transcoder;
use crate::types::{Event, QueueItem};

/// Buffer size of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle state of a [`DownloadManager`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    /// Nothing queued yet
    Empty,
    /// At least one item queued, download not started
    Accepting,
    /// `download()` is in progress
    Running,
    /// Every worker has been joined
    Drained,
}

impl ManagerState {
    fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Empty => "empty",
            ManagerState::Accepting => "accepting",
            ManagerState::Running => "running",
            ManagerState::Drained => "drained",
        }
    }
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the download queue for one target and drives its workers
pub struct DownloadManager {
    /// Immutable run configuration
    pub(crate) config: Arc<Config>,
    /// Remote video-platform client shared by all workers
    pub(crate) source: Arc<dyn MediaSource>,
    /// External transcoder shared by all workers
    pub(crate) transcoder: Arc<dyn Transcoder>,
    /// Items in enqueue order; emptied when the download phase starts
    pub(crate) queue: Vec<QueueItem>,
    pub(crate) state: ManagerState,
    /// Selected once at construction
    pub(crate) mode: ExecutionMode,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Checked by every worker between and during stages
    pub(crate) cancel_token: CancellationToken,
}

impl DownloadManager {
    /// Create an empty manager
    ///
    /// The execution mode (sequential or parallel with a concurrency cap) is
    /// taken from `config.download` and fixed for the manager's lifetime.
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mode = config.download.execution_mode();

        tracing::debug!(
            source = source.name(),
            transcoder = transcoder.name(),
            ?mode,
            "download manager created"
        );

        Self {
            config,
            source,
            transcoder,
            queue: Vec::new(),
            state: ManagerState::Empty,
            mode,
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    ///
    /// Lets one token (e.g. tied to Ctrl-C) cancel managers created later.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Execution mode selected at construction
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// sent after it subscribed. A subscriber that falls more than 1000 events
    /// behind receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use music_downloader::{Config, DownloadManager};
    /// use music_downloader::source::YtDlpSource;
    /// use music_downloader::transcode::FfmpegTranscoder;
    ///
    /// # fn example(source: YtDlpSource, ffmpeg: FfmpegTranscoder) {
    /// let manager = DownloadManager::new(
    ///     Arc::new(Config::default()),
    ///     Arc::new(source),
    ///     Arc::new(ffmpeg),
    /// );
    ///
    /// let mut events = manager.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         println!("{:?}", event);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels the run when triggered
    ///
    /// Cancelling before `download()` makes every item fail as cancelled;
    /// cancelling during the run stops in-flight workers at their current stage.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
