//! Pipeline worker: carries one queue item through fetch → convert → cleanup → tag.
//!
//! Stages run strictly in order. The first failing stage stops the item and is
//! recorded in its [`ItemOutcome`]; other workers are never affected.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result, SourceError};
use crate::retry::with_retry;
use crate::source::MediaSource;
use crate::tagging::writer::append_tags_unless;
use crate::transcode::Transcoder;
use crate::types::{Event, ItemOutcome, ItemStatus, QueueItem, Stage, TagField};

/// Upper bound for deleting the raw file
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, read-only state handed to every worker of a run
pub(crate) struct WorkerContext {
    pub(crate) source: Arc<dyn MediaSource>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
    /// Directory raw downloads are fetched into
    pub(crate) temp_dir: PathBuf,
}

impl WorkerContext {
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run `fut` as `stage`, bounded by `timeout` and the cancellation token
    async fn stage<T, F>(
        &self,
        index: usize,
        stage: Stage,
        timeout: Duration,
        fut: F,
    ) -> std::result::Result<T, (Stage, Error)>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel_token.is_cancelled() {
            return Err((stage, Error::Cancelled));
        }

        self.emit(Event::StageStarted { index, stage });

        let result = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(timeout, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(Error::Timeout {
                    stage: stage.to_string(),
                    limit: timeout,
                }),
            },
        };

        match result {
            Ok(value) => {
                self.emit(Event::StageCompleted { index, stage });
                Ok(value)
            }
            Err(e) => Err((stage, e)),
        }
    }
}

/// Execute every stage for one item and report the outcome
///
/// Never returns an error: failures are folded into the [`ItemOutcome`].
pub(crate) async fn run_worker(
    ctx: Arc<WorkerContext>,
    index: usize,
    item: QueueItem,
) -> ItemOutcome {
    ctx.emit(Event::WorkerStarted { index });
    tracing::debug!(index, url = item.source_url(), "worker started");

    let status = match run_stages(&ctx, index, &item).await {
        Ok(tags_written) => {
            tracing::info!(
                index,
                path = %item.destination_path().display(),
                tags = tags_written.len(),
                "item complete"
            );
            ctx.emit(Event::ItemComplete {
                index,
                path: item.destination_path().to_path_buf(),
                tags_written: tags_written.clone(),
            });
            ItemStatus::Succeeded { tags_written }
        }
        Err((stage, e)) => {
            let category = e.category();
            tracing::error!(
                index,
                url = item.source_url(),
                %stage,
                %category,
                error = %e,
                "item failed"
            );
            ctx.emit(Event::ItemFailed {
                index,
                stage,
                category,
                error: e.to_string(),
            });
            ItemStatus::Failed {
                stage,
                category,
                message: e.to_string(),
            }
        }
    };

    ItemOutcome {
        index,
        source_url: item.source_url().to_string(),
        destination_path: item.destination_path().to_path_buf(),
        status,
    }
}

async fn run_stages(
    ctx: &WorkerContext,
    index: usize,
    item: &QueueItem,
) -> std::result::Result<BTreeSet<TagField>, (Stage, Error)> {
    let timeouts = &ctx.config.timeouts;
    let destination = item.destination_path();

    // Raw downloads of this item live here and nowhere else
    let work_dir = item_work_dir(&ctx.temp_dir, index);

    // Stage 1: resolve the best audio-only stream and fetch it
    let fetched = ctx
        .stage(
            index,
            Stage::Fetch,
            timeouts.fetch,
            fetch(ctx, item.source_url(), &work_dir),
        )
        .await;
    let raw_path = match fetched {
        Ok(path) => path,
        Err(failure) => {
            remove_dir_quietly(&work_dir).await;
            return Err(failure);
        }
    };

    // Stage 2: transcode; the raw file is removed whatever the outcome
    let converted = ctx
        .stage(
            index,
            Stage::Convert,
            timeouts.transcode,
            convert(ctx, &raw_path, destination),
        )
        .await;
    if let Err(failure) = converted {
        remove_dir_quietly(&work_dir).await;
        remove_quietly(destination).await;
        return Err(failure);
    }

    // Stage 3: delete the intermediate raw file
    let cleaned = ctx
        .stage(index, Stage::Cleanup, CLEANUP_TIMEOUT, async {
            tokio::fs::remove_file(&raw_path).await?;
            tokio::fs::remove_dir_all(&work_dir).await.map_err(Error::from)
        })
        .await;
    if let Err(failure) = cleaned {
        remove_dir_quietly(&work_dir).await;
        return Err(failure);
    }

    // Stage 4: write tags into the finished file. The blocking writer cannot
    // be interrupted; if the stage is dropped on timeout or cancellation it
    // discards its staging copy instead of replacing the file.
    let path = destination.to_path_buf();
    let tags = item.tags().cloned();
    let abandoned = CancellationToken::new();
    let abandon_on_drop = abandoned.clone().drop_guard();
    ctx.stage(index, Stage::Tag, timeouts.tag, async move {
        let _abandon_on_drop = abandon_on_drop;
        tokio::task::spawn_blocking(move || {
            append_tags_unless(&path, tags.as_ref(), || abandoned.is_cancelled())
        })
        .await
        .map_err(|e| Error::Other(format!("tag writer task failed: {}", e)))?
    })
    .await
}

/// Per-item directory under `temp_dir`; the random suffix keeps concurrent
/// runs sharing a temp dir apart
fn item_work_dir(temp_dir: &Path, index: usize) -> PathBuf {
    temp_dir.join(format!("item-{}-{:08x}", index, rand::random::<u32>()))
}

async fn fetch(ctx: &WorkerContext, url: &str, work_dir: &Path) -> Result<PathBuf> {
    let source = &ctx.source;
    tokio::fs::create_dir_all(work_dir).await?;

    with_retry(&ctx.config.retry, || async move {
        let info = source.resolve_item(url).await?;
        let stream = info
            .best_audio_stream()
            .cloned()
            .ok_or_else(|| SourceError::NoAudioStream {
                url: url.to_string(),
            })?;
        tracing::debug!(
            url,
            format_id = %stream.format_id,
            bitrate_kbps = ?stream.bitrate_kbps,
            "selected audio stream"
        );
        source.fetch_audio(&info, &stream, work_dir).await
    })
    .await
}

async fn convert(ctx: &WorkerContext, input: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    ctx.transcoder
        .transcode(input, output, ctx.config.download.format)
        .await
}

async fn remove_dir_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temp directory");
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
    }
}
