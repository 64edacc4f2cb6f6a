//! Download phase: dispatches queued items to workers and joins them.

use std::sync::Arc;

use crate::config::ExecutionMode;
use crate::error::{Error, ErrorCategory, Result};
use crate::types::{DownloadReport, Event, ItemOutcome, ItemStatus, QueueItem, Stage};

use super::worker::{WorkerContext, run_worker};
use super::{DownloadManager, ManagerState};

impl DownloadManager {
    /// Run every queued item through the pipeline
    ///
    /// Moves the manager to `Running` and, once every worker has been joined,
    /// to `Drained`. In sequential mode items run one at a time in queue order.
    /// In parallel mode one task is spawned per item up front and at most
    /// `max_concurrent` of them hold a permit at any time.
    ///
    /// Per-item failures never abort the batch; they are reported in the
    /// returned [`DownloadReport`], which is ordered by queue index.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if called twice
    /// - [`Error::Io`] if the temporary directory cannot be created
    pub async fn download(&mut self) -> Result<DownloadReport> {
        match self.state {
            ManagerState::Empty | ManagerState::Accepting => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "start download".to_string(),
                    state: state.to_string(),
                });
            }
        }

        let temp_dir = self.config.download.resolved_temp_dir();
        tokio::fs::create_dir_all(&temp_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create temp directory '{}': {}",
                    temp_dir.display(),
                    e
                ),
            ))
        })?;

        self.state = ManagerState::Running;
        let items = std::mem::take(&mut self.queue);

        tracing::info!(items = items.len(), mode = ?self.mode, "starting downloads");

        let ctx = Arc::new(WorkerContext {
            source: Arc::clone(&self.source),
            transcoder: Arc::clone(&self.transcoder),
            config: Arc::clone(&self.config),
            event_tx: self.event_tx.clone(),
            cancel_token: self.cancel_token.clone(),
            temp_dir,
        });

        let outcomes = match self.mode {
            ExecutionMode::Sequential => run_sequential(ctx, items).await,
            ExecutionMode::Parallel { max_concurrent } => {
                run_parallel(ctx, items, max_concurrent).await
            }
        };

        let report = DownloadReport { outcomes };
        self.state = ManagerState::Drained;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "all workers finished"
        );
        self.emit_event(Event::BatchComplete {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });

        Ok(report)
    }
}

async fn run_sequential(ctx: Arc<WorkerContext>, items: Vec<QueueItem>) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        outcomes.push(run_worker(Arc::clone(&ctx), i + 1, item).await);
    }
    outcomes
}

async fn run_parallel(
    ctx: Arc<WorkerContext>,
    items: Vec<QueueItem>,
    max_concurrent: usize,
) -> Vec<ItemOutcome> {
    let concurrent_limit = Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1)));

    let handles: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let index = i + 1;
            let source_url = item.source_url().to_string();
            let destination_path = item.destination_path().to_path_buf();
            let ctx = Arc::clone(&ctx);
            let concurrent_limit = Arc::clone(&concurrent_limit);

            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = concurrent_limit.acquire_owned().await.ok();
                run_worker(ctx, index, item).await
            });

            (index, source_url, destination_path, handle)
        })
        .collect();

    // Full barrier: every handle is awaited, even after failures
    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, source_url, destination_path, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(index, error = %e, "worker task panicked");
                ItemOutcome {
                    index,
                    source_url,
                    destination_path,
                    status: ItemStatus::Failed {
                        stage: Stage::Fetch,
                        category: ErrorCategory::Internal,
                        message: format!("worker task failed: {}", e),
                    },
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes.sort_by_key(|o| o.index);
    outcomes
}
