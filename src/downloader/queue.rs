//! Enqueue phase.

use crate::error::{Error, Result};
use crate::types::{Event, QueueEntry, QueueItem};

use super::{DownloadManager, ManagerState};

impl DownloadManager {
    /// Append an item to the queue
    ///
    /// Only valid before `download()` has been called. Returns the new queue
    /// length.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] once the manager is running or drained
    /// - [`Error::DuplicateDestination`] if another queued item already writes
    ///   the same destination path
    pub fn add_to_queue(&mut self, item: QueueItem) -> Result<usize> {
        match self.state {
            ManagerState::Empty | ManagerState::Accepting => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "add to queue".to_string(),
                    state: state.to_string(),
                });
            }
        }

        if self
            .queue
            .iter()
            .any(|queued| queued.destination_path() == item.destination_path())
        {
            return Err(Error::DuplicateDestination(
                item.destination_path().to_path_buf(),
            ));
        }

        let index = self.queue.len() + 1;
        tracing::debug!(
            index,
            url = item.source_url(),
            destination = %item.destination_path().display(),
            "item queued"
        );
        self.emit_event(Event::Queued {
            index,
            url: item.source_url().to_string(),
            destination: item.destination_path().to_path_buf(),
        });

        self.queue.push(item);
        self.state = ManagerState::Accepting;

        Ok(self.queue.len())
    }

    /// Number of queued items
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// List the queued items in order
    ///
    /// Empty once the download phase has started.
    pub fn view_queue(&self) -> Vec<QueueEntry> {
        self.queue
            .iter()
            .enumerate()
            .map(|(i, item)| QueueEntry {
                index: i + 1,
                source_url: item.source_url().to_string(),
                destination_path: item.destination_path().to_path_buf(),
                has_tags: item.tags().is_some(),
            })
            .collect()
    }
}
