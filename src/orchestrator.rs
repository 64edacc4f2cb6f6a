//! Turns a song or album target into a populated [`DownloadManager`].
//!
//! Everything that may prompt the user (manual tag mode) happens here, during
//! the sequential enqueue phase, before any worker starts.
//!
//! Layout produced under `output_dir`:
//! - song: `<artist> - <title>.<ext>`
//! - album: `<album artist> - <album title>/<track>. <title>.<ext>`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::downloader::DownloadManager;
use crate::error::{Error, ErrorCategory, Result};
use crate::retry::with_retry;
use crate::source::{ItemInfo, MediaSource, validate_url};
use crate::tagging::{Prompter, TagResolver};
use crate::transcode::Transcoder;
use crate::types::{DownloadReport, QueueItem, TagSet};
use crate::utils::{get_unique_path, sanitize_component};

/// Resolves targets, builds file names and fills the download queue
pub struct Orchestrator {
    config: Arc<Config>,
    source: Arc<dyn MediaSource>,
    transcoder: Arc<dyn Transcoder>,
    resolver: TagResolver,
    cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator for one run
    ///
    /// `prompter` is only consulted in manual tag mode.
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let resolver = TagResolver::new(config.tagging.tag_mode, prompter);
        Self {
            config,
            source,
            transcoder,
            resolver,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token shared with every download manager this orchestrator creates
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn new_manager(&self) -> DownloadManager {
        DownloadManager::new(
            Arc::clone(&self.config),
            Arc::clone(&self.source),
            Arc::clone(&self.transcoder),
        )
        .with_cancel_token(self.cancel_token.clone())
    }

    fn extension(&self) -> &'static str {
        self.config.download.format.extension()
    }

    /// Resolve a single item and queue it
    ///
    /// Returns the manager ready for `download()`. The queue is empty when the
    /// destination exists and the collision policy is `skip`.
    pub async fn prepare_song(&self, url: &str) -> Result<DownloadManager> {
        validate_url(url)?;
        let outdir = &self.config.download.output_dir;

        tracing::info!(
            url,
            outdir = %outdir.display(),
            tag_mode = %self.resolver.mode(),
            "initializing song download"
        );
        if self.config.download.parallel {
            tracing::info!("parallel downloading is enabled but has no effect on a single song");
        }

        let item = self.resolve_with_retry(url).await?;
        tracing::info!(title = %item.title, "video resolved");

        let tags = self.resolver.resolve_item(&item, None, None)?;

        let (artist, title) = match &tags {
            Some(t) => (
                t.artist.as_deref().unwrap_or(&item.author),
                t.title.as_deref().unwrap_or(&item.title),
            ),
            None => (item.author.as_str(), item.title.as_str()),
        };
        let file_name = format!(
            "{} - {}.{}",
            sanitize_component(artist),
            sanitize_component(title),
            self.extension()
        );

        create_dir(outdir).await?;

        let mut manager = self.new_manager();
        self.enqueue(&mut manager, url, outdir.join(&file_name), tags)?;
        Ok(manager)
    }

    /// Resolve a collection and queue every member
    ///
    /// The album directory is created (or reused) before anything is queued.
    /// A member whose metadata cannot be resolved is still queued under its
    /// video id so that its failure shows up in the report.
    pub async fn prepare_album(&self, url: &str) -> Result<DownloadManager> {
        validate_url(url)?;
        let outdir = &self.config.download.output_dir;

        tracing::info!(
            url,
            outdir = %outdir.display(),
            tag_mode = %self.resolver.mode(),
            "initializing album download"
        );

        let collection =
            with_retry(&self.config.retry, || self.source.resolve_collection(url)).await?;
        tracing::info!(
            title = %collection.title,
            items = collection.item_urls.len(),
            "playlist resolved"
        );

        let album_tags = self.resolver.resolve_collection(&collection)?;

        let (album_artist, album_title) = match &album_tags {
            Some(t) => (
                t.artist.as_deref().unwrap_or(&collection.owner),
                t.title.as_deref().unwrap_or(&collection.title),
            ),
            None => (collection.owner.as_str(), collection.title.as_str()),
        };
        let album_dir = outdir.join(format!(
            "{} - {}",
            sanitize_component(album_artist),
            sanitize_component(album_title)
        ));
        create_dir(&album_dir).await?;

        let mut manager = self.new_manager();
        for (i, member_url) in collection.item_urls.iter().enumerate() {
            let track_num = u32::try_from(i + 1).ok();

            let item = match self.resolve_with_retry(member_url).await {
                Ok(item) => item,
                Err(e) if e.category() == ErrorCategory::Cancelled => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %member_url, error = %e, "could not resolve album member");
                    placeholder_item(member_url, &collection.owner)
                }
            };

            let tags = self
                .resolver
                .resolve_item(&item, track_num, album_tags.as_ref())?;

            let title = tags
                .as_ref()
                .and_then(|t| t.title.as_deref())
                .unwrap_or(&item.title);
            let file_name = format!(
                "{}. {}.{}",
                i + 1,
                sanitize_component(title),
                self.extension()
            );

            self.enqueue(&mut manager, member_url, album_dir.join(&file_name), tags)?;
        }

        for entry in manager.view_queue() {
            tracing::debug!(
                index = entry.index,
                url = %entry.source_url,
                destination = %entry.destination_path.display(),
                has_tags = entry.has_tags,
                "queue entry"
            );
        }

        Ok(manager)
    }

    /// Download a single item
    pub async fn download_song(&self, url: &str) -> Result<DownloadReport> {
        let mut manager = self.prepare_song(url).await?;
        manager.download().await
    }

    /// Download every item of a collection into its album directory
    pub async fn download_album(&self, url: &str) -> Result<DownloadReport> {
        let mut manager = self.prepare_album(url).await?;
        manager.download().await
    }

    /// Apply the collision policy, then queue the item
    fn enqueue(
        &self,
        manager: &mut DownloadManager,
        url: &str,
        destination: PathBuf,
        tags: Option<TagSet>,
    ) -> Result<()> {
        let Some(destination) =
            get_unique_path(&destination, self.config.download.file_collision)?
        else {
            tracing::info!(path = %destination.display(), "file exists, skipping");
            return Ok(());
        };

        tracing::info!(file = %destination.display(), "queued");
        manager.add_to_queue(QueueItem::new(url, destination, tags))?;
        Ok(())
    }

    async fn resolve_with_retry(&self, url: &str) -> Result<ItemInfo> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        with_retry(&self.config.retry, || self.source.resolve_item(url)).await
    }
}

/// Stand-in metadata for a collection member that could not be resolved
fn placeholder_item(url: &str, owner: &str) -> ItemInfo {
    let id = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| sanitize_component(url));

    ItemInfo {
        url: url.to_string(),
        title: id.clone(),
        author: owner.to_string(),
        upload_date: None,
        audio_streams: vec![],
        id,
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory '{}': {}", dir.display(), e),
        ))
    })
}
