//! yt-dlp based media source using the external `yt-dlp` binary

use super::parser::{parse_collection_json, parse_item_json};
use super::traits::{AudioStream, CollectionInfo, ItemInfo, MediaSource};
use super::validate_url;
use crate::error::{Error, SourceError};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

/// Media source backed by the external `yt-dlp` binary
///
/// Metadata is read with `--dump-single-json`; streams are fetched with an
/// explicit `--format` so the selected audio-only variant is downloaded as is.
/// Child processes are killed when the future driving them is dropped, which
/// is how stage timeouts and cancellation stop a hanging fetch.
///
/// # Examples
///
/// ```no_run
/// use music_downloader::source::{MediaSource, YtDlpSource};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = YtDlpSource::from_path().expect("yt-dlp not found in PATH");
/// let item = source.resolve_item("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
/// println!("{} by {}", item.title, item.author);
/// # Ok(())
/// # }
/// ```
pub struct YtDlpSource {
    binary_path: PathBuf,
}

impl YtDlpSource {
    /// Create a new source with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    async fn run(&self, args: &[&str], url: &str) -> crate::Result<Output> {
        tracing::debug!(binary = %self.binary_path.display(), ?args, url, "running yt-dlp");
        Command::new(&self.binary_path)
            .args(args)
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))
    }
}

/// Last non-empty stderr line, which is where yt-dlp prints its ERROR message
fn stderr_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status))
}

/// Unique file stem for a raw download of `item_id`
fn temp_file_stem(item_id: &str) -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    let safe_id: String = item_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}-{:08x}", safe_id, suffix)
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn resolve_item(&self, url: &str) -> crate::Result<ItemInfo> {
        validate_url(url)?;

        let output = self
            .run(&["--dump-single-json", "--no-warnings", "--no-playlist"], url)
            .await?;

        if !output.status.success() {
            return Err(SourceError::ResolveFailed {
                url: url.to_string(),
                reason: stderr_reason(&output),
            }
            .into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_item_json(url, &json)
    }

    async fn resolve_collection(&self, url: &str) -> crate::Result<CollectionInfo> {
        validate_url(url)?;

        let output = self
            .run(
                &[
                    "--dump-single-json",
                    "--no-warnings",
                    "--flat-playlist",
                    "--yes-playlist",
                ],
                url,
            )
            .await?;

        if !output.status.success() {
            return Err(SourceError::ResolveFailed {
                url: url.to_string(),
                reason: stderr_reason(&output),
            }
            .into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_collection_json(url, &json)
    }

    async fn fetch_audio(
        &self,
        item: &ItemInfo,
        stream: &AudioStream,
        dest_dir: &Path,
    ) -> crate::Result<PathBuf> {
        let path = dest_dir.join(format!("{}.{}", temp_file_stem(&item.id), stream.ext));
        let output_arg = path.to_string_lossy().into_owned();

        let output = self
            .run(
                &[
                    "--no-warnings",
                    "--no-playlist",
                    "--no-part",
                    "--no-continue",
                    "--quiet",
                    "--format",
                    &stream.format_id,
                    "--output",
                    &output_arg,
                ],
                &item.url,
            )
            .await?;

        if !output.status.success() {
            // yt-dlp may leave a partial file behind on failure
            let _ = tokio::fs::remove_file(&path).await;
            return Err(SourceError::FetchFailed {
                url: item.url.clone(),
                reason: stderr_reason(&output),
            }
            .into());
        }

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(SourceError::FetchFailed {
                url: item.url.clone(),
                reason: format!("yt-dlp reported success but {} is missing", path.display()),
            }
            .into());
        }

        Ok(path)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
