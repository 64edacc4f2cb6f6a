//! Remote video-platform client boundary
//!
//! The pipeline only needs four things from a platform: resolve an item URL,
//! list its audio-only stream variants, fetch one variant to local storage and
//! list the member URLs of a collection. [`MediaSource`] captures exactly that;
//! [`YtDlpSource`] implements it on top of the external `yt-dlp` binary.

mod parser;
mod traits;
mod ytdlp;

pub use parser::{parse_collection_json, parse_item_json};
pub use traits::{AudioStream, CollectionInfo, ItemInfo, MediaSource};
pub use ytdlp::YtDlpSource;

use crate::error::{Result, SourceError};
use url::Url;

/// Check that `url` is an absolute http(s) URL
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| SourceError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(SourceError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }
            .into());
        }
    }

    if parsed.host_str().is_none() {
        return Err(SourceError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        }
        .into());
    }

    Ok(parsed)
}
