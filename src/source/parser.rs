//! Parsing of yt-dlp's JSON metadata (`--dump-single-json`)

use super::traits::{AudioStream, CollectionInfo, ItemInfo};
use crate::error::{Result, SourceError};
use chrono::NaiveDate;
use serde::Deserialize;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    abr: Option<f64>,
}

impl RawFormat {
    fn is_audio_only(&self) -> bool {
        let has_audio = matches!(self.acodec.as_deref(), Some(c) if c != "none");
        let no_video = matches!(self.vcodec.as_deref(), Some("none"));
        has_audio && no_video
    }
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    modified_date: Option<String>,
    #[serde(default)]
    playlist_count: Option<usize>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

/// Parse a `YYYYMMDD` date as printed by yt-dlp
fn parse_compact_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v, "%Y%m%d").ok())
}

fn malformed(url: &str, reason: impl Into<String>) -> SourceError {
    SourceError::MalformedMetadata {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Parse the metadata of a single item
///
/// Only audio-only formats are kept as stream variants.
pub fn parse_item_json(url: &str, json: &str) -> Result<ItemInfo> {
    let raw: RawItem = serde_json::from_str(json).map_err(|e| malformed(url, e.to_string()))?;

    let audio_streams = raw
        .formats
        .into_iter()
        .filter(RawFormat::is_audio_only)
        .map(|f| AudioStream {
            ext: f.ext.unwrap_or_else(|| "webm".to_string()),
            codec: f.acodec,
            bitrate_kbps: f.abr,
            format_id: f.format_id,
        })
        .collect();

    Ok(ItemInfo {
        url: raw.webpage_url.unwrap_or_else(|| url.to_string()),
        title: raw.title.unwrap_or_else(|| raw.id.clone()),
        author: raw
            .uploader
            .or(raw.channel)
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        upload_date: parse_compact_date(raw.upload_date.as_deref()),
        audio_streams,
        id: raw.id,
    })
}

/// Parse the flat metadata of a collection
///
/// Entries without a usable URL or id (deleted or private videos) are skipped.
pub fn parse_collection_json(url: &str, json: &str) -> Result<CollectionInfo> {
    let raw: RawCollection =
        serde_json::from_str(json).map_err(|e| malformed(url, e.to_string()))?;

    let item_urls: Vec<String> = raw
        .entries
        .into_iter()
        .flatten()
        .filter_map(|entry| match (entry.url, entry.id) {
            (Some(u), _) if u.starts_with("http://") || u.starts_with("https://") => Some(u),
            (_, Some(id)) if !id.is_empty() => Some(format!("{}{}", WATCH_URL_PREFIX, id)),
            _ => None,
        })
        .collect();

    if item_urls.is_empty() {
        return Err(malformed(url, "collection has no items").into());
    }

    Ok(CollectionInfo {
        url: raw.webpage_url.unwrap_or_else(|| url.to_string()),
        title: raw.title.unwrap_or_else(|| raw.id.clone()),
        owner: raw
            .uploader
            .or(raw.channel)
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        last_updated: parse_compact_date(raw.modified_date.as_deref()),
        item_count: raw.playlist_count.unwrap_or(item_urls.len()),
        item_urls,
        id: raw.id,
    })
}
