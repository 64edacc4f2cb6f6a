//! Metadata resolver: produces a [`TagSet`] per item or collection
//!
//! | mode   | item                                   | collection member                         |
//! |--------|----------------------------------------|-------------------------------------------|
//! | none   | no tags                                | no tags                                   |
//! | auto   | title/artist from remote               | title from remote, rest from album tags   |
//! | manual | title/artist/genre asked, remote default | title asked, rest from album tags       |
//!
//! A collection-level `TagSet` uses `title` for the album title and `artist`
//! for the album artist.

use std::sync::Arc;

use crate::error::{Result, TagError};
use crate::source::{CollectionInfo, ItemInfo};
use crate::tagging::prompt::Prompter;
use crate::types::{TagField, TagMode, TagSet};

/// Resolves tags according to the run's tag mode
pub struct TagResolver {
    mode: TagMode,
    prompter: Arc<dyn Prompter>,
}

impl TagResolver {
    /// Create a resolver; `prompter` is only used in [`TagMode::Manual`]
    pub fn new(mode: TagMode, prompter: Arc<dyn Prompter>) -> Self {
        Self { mode, prompter }
    }

    /// Tag mode of this resolver
    pub fn mode(&self) -> TagMode {
        self.mode
    }

    /// Resolve the tags of one item.
    ///
    /// `track_num` is the item's 1-based position when it belongs to a
    /// collection, and `album` the already-resolved collection tags.
    pub fn resolve_item(
        &self,
        item: &ItemInfo,
        track_num: Option<u32>,
        album: Option<&TagSet>,
    ) -> Result<Option<TagSet>> {
        match self.mode {
            TagMode::None => Ok(None),
            TagMode::Auto => {
                tracing::debug!(url = %item.url, "deriving tags from remote metadata");
                let mut tags = TagSet {
                    title: Some(item.title.clone()),
                    artist: Some(item.author.clone()),
                    ..Default::default()
                };
                if let Some(album) = album {
                    inherit_album(&mut tags, album, track_num);
                }
                Ok(Some(tags))
            }
            TagMode::Manual => {
                self.prompter
                    .announce("Please provide tag data below. Leave blank to use remote value");

                let title = or_default(self.prompter.ask("Title", Some(&item.title))?, &item.title);
                let mut tags = TagSet {
                    title: Some(title),
                    ..Default::default()
                };

                match album {
                    Some(album) => inherit_album(&mut tags, album, track_num),
                    None => {
                        let artist = self.prompter.ask("Artist", Some(&item.author))?;
                        tags.artist = Some(or_default(artist, &item.author));
                        tags.genre = non_empty(self.prompter.ask("Genre", None)?);
                    }
                }
                Ok(Some(tags))
            }
        }
    }

    /// Resolve the album-level tags of a collection
    pub fn resolve_collection(&self, collection: &CollectionInfo) -> Result<Option<TagSet>> {
        match self.mode {
            TagMode::None => Ok(None),
            TagMode::Auto => {
                tracing::debug!(url = %collection.url, "deriving album tags from remote metadata");
                Ok(Some(TagSet {
                    title: Some(collection.title.clone()),
                    artist: Some(collection.owner.clone()),
                    release_year: collection.release_year(),
                    ..Default::default()
                }))
            }
            TagMode::Manual => {
                self.prompter.announce(
                    "Please provide album tag data below. Leave blank to use remote value",
                );

                let title = self.prompter.ask("Album title", Some(&collection.title))?;
                let artist = self.prompter.ask("Artist", Some(&collection.owner))?;
                let remote_year = collection.release_year().map(|y| y.to_string());
                let year = self
                    .prompter
                    .ask("Release year", remote_year.as_deref())?;
                let genre = self.prompter.ask("Genre", None)?;

                let release_year = match non_empty(year) {
                    Some(text) => Some(parse_year(&text)?),
                    None => collection.release_year(),
                };

                Ok(Some(TagSet {
                    title: Some(or_default(title, &collection.title)),
                    artist: Some(or_default(artist, &collection.owner)),
                    release_year,
                    genre: non_empty(genre),
                    ..Default::default()
                }))
            }
        }
    }
}

/// Copy album context into a member's tags.
///
/// The album artist overrides the per-item artist; `release_year` is the
/// album's scalar year.
fn inherit_album(tags: &mut TagSet, album: &TagSet, track_num: Option<u32>) {
    tags.artist = album.artist.clone().or(tags.artist.take());
    tags.album = album.title.clone();
    tags.track_num = track_num;
    tags.release_year = album.release_year;
    tags.genre = album.genre.clone();
}

fn non_empty(answer: String) -> Option<String> {
    if answer.trim().is_empty() {
        None
    } else {
        Some(answer.trim().to_string())
    }
}

fn or_default(answer: String, default: &str) -> String {
    non_empty(answer).unwrap_or_else(|| default.to_string())
}

fn parse_year(text: &str) -> Result<i32> {
    text.trim().parse::<i32>().map_err(|_| {
        TagError::InvalidValue {
            field: TagField::ReleaseYear,
            reason: format!("'{}' is not a number", text.trim()),
        }
        .into()
    })
}
