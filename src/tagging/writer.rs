//! ID3v2.4 tag writer
//!
//! Tags are written to a sibling copy of the file which is then renamed over
//! the original, so a failed write never leaves a half-tagged file behind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use id3::{Tag, TagLike, Version};

use crate::error::{Error, Result, TagError};
use crate::types::{TagField, TagSet};

/// Append `tags` to the audio file at `path`.
///
/// With `None` nothing is read or written and the empty set is returned.
/// Otherwise every present field is validated up front, then written; frames
/// already in the file that `tags` does not mention are kept. Writing the same
/// set twice yields the same file contents.
///
/// Blocking; call it from `spawn_blocking` inside async code.
///
/// # Errors
///
/// - [`TagError::InvalidValue`] for a value that cannot be written
/// - [`TagError::WriteFailed`] if the file or its existing tag cannot be read,
///   or the new tag cannot be written
pub fn append_tags(path: &Path, tags: Option<&TagSet>) -> Result<BTreeSet<TagField>> {
    append_tags_unless(path, tags, || false)
}

/// [`append_tags`], giving up with [`Error::Cancelled`] if `abandoned`
/// returns true once the staging copy is tagged. The original file is only
/// replaced when it does not.
pub(crate) fn append_tags_unless(
    path: &Path,
    tags: Option<&TagSet>,
    abandoned: impl Fn() -> bool,
) -> Result<BTreeSet<TagField>> {
    let Some(tags) = tags else {
        return Ok(BTreeSet::new());
    };

    validate(tags)?;

    let is_wav = is_wav(path);
    let mut tag = read_existing(path, is_wav)?;

    if let Some(title) = &tags.title {
        tag.set_title(title.as_str());
    }
    if let Some(artist) = &tags.artist {
        tag.set_artist(artist.as_str());
    }
    if let Some(album) = &tags.album {
        tag.set_album(album.as_str());
    }
    if let Some(track) = tags.track_num {
        tag.set_track(track);
    }
    if let Some(year) = tags.release_year {
        tag.set_year(year);
    }
    if let Some(genre) = &tags.genre {
        tag.set_genre(genre.as_str());
    }

    let staging = staging_path(path);
    let written = write_staging(&tag, path, &staging, is_wav).and_then(|()| {
        if abandoned() {
            return Err(Error::Cancelled);
        }
        std::fs::rename(&staging, path).map_err(|e| write_failed(path, e).into())
    });

    if let Err(e) = written {
        let _ = std::fs::remove_file(&staging);
        match e {
            Error::Cancelled => {
                tracing::debug!(path = %path.display(), "tag write abandoned")
            }
            _ => tracing::error!(path = %path.display(), error = %e, "failed to write tags"),
        }
        return Err(e);
    }

    let fields = tags.present_fields();
    tracing::debug!(path = %path.display(), fields = fields.len(), "tags written");
    Ok(fields)
}

/// Tag already in the file, or a fresh one if it has none
fn read_existing(path: &Path, is_wav: bool) -> std::result::Result<Tag, TagError> {
    let existing = if is_wav {
        Tag::read_from_wav_path(path)
    } else {
        Tag::read_from_path(path)
    };
    match existing {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Ok(Tag::new()),
        Err(e) => Err(write_failed(path, e)),
    }
}

/// Copy `path` to `staging` and write `tag` into the copy
fn write_staging(tag: &Tag, path: &Path, staging: &Path, is_wav: bool) -> Result<()> {
    std::fs::copy(path, staging).map_err(|e| write_failed(path, e))?;
    let result = if is_wav {
        tag.write_to_wav_path(staging, Version::Id3v24)
    } else {
        tag.write_to_path(staging, Version::Id3v24)
    };
    result.map_err(|e| write_failed(path, e))?;
    Ok(())
}

fn validate(tags: &TagSet) -> std::result::Result<(), TagError> {
    if tags.track_num == Some(0) {
        return Err(TagError::InvalidValue {
            field: TagField::TrackNum,
            reason: "track numbers start at 1".to_string(),
        });
    }

    if let Some(year) = tags.release_year
        && !(0..=9999).contains(&year)
    {
        return Err(TagError::InvalidValue {
            field: TagField::ReleaseYear,
            reason: format!("{} is not a four digit year", year),
        });
    }

    let text_fields = [
        (TagField::Title, &tags.title),
        (TagField::Artist, &tags.artist),
        (TagField::Album, &tags.album),
        (TagField::Genre, &tags.genre),
    ];
    for (field, value) in text_fields {
        if value.as_deref().is_some_and(|v| v.contains('\0')) {
            return Err(TagError::InvalidValue {
                field,
                reason: "contains a NUL character".to_string(),
            });
        }
    }

    Ok(())
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// `dir/.name.tagging` next to `path`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tagging", name))
}

fn write_failed(path: &Path, e: impl std::fmt::Display) -> TagError {
    TagError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
