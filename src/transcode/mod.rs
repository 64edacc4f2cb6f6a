//! External transcoder boundary
//!
//! Converting the raw stream into the destination format is delegated to an
//! external program. [`Transcoder`] is the seam; [`FfmpegTranscoder`] runs
//! `ffmpeg` as a subprocess.

mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use crate::types::AudioFormat;
use async_trait::async_trait;
use std::path::Path;

/// Converts a raw audio file into the destination format
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output` using `format`
    ///
    /// Only error-level diagnostics are surfaced. A non-zero exit is a hard
    /// failure for the item.
    ///
    /// # Errors
    ///
    /// Returns a transcode error if the program fails or produces no output,
    /// or an external tool error if it cannot be started.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
