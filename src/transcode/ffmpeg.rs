//! ffmpeg-based transcoder using the external `ffmpeg` binary

use super::Transcoder;
use crate::error::{Error, TranscodeError};
use crate::types::AudioFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Transcoder backed by the external `ffmpeg` binary
///
/// ffmpeg is run with `-hide_banner -loglevel error` so routine diagnostics are
/// suppressed and only errors end up on stderr. The child process is killed if
/// the transcode future is dropped (timeout or cancellation).
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
}

impl FfmpegTranscoder {
    /// Create a new transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }
}

/// Codec arguments for an output format
fn codec_args(format: AudioFormat) -> &'static [&'static str] {
    match format {
        AudioFormat::Mp3 => &["-codec:a", "libmp3lame", "-q:a", "0"],
        AudioFormat::Wav => &["-codec:a", "pcm_s16le"],
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> crate::Result<()> {
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            ?format,
            "running ffmpeg"
        );

        let result = Command::new(&self.binary_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"])
            .arg(input)
            .arg("-vn")
            .args(codec_args(format))
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !result.status.success() {
            return Err(TranscodeError::Failed {
                input: input.to_path_buf(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            }
            .into());
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(TranscodeError::MissingOutput {
                output: output.to_path_buf(),
            }
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
