//! Configuration types for music-downloader
//!
//! The configuration is read from a TOML file, then command line overrides are
//! applied on top. Once loaded it is immutable and shared as `Arc<Config>`.

use crate::error::{Error, Result};
use crate::types::{AudioFormat, TagMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name used under the per-user config directory
pub const APP_DIR_NAME: &str = "music-downloader";

/// File name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Upper bound for the default worker count
const MAX_DEFAULT_CONCURRENCY: usize = 8;

/// Download behavior configuration (directories, concurrency, output format)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output directory (default: the user's music directory, or "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for raw audio before transcoding (default: system temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Run workers in parallel instead of one after another (default: false)
    #[serde(default)]
    pub parallel: bool,

    /// Maximum number of workers in flight in parallel mode
    /// (default: available cores, at most 8)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Output audio format (default: mp3)
    #[serde(default)]
    pub format: AudioFormat,

    /// What to do when an output file already exists on disk
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: None,
            parallel: false,
            max_concurrent_downloads: default_max_concurrent(),
            format: AudioFormat::default(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

impl DownloadConfig {
    /// Execution mode selected by this configuration
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel {
                max_concurrent: self.max_concurrent_downloads.max(1),
            }
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Temp directory actually used for raw audio
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
    }
}

/// How the download manager runs its workers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One worker at a time, in queue order
    Sequential,
    /// Up to `max_concurrent` workers at once
    Parallel {
        /// Concurrency cap (at least 1)
        max_concurrent: usize,
    },
}

/// Tagging configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Tag mode for the run (default: auto)
    #[serde(default)]
    pub tag_mode: TagMode,
}

/// External tool paths (yt-dlp, ffmpeg)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Per-stage timeouts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Fetch stage timeout (default: 300 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch: Duration,

    /// Convert stage timeout (default: 300 seconds)
    #[serde(default = "default_transcode_timeout", with = "duration_serde")]
    pub transcode: Duration,

    /// Tag stage timeout (default: 30 seconds)
    #[serde(default = "default_tag_timeout", with = "duration_serde")]
    pub tag: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch: default_fetch_timeout(),
            transcode: default_transcode_timeout(),
            tag: default_tag_timeout(),
        }
    }
}

/// Retry configuration for transient source failures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Terminal display settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Print the banner at startup (default: true)
    #[serde(default = "default_true")]
    pub show_banner: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { show_banner: true }
    }
}

/// File collision handling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to the file name (default)
    #[default]
    Rename,
    /// Overwrite the existing file
    Overwrite,
    /// Refuse to download the item
    Skip,
}

/// Main configuration
///
/// Each sub-config is its own TOML table (`[download]`, `[tagging]`, `[tools]`,
/// `[timeouts]`, `[retry]`, `[display]`); missing tables and keys fall back to
/// their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directories, concurrency, output format
    #[serde(default)]
    pub download: DownloadConfig,

    /// Tag mode
    #[serde(default)]
    pub tagging: TaggingConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Per-stage timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry policy for fetching
    #[serde(default)]
    pub retry: RetryConfig,

    /// Terminal display
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Values given on the command line that take precedence over the file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    /// `--outdir`
    pub output_dir: Option<PathBuf>,
    /// `--parallel`
    pub parallel: Option<bool>,
    /// `--jobs`
    pub max_concurrent_downloads: Option<usize>,
    /// `--tag-mode`
    pub tag_mode: Option<TagMode>,
}

impl Config {
    /// Per-user configuration file location (`<config dir>/music-downloader/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration: {}", e),
            key: None,
        })?;
        config.download.output_dir = expand_tilde(&config.download.output_dir);
        config.download.temp_dir = config.download.temp_dir.as_deref().map(expand_tilde);
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("cannot serialize configuration: {}", e),
            key: None,
        })
    }

    /// First-run setup: if the directory holding `path` does not exist yet,
    /// create it and write the default configuration into `path`.
    ///
    /// Returns `true` if the default configuration was written.
    pub fn bootstrap(path: &Path) -> Result<bool> {
        let Some(dir) = path.parent() else {
            return Ok(false);
        };
        if dir.as_os_str().is_empty() || dir.exists() {
            return Ok(false);
        }

        std::fs::create_dir_all(dir)?;
        std::fs::write(path, Config::default().to_toml_string()?)?;
        tracing::debug!(path = %path.display(), "wrote default configuration");
        Ok(true)
    }

    /// Configuration for a run
    ///
    /// An `explicit` path (from `--config`) must exist and parse. Otherwise
    /// `default_path` is bootstrapped on first run and loaded; with no
    /// default location at all the built-in defaults are used.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed, [`Error::Io`]
    /// if bootstrapping the default location fails.
    pub fn load_or_bootstrap(
        explicit: Option<&Path>,
        default_path: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let Some(path) = default_path else {
            tracing::debug!("no user config directory, using defaults");
            return Ok(Config::default());
        };
        if Self::bootstrap(&path)? {
            tracing::debug!(path = %path.display(), "created default configuration");
        }
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply command line overrides (flag > file > default)
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(dir) = overrides.output_dir {
            self.download.output_dir = expand_tilde(&dir);
        }
        if let Some(parallel) = overrides.parallel {
            self.download.parallel = parallel;
        }
        if let Some(jobs) = overrides.max_concurrent_downloads {
            self.download.max_concurrent_downloads = jobs;
        }
        if let Some(mode) = overrides.tag_mode {
            self.tagging.tag_mode = mode;
        }
        self.validate()
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.download.output_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "output directory must not be empty",
                "download.output_dir",
            ));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads must be at least 1",
                "download.max_concurrent_downloads",
            ));
        }
        if let Some(temp) = &self.download.temp_dir
            && temp.as_os_str().is_empty()
        {
            return Err(Error::config(
                "temp directory must not be empty",
                "download.temp_dir",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier must be at least 1.0",
                "retry.backoff_multiplier",
            ));
        }
        for (key, timeout) in [
            ("timeouts.fetch", self.timeouts.fetch),
            ("timeouts.transcode", self.timeouts.transcode),
            ("timeouts.tag", self.timeouts.tag),
        ] {
            if timeout.is_zero() {
                return Err(Error::config("timeout must be greater than zero", key));
            }
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn default_output_dir() -> PathBuf {
    dirs::audio_dir().unwrap_or_else(|| PathBuf::from("./downloads"))
}

fn default_max_concurrent() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_CONCURRENCY)
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_transcode_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_tag_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
