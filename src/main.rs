//! music-downloader command line entry point
//!
//! Parses flags, loads the configuration (bootstrapping it on first run),
//! discovers yt-dlp and ffmpeg, then downloads one song or one album and
//! exits with a code derived from the outcome.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use music_downloader::source::{MediaSource, YtDlpSource};
use music_downloader::transcode::{FfmpegTranscoder, Transcoder};
use music_downloader::{
    Config, ConfigOverrides, DownloadManager, DownloadReport, Error, Event, Orchestrator, Result,
    StdioPrompter, TagMode, ToExitCode,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "music-downloader")]
#[command(about = "Download songs and albums as tagged audio files")]
#[command(version)]
#[command(group(ArgGroup::new("target").required(true).args(["song", "album"])))]
struct Args {
    /// Verbose logging and queue listing
    #[arg(short, long, conflicts_with = "quiet")]
    debug: bool,

    /// No progress output, only fatal diagnostics
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (default: per-user config directory)
    #[arg(short, long, env = "MUSIC_DOWNLOADER_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Download items in parallel
    #[arg(short = 'm', long)]
    parallel: bool,

    /// Maximum number of parallel downloads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Tag mode: none, auto or manual
    #[arg(short, long)]
    tag_mode: Option<TagMode>,

    /// URL of a single video to download as a song
    #[arg(short = 'S', long)]
    song: Option<String>,

    /// URL of a playlist to download as an album
    #[arg(short = 'A', long)]
    album: Option<String>,
}

const BANNER: &str = r"
################################
#                              #
#       Music Downloader       #
#                              #
################################
";

fn init_tracing(args: &Args) {
    let fallback = if args.debug {
        "music_downloader=debug"
    } else if args.quiet {
        "error"
    } else {
        "music_downloader=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load_or_bootstrap(args.config.as_deref(), Config::default_path())?;

    config.apply_overrides(ConfigOverrides {
        output_dir: args.outdir.clone(),
        parallel: args.parallel.then_some(true),
        max_concurrent_downloads: args.jobs,
        tag_mode: args.tag_mode,
    })?;

    Ok(config)
}

fn discover_tools(config: &Config) -> Result<(Arc<dyn MediaSource>, Arc<dyn Transcoder>)> {
    let tools = &config.tools;

    let source = match &tools.ytdlp_path {
        Some(path) => Some(YtDlpSource::new(path.clone())),
        None if tools.search_path => YtDlpSource::from_path(),
        None => None,
    }
    .ok_or_else(|| Error::config("yt-dlp not found", "tools.ytdlp_path"))?;

    let transcoder = match &tools.ffmpeg_path {
        Some(path) => Some(FfmpegTranscoder::new(path.clone())),
        None if tools.search_path => FfmpegTranscoder::from_path(),
        None => None,
    }
    .ok_or_else(|| Error::config("ffmpeg not found", "tools.ffmpeg_path"))?;

    let source: Arc<dyn MediaSource> = Arc::new(source);
    let transcoder: Arc<dyn Transcoder> = Arc::new(transcoder);
    Ok((source, transcoder))
}

/// Print per-worker stage progress until the batch completes
fn narrate(manager: &DownloadManager) -> tokio::task::JoinHandle<()> {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::WorkerStarted { index }) => println!("[{}] started", index),
                Ok(Event::StageStarted { index, stage }) => println!("[{}] {}...", index, stage),
                Ok(Event::ItemComplete { index, path, .. }) => {
                    println!("[{}] done: {}", index, path.display())
                }
                Ok(Event::ItemFailed {
                    index,
                    stage,
                    error,
                    ..
                }) => println!("[{}] failed during {}: {}", index, stage, error),
                Ok(Event::BatchComplete { succeeded, failed }) => {
                    println!("{} succeeded, {} failed", succeeded, failed);
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Run one target; returns the report and whether the run was interrupted
async fn run(args: Args) -> Result<(DownloadReport, bool)> {
    let config = load_config(&args)?;

    if config.display.show_banner && !args.quiet {
        println!("{}", BANNER);
    }

    let (source, transcoder) = discover_tools(&config)?;
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        source,
        transcoder,
        Arc::new(StdioPrompter::new(args.quiet)),
    );
    let cancel_token = orchestrator.cancel_token();
    tokio::spawn(music_downloader::cancel_on_signal(cancel_token.clone()));

    let mut manager = match (&args.song, &args.album) {
        (Some(url), _) => orchestrator.prepare_song(url).await?,
        (None, Some(url)) => orchestrator.prepare_album(url).await?,
        (None, None) => return Err(Error::config("no download target given", "target")),
    };

    if args.debug {
        for entry in manager.view_queue() {
            println!(
                "{:>3}. {} -> {} (tags: {})",
                entry.index,
                entry.source_url,
                entry.destination_path.display(),
                if entry.has_tags { "yes" } else { "no" }
            );
        }
    }

    let narrator = (!args.quiet).then(|| narrate(&manager));
    let report = manager.download().await?;
    if let Some(handle) = narrator {
        handle.await.ok();
    }

    Ok((report, cancel_token.is_cancelled()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(args).await {
        Ok((report, cancelled)) => {
            for failure in report.failures() {
                tracing::warn!(index = failure.index, url = %failure.source_url, "item failed");
            }
            ExitCode::from(report.exit_code(cancelled) as u8)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
