pub mod cli;
pub mod config;
pub mod downloader;

use tracing::{info, Level};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Args;
use downloader::backends::HttpTransport;
use downloader::extractors::YtDlpResolver;
use downloader::muxer::FfmpegMuxer;
use downloader::tools::{ToolManager, ToolType};
use downloader::{BatchDownloader, DownloadError, OutputKind, RunSummary};

/// Set up the tracing subscriber; `RUST_LOG` applies unless -v or -q is given
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}

/// Run a whole batch.
///
/// Only setup problems (bad config, missing yt-dlp or ffmpeg) are returned as
/// errors; per-video and per-playlist failures end up in the summary.
pub async fn run(args: Args) -> Result<RunSummary, DownloadError> {
    let config = args.into_config()?;
    let tools = ToolManager::new(config.tools.clone());

    let ytdlp = tools.require(ToolType::YtDlp)?;
    let muxer = match config.file_type {
        OutputKind::CombinedVideo => FfmpegMuxer::new(tools.require(ToolType::Ffmpeg)?),
        OutputKind::AudioOnly => FfmpegMuxer::default(),
    };

    let resolver = YtDlpResolver::new(ytdlp, config.network.clone());
    let transport = HttpTransport::new(&config.network)?;

    let downloader = BatchDownloader::new(
        config,
        Box::new(resolver),
        Box::new(transport),
        Box::new(muxer),
    );
    let summary = downloader.run().await;

    info!(
        "{} succeeded, {} failed, {} playlist(s) could not be expanded",
        summary.succeeded(),
        summary.failed(),
        summary.playlist_failures.len()
    );
    Ok(summary)
}
