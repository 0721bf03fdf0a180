//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{read_url_list, JobConfig};
use crate::downloader::format_selector::BitrateTier;
use crate::downloader::{DownloadError, OutputKind};

#[derive(Parser, Debug)]
#[command(
    name = "youtube-batch-downloader",
    version,
    about = "Download YouTube videos and playlists, muxing separate video and audio tracks with ffmpeg"
)]
pub struct Args {
    /// Video or playlist URLs, processed in the given order
    pub urls: Vec<String>,

    /// File with one URL per line (appended after positional URLs)
    #[arg(short = 'f', long)]
    pub urls_file: Option<PathBuf>,

    /// TOML job file
    #[arg(short, long, env = "YTBD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Output type: mp4 (video + audio) or mp3 (audio only)
    #[arg(short = 't', long)]
    pub file_type: Option<OutputKind>,

    /// Download attempts per stream
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Audio bitrate tier for mp3 output, in kbps
    #[arg(long)]
    pub audio_bitrate: Option<u32>,

    /// Proxy URL (e.g. socks5h://127.0.0.1:1080)
    #[arg(long, env = "YTBD_PROXY")]
    pub proxy: Option<String>,

    /// Network timeout in seconds
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Path to the yt-dlp binary
    #[arg(long)]
    pub yt_dlp: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Merge defaults, the job file and command-line flags, in that order
    pub fn into_config(self) -> Result<JobConfig, DownloadError> {
        let mut config = match &self.config {
            Some(path) => JobConfig::load(path)?,
            None => JobConfig::default(),
        };

        config.urls.extend(self.urls);
        if let Some(path) = &self.urls_file {
            config.urls.extend(read_url_list(path)?);
        }

        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(kind) = self.file_type {
            config.file_type = kind;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(secs) = self.retry_delay {
            config.retry.delay = Duration::from_secs(secs);
        }
        if let Some(kbps) = self.audio_bitrate {
            config.audio_tier = BitrateTier::new(kbps);
        }
        if self.proxy.is_some() {
            config.network.proxy = self.proxy;
        }
        if self.timeout.is_some() {
            config.network.timeout = self.timeout;
        }
        if self.yt_dlp.is_some() {
            config.tools.ytdlp = self.yt_dlp;
        }
        if self.ffmpeg.is_some() {
            config.tools.ffmpeg = self.ffmpeg;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_override_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = dir.path().join("job.toml");
        std::fs::write(
            &job,
            "urls = [\"https://youtu.be/a\"]\nfile_type = \"mp3\"\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "https://youtu.be/c\n").unwrap();

        let args = Args::try_parse_from([
            "youtube-batch-downloader",
            "--config",
            job.to_str().unwrap(),
            "-f",
            list.to_str().unwrap(),
            "-t",
            "mp4",
            "--retry-delay",
            "0",
            "-o",
            "/tmp/videos",
            "https://youtu.be/b",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(
            config.urls,
            vec!["https://youtu.be/a", "https://youtu.be/b", "https://youtu.be/c"]
        );
        assert_eq!(config.file_type, OutputKind::CombinedVideo);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::ZERO);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/videos"));
    }

    #[test]
    fn test_rejects_unknown_file_type() {
        let parsed = Args::try_parse_from(["youtube-batch-downloader", "-t", "flac", "https://youtu.be/a"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_requires_urls() {
        let args = Args::try_parse_from(["youtube-batch-downloader"]).unwrap();
        assert!(matches!(args.into_config(), Err(DownloadError::Config(_))));
    }
}
