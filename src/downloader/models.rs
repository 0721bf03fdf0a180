// Common data models for the download pipeline

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Desired output of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputKind {
    /// Best video-only stream muxed with an audio-only stream
    #[default]
    #[serde(rename = "mp4", alias = "video")]
    CombinedVideo,
    /// Single audio stream renamed to the audio extension
    #[serde(rename = "mp3", alias = "audio")]
    AudioOnly,
}

impl OutputKind {
    /// Container the streams are selected from
    pub fn container(&self) -> &'static str {
        "mp4"
    }

    /// Extension of the final file
    pub fn extension(&self) -> &'static str {
        match self {
            Self::CombinedVideo => "mp4",
            Self::AudioOnly => "mp3",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" | "video" => Ok(Self::CombinedVideo),
            "mp3" | "audio" => Ok(Self::AudioOnly),
            other => Err(format!("Unsupported file type: {}", other)),
        }
    }
}

/// One downloadable encoding of a video
///
/// Supplied by the resolver and never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Format ID (e.g. "137", "140")
    pub format_id: String,
    /// Direct media URL
    pub url: String,
    /// Container extension (mp4, webm, m4a)
    pub container: String,
    /// Vertical resolution in pixels
    pub resolution: Option<u32>,
    /// Measured audio bitrate in kbps
    pub abr_kbps: Option<u32>,
    /// Advertised audio bitrate of the format, in kbps
    pub nominal_abr_kbps: Option<u32>,
    /// Total bitrate in kbps
    pub total_bitrate_kbps: Option<u32>,
    pub only_audio: bool,
    pub only_video: bool,
    /// `<title>.<container>`, already safe for the filesystem
    pub default_filename: String,
}

impl StreamDescriptor {
    /// Whether this stream carries both audio and video
    pub fn is_progressive(&self) -> bool {
        !self.only_audio && !self.only_video
    }

    /// Bitrate used for tier matching: the advertised one when known
    pub fn tier_kbps(&self) -> Option<u32> {
        self.nominal_abr_kbps.or(self.abr_kbps)
    }

    /// Short label used in log lines
    pub fn label(&self) -> String {
        match (self.resolution, self.abr_kbps) {
            (Some(h), _) => format!("{} ({}p {})", self.default_filename, h, self.container),
            (None, Some(abr)) => {
                format!("{} ({}kbps {})", self.default_filename, abr, self.container)
            }
            (None, None) => self.default_filename.clone(),
        }
    }
}

/// A video identifier resolved to its streams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedVideo {
    pub id: String,
    pub title: String,
    pub webpage_url: String,
    pub streams: Vec<StreamDescriptor>,
}

/// Per-video unit of work, discarded after the video reaches a terminal state
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub source_url: String,
    pub video_id: String,
    pub title: String,
    pub video_stream: Option<StreamDescriptor>,
    pub audio_stream: Option<StreamDescriptor>,
    pub output_dir: PathBuf,
    pub output_kind: OutputKind,
}

impl DownloadJob {
    /// Final output path for combined mode: `<title>.<container>`
    pub fn muxed_output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            crate::downloader::utils::sanitize_filename(&self.title),
            self.output_kind.extension()
        ))
    }

    /// Like `muxed_output_path`, suffixed with ` (n)` while it names one of `taken`
    pub fn muxed_output_path_avoiding(&self, taken: &[&Path]) -> PathBuf {
        let stem = crate::downloader::utils::sanitize_filename(&self.title);
        let mut output = self.muxed_output_path();
        let mut n = 1;
        while taken.contains(&output.as_path()) {
            output = self.output_dir.join(format!(
                "{} ({}).{}",
                stem,
                n,
                self.output_kind.extension()
            ));
            n += 1;
        }
        output
    }
}

/// Pipeline state of a single video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoState {
    Resolving,
    Selecting,
    FetchingVideo,
    FetchingAudio,
    Muxing,
    Done,
    Failed,
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolving => "resolving",
            Self::Selecting => "selecting",
            Self::FetchingVideo => "fetching video",
            Self::FetchingAudio => "fetching audio",
            Self::Muxing => "muxing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Succeeded {
        source_url: String,
        title: String,
        output: PathBuf,
    },
    Failed {
        source_url: String,
        title: Option<String>,
        /// State the video was in when it failed
        state: VideoState,
        message: String,
    },
}

impl VideoOutcome {
    pub fn source_url(&self) -> &str {
        match self {
            Self::Succeeded { source_url, .. } | Self::Failed { source_url, .. } => source_url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// A playlist that could not be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistFailure {
    pub playlist_url: String,
    pub message: String,
}

/// Everything that happened during one run, in processing order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<VideoOutcome>,
    pub playlist_failures: Vec<PlaylistFailure>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Network configuration for the resolver and the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}
