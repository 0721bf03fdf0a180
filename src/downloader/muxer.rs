// ffmpeg muxer - joins a video-only and an audio-only file
//
// ffmpeg writes machine-readable progress (`-progress pipe:2`) on stderr.
// Lines are read incrementally until the process exits; progress markers
// go to the log, the rest is kept only to explain a failure.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

use super::errors::DownloadError;
use super::traits::MediaMuxer;

const PROGRESS_MARKER: &str = "progress=";
const TAIL_LINES: usize = 5;

/// Lazy, finite sequence of diagnostic lines from a running process
pub struct DiagnosticLines<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next line, or `None` once the stream is closed or unreadable
    pub async fn next_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "Stopped reading diagnostic stream");
                None
            }
        }
    }
}

/// Progress block emitted by `ffmpeg -progress`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ProgressTracker {
    out_time: Option<String>,
}

impl ProgressTracker {
    /// Feed one line; returns true when the line is a progress marker
    fn observe(&mut self, line: &str) -> bool {
        if let Some(time) = line.strip_prefix("out_time=") {
            self.out_time = Some(time.to_string());
        }
        line.contains(PROGRESS_MARKER)
    }
}

pub struct FfmpegMuxer {
    ffmpeg_path: String,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Copy video, encode audio to AAC, always overwrite, report progress on stderr
    fn build_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            "info".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-strict".to_string(),
            "experimental".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl MediaMuxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let title = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let args = Self::build_args(video, audio, output);
        debug!("[Muxer] {} {}", self.ffmpeg_path, args.join(" "));

        let mut child = TokioCommand::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DownloadError::ToolNotFound(format!("{}: {}", self.ffmpeg_path, e))
                }
                _ => DownloadError::ExecutionError(format!("Failed to start ffmpeg: {}", e)),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            DownloadError::ExecutionError("Failed to capture ffmpeg stderr".to_string())
        })?;

        let mut lines = DiagnosticLines::new(stderr);
        let mut tracker = ProgressTracker::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        while let Some(line) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if tracker.observe(&line) {
                info!(out_time = tracker.out_time.as_deref().unwrap_or("?"), "{}", line);
            } else if !line.contains('=') || line.starts_with('[') {
                debug!("[ffmpeg] {}", line);
                if tail.len() == TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("ffmpeg wait failed: {}", e)))?;
        let exists = tokio::fs::try_exists(output).await.unwrap_or(false);

        if status.success() && exists {
            return Ok(());
        }

        let reason = if !exists {
            format!("output file missing after ffmpeg exited ({})", status)
        } else {
            format!("ffmpeg exited with {}", status)
        };
        let detail = tail.into_iter().collect::<Vec<_>>().join(" | ");
        Err(DownloadError::MuxFailed {
            title,
            reason: if detail.is_empty() {
                reason
            } else {
                format!("{}: {}", reason, detail)
            },
        })
    }
}
