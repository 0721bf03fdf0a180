// Pipeline orchestrator
//
// Per video: resolve -> select -> fetch video -> fetch audio -> mux -> cleanup.
// Audio-only jobs take a single fetch straight to done. Every failure is
// caught at the video boundary, logged and recorded; the run always moves on
// to the next identifier.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::errors::DownloadError;
use super::fetcher::{FetchTarget, RetryFetcher};
use super::format_selector::{FormatSelector, SelectionPolicy, StreamSelection};
use super::models::{
    DownloadJob, PlaylistFailure, RunSummary, StreamDescriptor, VideoOutcome, VideoState,
};
use super::traits::{MediaMuxer, StreamResolver, StreamTransport};
use super::utils::{is_playlist_url, remove_temp_file};
use crate::config::JobConfig;

/// State of the video currently going through the pipeline
struct VideoRun<'a> {
    source_url: &'a str,
    title: Option<String>,
    state: VideoState,
}

impl<'a> VideoRun<'a> {
    fn new(source_url: &'a str) -> Self {
        Self {
            source_url,
            title: None,
            state: VideoState::Resolving,
        }
    }

    fn advance(&mut self, next: VideoState) {
        debug!(url = self.source_url, "{} -> {}", self.state, next);
        self.state = next;
    }

    fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(self.source_url)
    }
}

pub struct BatchDownloader {
    config: JobConfig,
    resolver: Box<dyn StreamResolver>,
    fetcher: RetryFetcher,
    muxer: Box<dyn MediaMuxer>,
}

impl BatchDownloader {
    pub fn new(
        config: JobConfig,
        resolver: Box<dyn StreamResolver>,
        transport: Box<dyn StreamTransport>,
        muxer: Box<dyn MediaMuxer>,
    ) -> Self {
        let fetcher = RetryFetcher::new(transport, config.retry);
        Self {
            config,
            resolver,
            fetcher,
            muxer,
        }
    }

    /// Process every configured URL in order.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        info!(
            "Starting {} item(s) as {} into {} (resolver: {})",
            self.config.urls.len(),
            self.config.file_type,
            self.config.output_dir.display(),
            self.resolver.name()
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            error!(
                "Cannot create output directory {}: {}",
                self.config.output_dir.display(),
                e
            );
        }

        for url in &self.config.urls {
            if is_playlist_url(url) {
                self.download_playlist(url, &mut summary).await;
            } else {
                summary.outcomes.push(self.download_video(url).await);
            }
        }

        info!("All downloads completed.");
        summary
    }

    /// Expand a playlist eagerly, then run each member in playlist order
    async fn download_playlist(&self, playlist_url: &str, summary: &mut RunSummary) {
        info!("Expanding playlist {}", playlist_url);

        let video_urls = match self.resolver.expand_playlist(playlist_url).await {
            Ok(urls) => urls,
            Err(e) => {
                error!("Error downloading playlist {}: {}", playlist_url, e);
                summary.playlist_failures.push(PlaylistFailure {
                    playlist_url: playlist_url.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        for video_url in &video_urls {
            summary.outcomes.push(self.download_video(video_url).await);
        }
    }

    /// Run one video to a terminal state
    pub async fn download_video(&self, url: &str) -> VideoOutcome {
        info!(url, "Processing {}", url);
        let mut run = VideoRun::new(url);

        match self.process(&mut run).await {
            Ok(output) => {
                let title = run.title.clone().unwrap_or_else(|| url.to_string());
                info!("{} has been successfully downloaded.", title);
                VideoOutcome::Succeeded {
                    source_url: url.to_string(),
                    title,
                    output,
                }
            }
            Err(e) => {
                let failed_in = run.state;
                error!(
                    url,
                    state = %failed_in,
                    "ERROR: {} could not be downloaded: {}",
                    run.display_name(),
                    e
                );
                run.advance(VideoState::Failed);
                VideoOutcome::Failed {
                    source_url: url.to_string(),
                    title: run.title,
                    state: failed_in,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn process(&self, run: &mut VideoRun<'_>) -> Result<PathBuf, DownloadError> {
        let video = self.resolver.resolve(run.source_url).await?;
        run.title = Some(video.title.clone());
        run.advance(VideoState::Selecting);

        let policy = SelectionPolicy::for_output(self.config.file_type, self.config.audio_tier);
        let selection = FormatSelector::select(&video.streams, policy).map_err(|miss| {
            DownloadError::Selection {
                title: video.title.clone(),
                reason: miss.to_string(),
            }
        })?;

        let mut job = DownloadJob {
            source_url: run.source_url.to_string(),
            video_id: video.id,
            title: video.title,
            video_stream: None,
            audio_stream: None,
            output_dir: self.config.output_dir.clone(),
            output_kind: self.config.file_type,
        };

        match selection {
            StreamSelection::AudioOnly { audio } => {
                job.audio_stream = Some(audio);
                self.fetch_audio_only(&job, run).await
            }
            StreamSelection::Combined { video, audio } => {
                job.video_stream = Some(video);
                job.audio_stream = Some(audio);
                self.fetch_and_mux(&job, run).await
            }
        }
    }

    async fn fetch_audio_only(
        &self,
        job: &DownloadJob,
        run: &mut VideoRun<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let audio = Self::selected(&job.audio_stream)?;
        run.advance(VideoState::FetchingAudio);

        let path = self
            .fetcher
            .fetch(
                audio,
                &job.output_dir,
                FetchTarget {
                    filename: None,
                    rename_to_ext: Some(job.output_kind.extension()),
                },
            )
            .await?;

        run.advance(VideoState::Done);
        Ok(path)
    }

    async fn fetch_and_mux(
        &self,
        job: &DownloadJob,
        run: &mut VideoRun<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let video = Self::selected(&job.video_stream)?;
        let audio = Self::selected(&job.audio_stream)?;
        let video_name = format!("temp_video.{}", video.container);
        let audio_name = format!("temp_audio.{}", audio.container);

        run.advance(VideoState::FetchingVideo);
        let video_file = self
            .fetcher
            .fetch(video, &job.output_dir, Self::temp_target(&video_name))
            .await?;

        run.advance(VideoState::FetchingAudio);
        let audio_file = match self
            .fetcher
            .fetch(audio, &job.output_dir, Self::temp_target(&audio_name))
            .await
        {
            Ok(path) => path,
            Err(e) => {
                remove_temp_file(&video_file).await;
                return Err(e);
            }
        };

        run.advance(VideoState::Muxing);
        let output =
            job.muxed_output_path_avoiding(&[video_file.as_path(), audio_file.as_path()]);
        let muxed = self.muxer.mux(&video_file, &audio_file, &output).await;

        remove_temp_file(&video_file).await;
        remove_temp_file(&audio_file).await;
        muxed?;

        if !Self::exists(&output).await {
            return Err(DownloadError::MuxFailed {
                title: job.title.clone(),
                reason: "output file missing after muxing".to_string(),
            });
        }

        run.advance(VideoState::Done);
        Ok(output)
    }

    fn temp_target(name: &str) -> FetchTarget<'_> {
        FetchTarget {
            filename: Some(name),
            rename_to_ext: None,
        }
    }

    fn selected(stream: &Option<StreamDescriptor>) -> Result<&StreamDescriptor, DownloadError> {
        stream
            .as_ref()
            .ok_or_else(|| DownloadError::ExecutionError("job has no selected stream".to_string()))
    }

    async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}
