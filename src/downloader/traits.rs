// Collaborator traits for the pipeline

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{ResolvedVideo, StreamDescriptor};

/// Looks up streams for videos and members of playlists
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Name of the resolver (for logging)
    fn name(&self) -> &'static str;

    /// Resolve a video URL or ID to its title and available streams
    async fn resolve(&self, identifier: &str) -> Result<ResolvedVideo, DownloadError>;

    /// List the video identifiers of a playlist, in playlist order
    async fn expand_playlist(&self, identifier: &str) -> Result<Vec<String>, DownloadError>;
}

/// Moves the bytes of one stream to local storage
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Download `stream` into `destination_dir`, named `filename` when given
    /// and `stream.default_filename` otherwise. Returns the written path.
    async fn download(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError>;
}

/// Combines a video-only file and an audio-only file into one container
#[async_trait]
pub trait MediaMuxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError>;
}
