// Retry fetcher - downloads one stream with a bounded, fixed-delay retry

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::errors::DownloadError;
use super::models::StreamDescriptor;
use super::traits::StreamTransport;
use super::utils::{remove_temp_file, replace_extension};

/// Retry behaviour of the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between two attempts; never applied after the last one
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Where and how a fetched stream should land
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTarget<'a> {
    /// Fixed file name, e.g. `temp_video.mp4`
    pub filename: Option<&'a str>,
    /// Extension swapped in after a successful download, e.g. `mp3`
    pub rename_to_ext: Option<&'a str>,
}

pub struct RetryFetcher {
    transport: Box<dyn StreamTransport>,
    policy: RetryPolicy,
}

impl RetryFetcher {
    pub fn new(transport: Box<dyn StreamTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Download `stream` into `destination_dir`, retrying on failure.
    ///
    /// A failed rename counts as a failed attempt. Partial output of a failed
    /// attempt is removed before the next one starts.
    pub async fn fetch(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
        target: FetchTarget<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let expected = destination_dir.join(target.filename.unwrap_or(&stream.default_filename));

        for attempt in 1..=max_attempts {
            match self.try_once(stream, destination_dir, target).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!("Error downloading {}: {}", stream.default_filename, e);
                    remove_temp_file(&expected).await;

                    if attempt < max_attempts {
                        info!(
                            attempt,
                            max = max_attempts,
                            "Retrying... ({}/{})",
                            attempt,
                            max_attempts
                        );
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        error!("Max retries reached. Download of {} failed.", stream.label());
        Err(DownloadError::FetchFailed {
            stream: stream.label(),
            attempts: max_attempts,
        })
    }

    async fn try_once(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
        target: FetchTarget<'_>,
    ) -> Result<PathBuf, DownloadError> {
        let path = self
            .transport
            .download(stream, destination_dir, target.filename)
            .await?;

        let Some(ext) = target.rename_to_ext else {
            return Ok(path);
        };

        let renamed = replace_extension(&path, ext);
        if let Err(e) = tokio::fs::rename(&path, &renamed).await {
            remove_temp_file(&path).await;
            return Err(e.into());
        }
        Ok(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Fails the first `failures` calls, then writes the file
    struct FlakyTransport {
        failures: u32,
        write_files: bool,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl FlakyTransport {
        fn new(failures: u32, write_files: bool) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    failures,
                    write_files,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl StreamTransport for FlakyTransport {
        async fn download(
            &self,
            stream: &StreamDescriptor,
            destination_dir: &Path,
            filename: Option<&str>,
        ) -> Result<PathBuf, DownloadError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len() as u32
            };
            let path = destination_dir.join(filename.unwrap_or(&stream.default_filename));
            if call <= self.failures {
                return Err(DownloadError::ExecutionError(format!("attempt {} failed", call)));
            }
            if self.write_files {
                tokio::fs::write(&path, b"media").await?;
            }
            Ok(path)
        }
    }

    fn stream() -> StreamDescriptor {
        StreamDescriptor {
            format_id: "251".to_string(),
            url: "https://example.com/251".to_string(),
            container: "webm".to_string(),
            resolution: None,
            abr_kbps: Some(160),
            nominal_abr_kbps: Some(160),
            total_bitrate_kbps: Some(160),
            only_audio: true,
            only_video: false,
            default_filename: "Song.webm".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_fetch_is_bounded() {
        let (transport, calls) = FlakyTransport::new(u32::MAX, false);
        let fetcher = RetryFetcher::new(Box::new(transport), RetryPolicy::default());

        let start = Instant::now();
        let result = fetcher
            .fetch(&stream(), Path::new("/nonexistent"), FetchTarget::default())
            .await;
        let finished = Instant::now();

        assert!(matches!(
            result,
            Err(DownloadError::FetchFailed { attempts: 3, .. })
        ));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(5));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(5));
        // No pause after the final attempt
        assert_eq!(finished - calls[2], Duration::ZERO);
        assert_eq!(finished - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let (transport, calls) = FlakyTransport::new(2, false);
        let fetcher = RetryFetcher::new(Box::new(transport), RetryPolicy::default());

        let path = fetcher
            .fetch(
                &stream(),
                Path::new("/out"),
                FetchTarget {
                    filename: Some("temp_audio.mp4"),
                    rename_to_ext: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("/out/temp_audio.mp4"));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rename_to_audio_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, _) = FlakyTransport::new(0, true);
        let fetcher = RetryFetcher::new(
            Box::new(transport),
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
        );

        let path = fetcher
            .fetch(
                &stream(),
                dir.path(),
                FetchTarget {
                    filename: None,
                    rename_to_ext: Some("mp3"),
                },
            )
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("Song.mp3"));
        assert!(path.exists());
        assert!(!dir.path().join("Song.webm").exists());
    }

    #[tokio::test]
    async fn test_rename_failure_counts_as_failed_attempt() {
        // Transport reports a path that was never written, so the rename fails
        let dir = tempfile::tempdir().unwrap();
        let (transport, calls) = FlakyTransport::new(0, false);
        let fetcher = RetryFetcher::new(
            Box::new(transport),
            RetryPolicy {
                max_attempts: 2,
                delay: Duration::ZERO,
            },
        );

        let result = fetcher
            .fetch(
                &stream(),
                dir.path(),
                FetchTarget {
                    filename: None,
                    rename_to_ext: Some("mp3"),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(DownloadError::FetchFailed { attempts: 2, .. })
        ));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
