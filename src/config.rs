//! Job configuration: defaults, TOML job files and URL lists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::downloader::fetcher::RetryPolicy;
use crate::downloader::format_selector::BitrateTier;
use crate::downloader::tools::ToolPaths;
use crate::downloader::{DownloadError, NetworkConfig, OutputKind};

/// Everything a run needs, passed explicitly into the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Video and playlist URLs, processed in this order
    pub urls: Vec<String>,
    pub output_dir: PathBuf,
    pub file_type: OutputKind,
    pub retry: RetryPolicy,
    #[serde(rename = "audio_bitrate_kbps")]
    pub audio_tier: BitrateTier,
    pub network: NetworkConfig,
    pub tools: ToolPaths,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            file_type: OutputKind::default(),
            retry: RetryPolicy::default(),
            audio_tier: BitrateTier::default(),
            network: NetworkConfig::default(),
            tools: ToolPaths::default(),
        }
    }
}

impl JobConfig {
    /// Load a TOML job file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, DownloadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DownloadError::Config(format!("Cannot read job file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| DownloadError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.urls.is_empty() {
            return Err(DownloadError::Config(
                "No URLs given; pass them as arguments, with --urls-file or in the job file"
                    .to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(DownloadError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.audio_tier.nominal_kbps == 0 {
            return Err(DownloadError::Config(
                "audio bitrate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a URL list: one URL per line, blank lines and `#` comments skipped
pub fn read_url_list(path: &Path) -> Result<Vec<String>, DownloadError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DownloadError::Config(format!("Cannot read URL list {}: {}", path.display(), e))
    })?;
    Ok(parse_url_list(&content))
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}
