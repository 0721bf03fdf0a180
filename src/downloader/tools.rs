use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::errors::DownloadError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

/// Explicit binary locations; `None` means look on PATH
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

impl ToolPaths {
    fn get(&self, tool_type: ToolType) -> Option<&Path> {
        match tool_type {
            ToolType::YtDlp => self.ytdlp.as_deref(),
            ToolType::Ffmpeg => self.ffmpeg.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    paths: ToolPaths,
}

impl ToolManager {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.detect_tool(tool_type);
        let version = path.as_deref().and_then(|p| self.get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    /// Path of a tool the run cannot do without
    pub fn require(&self, tool_type: ToolType) -> Result<String, DownloadError> {
        let info = self.get_tool_info(tool_type);
        match info.path {
            Some(path) => {
                info!(
                    "Using {} {} ({})",
                    info.name,
                    info.version.as_deref().unwrap_or("unknown version"),
                    path
                );
                Ok(path)
            }
            None => Err(DownloadError::ToolNotFound(format!(
                "{} is not installed or not on PATH",
                info.name
            ))),
        }
    }

    fn detect_tool(&self, tool_type: ToolType) -> Option<String> {
        // 1. Explicit override
        if let Some(path) = self.paths.get(tool_type) {
            return path
                .is_file()
                .then(|| path.to_string_lossy().to_string());
        }

        // 2. PATH lookup
        match which::which(tool_type.as_str()) {
            Ok(path) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                debug!("{} not found on PATH: {}", tool_type.as_str(), e);
                None
            }
        }
    }

    fn get_version(&self, path: &str, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                // ffmpeg prints a whole banner; the first line carries the version
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_override_is_unavailable() {
        let manager = ToolManager::new(ToolPaths {
            ytdlp: Some(PathBuf::from("/nonexistent/yt-dlp")),
            ffmpeg: None,
        });
        let info = manager.get_tool_info(ToolType::YtDlp);
        assert!(!info.is_available);
        assert!(info.version.is_none());

        let err = manager.require(ToolType::YtDlp).unwrap_err();
        assert!(err.to_string().contains("yt-dlp"));
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(ToolType::YtDlp.as_str(), "yt-dlp");
        assert_eq!(ToolType::Ffmpeg.as_str(), "ffmpeg");
        assert_eq!(ToolType::Ffmpeg.version_arg(), "-version");
    }
}
