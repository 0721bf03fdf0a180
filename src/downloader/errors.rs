// Error types for the download pipeline

use std::fmt;

use thiserror::Error;

/// Why an identifier could not be resolved to streams or playlist members
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionReason {
    /// Network timeout while talking to YouTube
    NetworkTimeout,
    /// Throttled or flagged as a bot (429 and friends)
    RateLimited,
    /// Deleted, removed or otherwise unavailable
    Unavailable,
    /// Private video or playlist
    Private,
    /// Needs a logged-in 18+ account
    AgeRestricted,
    /// Not available in this region
    GeoBlocked,
    Unknown,
}

impl fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkTimeout => write!(f, "network timeout"),
            Self::RateLimited => write!(f, "rate limited by YouTube"),
            Self::Unavailable => write!(f, "video unavailable"),
            Self::Private => write!(f, "private content"),
            Self::AgeRestricted => write!(f, "age restricted"),
            Self::GeoBlocked => write!(f, "not available in this region"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Identifier could not be resolved to streams or playlist members
    #[error("Could not resolve {target}: {reason} ({detail})")]
    Resolution {
        target: String,
        reason: ResolutionReason,
        detail: String,
    },

    /// No stream matches the selection criteria
    #[error("No suitable streams found for {title}: {reason}")]
    Selection { title: String, reason: String },

    /// All fetch attempts for one stream were exhausted
    #[error("Download of {stream} failed after {attempts} attempt(s)")]
    FetchFailed { stream: String, attempts: u32 },

    /// Muxed output missing or the muxer reported failure
    #[error("{title} could not be muxed: {reason}")]
    MuxFailed { title: String, reason: String },

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DownloadError {
    /// Build a resolution error, classifying the raw detail text
    pub fn resolution(target: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::Resolution {
            target: target.into(),
            reason: classify_reason(&detail),
            detail: first_meaningful_line(&detail),
        }
    }
}

// Convert raw yt-dlp stderr into a typed error
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        if s.contains("command not found") || s.contains("No such file or directory") {
            return Self::ToolNotFound(s);
        }

        if s.contains("Invalid URL") || s.contains("Unsupported URL") {
            return Self::InvalidUrl(first_meaningful_line(&s));
        }

        if s.contains("Invalid JSON") {
            return Self::ParseError(s);
        }

        let reason = classify_reason(&s);
        Self::Resolution {
            target: String::new(),
            reason,
            detail: first_meaningful_line(&s),
        }
    }
}

fn classify_reason(s: &str) -> ResolutionReason {
    let lower = s.to_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") {
        return ResolutionReason::NetworkTimeout;
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("not a bot") {
        return ResolutionReason::RateLimited;
    }

    if lower.contains("private video") || lower.contains("playlist is private") {
        return ResolutionReason::Private;
    }

    if lower.contains("sign in to confirm your age") || lower.contains("age-restricted") {
        return ResolutionReason::AgeRestricted;
    }

    if lower.contains("not available in your country") || lower.contains("geo restriction") {
        return ResolutionReason::GeoBlocked;
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("does not exist")
    {
        return ResolutionReason::Unavailable;
    }

    ResolutionReason::Unknown
}

/// yt-dlp prints the interesting part on its `ERROR:` line
fn first_meaningful_line(s: &str) -> String {
    s.lines()
        .find(|l| l.contains("ERROR"))
        .or_else(|| s.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_stderr() {
        let err = DownloadError::from(
            "WARNING: foo\nERROR: [youtube] abc: Private video. Sign in if you've been granted access"
                .to_string(),
        );
        match err {
            DownloadError::Resolution { reason, detail, .. } => {
                assert_eq!(reason, ResolutionReason::Private);
                assert!(detail.starts_with("ERROR"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolution_constructor_keeps_target() {
        let err = DownloadError::resolution("https://youtu.be/x", "ERROR: Video unavailable");
        assert!(err.to_string().contains("https://youtu.be/x"));
        assert!(err.to_string().contains("video unavailable"));
    }

    #[test]
    fn test_unsupported_url() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com".to_string());
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }
}
