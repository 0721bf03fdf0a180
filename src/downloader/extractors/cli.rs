// yt-dlp backed stream resolver
//
// Uses the native `yt-dlp` binary for both lookups:
// - videos: `--dump-json --no-playlist`, one JSON document with all formats
// - playlists: `--flat-playlist --dump-single-json`, entries without formats

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{NetworkConfig, ResolvedVideo, StreamDescriptor};
use crate::downloader::traits::StreamResolver;
use crate::downloader::utils::{
    get_proxy_args, get_timeout_args, run_output_with_timeout, sanitize_filename,
};

/// Upper bound for one yt-dlp invocation
const RESOLVE_TIMEOUT_SECS: u64 = 180;

/// Protocols a plain HTTP transport can fetch
const DIRECT_PROTOCOLS: [&str; 2] = ["https", "http"];

/// Advertised bitrate (kbps) of YouTube's audio-only formats
const AUDIO_ITAG_KBPS: [(&str, u32); 6] = [
    ("139", 48),
    ("140", 128),
    ("141", 256),
    ("249", 50),
    ("250", 70),
    ("251", 160),
];

/// CLI-based resolver using the yt-dlp binary
pub struct YtDlpResolver {
    ytdlp_path: String,
    network: NetworkConfig,
}

impl YtDlpResolver {
    pub fn new(ytdlp_path: impl Into<String>, network: NetworkConfig) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            network,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string()];
        args.extend(get_timeout_args(&self.network));
        args.extend(get_proxy_args(&self.network));
        args
    }

    fn video_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--no-playlist".to_string()];
        args.extend(self.base_args());
        args.push(url.to_string());
        args
    }

    fn playlist_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
        ];
        args.extend(self.base_args());
        args.push(url.to_string());
        args
    }

    async fn run(&self, target: &str, args: Vec<String>) -> Result<Vec<u8>, DownloadError> {
        debug!("[YtDlpResolver] {} {}", self.ytdlp_path, args.join(" "));

        let output = run_output_with_timeout(&self.ytdlp_path, args, RESOLVE_TIMEOUT_SECS)
            .await
            .map_err(|e| {
                if e.starts_with("Failed to start") {
                    DownloadError::ToolNotFound(e)
                } else {
                    DownloadError::resolution(target, e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[YtDlpResolver] yt-dlp failed for {}: {}", target, stderr.trim());
            return Err(DownloadError::resolution(target, stderr.to_string()));
        }

        Ok(output.stdout)
    }

    /// Parse `--dump-json` output of a single video
    fn parse_video(stdout: &[u8]) -> Result<ResolvedVideo, DownloadError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let title = json["title"].as_str().unwrap_or("Unknown").to_string();
        let streams = Self::parse_formats(&json, &title)?;

        Ok(ResolvedVideo {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            webpage_url: json["webpage_url"].as_str().unwrap_or("").to_string(),
            title,
            streams,
        })
    }

    fn parse_formats(
        json: &serde_json::Value,
        title: &str,
    ) -> Result<Vec<StreamDescriptor>, DownloadError> {
        let formats_array = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        let stem = sanitize_filename(title);
        let mut streams = Vec::new();

        for f in formats_array {
            let Some(url) = f["url"].as_str() else {
                continue;
            };
            if let Some(protocol) = f["protocol"].as_str() {
                if !DIRECT_PROTOCOLS.contains(&protocol) {
                    continue;
                }
            }

            let vcodec = f["vcodec"].as_str();
            let acodec = f["acodec"].as_str();
            let only_video = vcodec.map_or(false, |v| v != "none")
                && acodec.map_or(true, |a| a == "none");
            let only_audio = acodec.map_or(false, |a| a != "none")
                && vcodec.map_or(true, |v| v == "none");

            let container = container_of(f["ext"].as_str().unwrap_or(""));
            let format_id = f["format_id"].as_str().unwrap_or("");
            let abr_kbps = f["abr"].as_f64().map(|a| a.round() as u32);

            streams.push(StreamDescriptor {
                format_id: format_id.to_string(),
                url: url.to_string(),
                resolution: f["height"].as_u64().map(|h| h as u32),
                abr_kbps,
                nominal_abr_kbps: if only_audio {
                    advertised_kbps(format_id)
                } else {
                    None
                },
                total_bitrate_kbps: f["tbr"].as_f64().map(|t| t.round() as u32),
                only_audio,
                only_video,
                default_filename: format!("{}.{}", stem, container),
                container,
            });
        }

        Ok(streams)
    }

    /// Parse `--flat-playlist --dump-single-json` output into watch URLs
    fn parse_playlist(stdout: &[u8]) -> Result<Vec<String>, DownloadError> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let entries = json["entries"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No entries array in JSON".to_string()))?;

        Ok(entries
            .iter()
            .filter_map(|entry| match entry["url"].as_str() {
                Some(url) if url.starts_with("http") => Some(url.to_string()),
                _ => entry["id"]
                    .as_str()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id)),
            })
            .collect())
    }
}

/// yt-dlp names the extension; `m4a` is an mp4 container holding audio
fn container_of(ext: &str) -> String {
    match ext {
        "m4a" => "mp4".to_string(),
        other => other.to_string(),
    }
}

/// Known itags first; `251-drc` and friends share the base format's rate
fn advertised_kbps(format_id: &str) -> Option<u32> {
    let itag = format_id.split('-').next().unwrap_or(format_id);
    AUDIO_ITAG_KBPS
        .iter()
        .find(|(id, _)| *id == itag)
        .map(|(_, kbps)| *kbps)
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn resolve(&self, identifier: &str) -> Result<ResolvedVideo, DownloadError> {
        let stdout = self.run(identifier, self.video_args(identifier)).await?;
        let video = Self::parse_video(&stdout)?;
        debug!(
            "[YtDlpResolver] {} -> '{}' with {} streams",
            identifier,
            video.title,
            video.streams.len()
        );
        Ok(video)
    }

    async fn expand_playlist(&self, identifier: &str) -> Result<Vec<String>, DownloadError> {
        let stdout = self.run(identifier, self.playlist_args(identifier)).await?;
        let urls = Self::parse_playlist(&stdout)?;
        info!("Playlist {} contains {} videos", identifier, urls.len());
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "id": "9bZkp7q19f0",
        "title": "PSY - GANGNAM STYLE(강남스타일) M/V",
        "webpage_url": "https://www.youtube.com/watch?v=9bZkp7q19f0",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "protocol": "mhtml", "url": "https://i.ytimg.com/sb/x", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "protocol": "https", "url": "https://rr1.googlevideo.com/140", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.472, "tbr": 129.472},
            {"format_id": "251", "ext": "webm", "protocol": "https", "url": "https://rr1.googlevideo.com/251", "vcodec": "none", "acodec": "opus", "abr": 135.9},
            {"format_id": "18", "ext": "mp4", "protocol": "https", "url": "https://rr1.googlevideo.com/18", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "tbr": 500.1},
            {"format_id": "137", "ext": "mp4", "protocol": "https", "url": "https://rr1.googlevideo.com/137", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "tbr": 4400.5},
            {"format_id": "96", "ext": "mp4", "protocol": "m3u8_native", "url": "https://manifest.googlevideo.com/96", "vcodec": "avc1.640028", "acodec": "mp4a.40.2", "height": 1080}
        ]
    }"#;

    #[test]
    fn test_parse_video_formats() {
        let video = YtDlpResolver::parse_video(VIDEO_JSON.as_bytes()).unwrap();
        assert_eq!(video.id, "9bZkp7q19f0");
        assert_eq!(video.streams.len(), 4);

        let audio = &video.streams[0];
        assert_eq!(audio.format_id, "140");
        assert!(audio.only_audio && !audio.only_video);
        assert_eq!(audio.abr_kbps, Some(129));
        assert_eq!(audio.nominal_abr_kbps, Some(128));
        assert_eq!(audio.container, "mp4");
        assert_eq!(audio.default_filename, "PSY - GANGNAM STYLE(강남스타일) MV.mp4");

        let opus = &video.streams[1];
        assert_eq!(opus.abr_kbps, Some(136));
        assert_eq!(opus.nominal_abr_kbps, Some(160));
        assert_eq!(opus.container, "webm");

        let progressive = &video.streams[2];
        assert!(progressive.is_progressive());

        let dash_video = &video.streams[3];
        assert!(dash_video.only_video);
        assert_eq!(dash_video.resolution, Some(1080));
        assert_eq!(dash_video.container, "mp4");
    }

    #[test]
    fn test_parsed_formats_are_selectable() {
        use crate::downloader::format_selector::{
            BitrateTier, FormatSelector, SelectionPolicy, StreamSelection,
        };
        use crate::downloader::models::OutputKind;

        let video = YtDlpResolver::parse_video(VIDEO_JSON.as_bytes()).unwrap();

        let combined = SelectionPolicy::for_output(OutputKind::CombinedVideo, BitrateTier::default());
        match FormatSelector::select(&video.streams, combined).unwrap() {
            StreamSelection::Combined { video, audio } => {
                assert_eq!(video.format_id, "137");
                assert_eq!(audio.format_id, "140");
            }
            other => panic!("unexpected selection: {other:?}"),
        }

        let audio_only = SelectionPolicy::for_output(OutputKind::AudioOnly, BitrateTier::default());
        match FormatSelector::select(&video.streams, audio_only).unwrap() {
            StreamSelection::AudioOnly { audio } => {
                assert_eq!(audio.format_id, "251");
                assert_eq!(audio.default_filename, "PSY - GANGNAM STYLE(강남스타일) MV.webm");
            }
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn test_advertised_bitrate_lookup() {
        assert_eq!(advertised_kbps("251"), Some(160));
        assert_eq!(advertised_kbps("251-drc"), Some(160));
        assert_eq!(advertised_kbps("140"), Some(128));
        assert_eq!(advertised_kbps("599"), None);
    }

    #[test]
    fn test_parse_video_without_formats() {
        let err = YtDlpResolver::parse_video(br#"{"id": "x", "title": "t"}"#).unwrap_err();
        assert!(matches!(err, DownloadError::ParseError(_)));
    }

    #[test]
    fn test_parse_playlist_preserves_order() {
        let json = r#"{
            "title": "Mix",
            "entries": [
                {"id": "AAA", "url": "https://www.youtube.com/watch?v=AAA"},
                {"id": "BBB", "url": "BBB"},
                {"id": "CCC"}
            ]
        }"#;
        let urls = YtDlpResolver::parse_playlist(json.as_bytes()).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=AAA",
                "https://www.youtube.com/watch?v=BBB",
                "https://www.youtube.com/watch?v=CCC",
            ]
        );
    }

    #[test]
    fn test_args_include_network_options() {
        let resolver = YtDlpResolver::new(
            "yt-dlp",
            NetworkConfig {
                proxy: Some("socks5://127.0.0.1:1080".to_string()),
                timeout: Some(20),
            },
        );
        let args = resolver.video_args("https://youtu.be/x");
        assert_eq!(args[0], "--dump-json");
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "20"]));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));

        let args = resolver.playlist_args("https://www.youtube.com/playlist?list=PL1");
        assert!(args.contains(&"--flat-playlist".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp", NetworkConfig::default());
        let err = resolver.resolve("https://youtu.be/x").await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
