// Helper functions shared by the resolver, fetcher and muxer

use crate::downloader::models::NetworkConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::{debug, warn};

lazy_static::lazy_static! {
    static ref UNSAFE_CHARS_RE: Regex = Regex::new(r#"[\\/:*?"<>|\x00-\x1f\x7f]"#).unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const MAX_FILENAME_BYTES: usize = 255;

/// Run command with timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("{} timed out after {}s", program, timeout_secs))
        }
    }
}

/// Whether an identifier names a playlist rather than a single video
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("playlist?list=")
}

/// Make a video title safe to use as a file name
pub fn sanitize_filename(title: &str) -> String {
    let cleaned = UNSAFE_CHARS_RE.replace_all(title, "");
    let collapsed = WHITESPACE_RE.replace_all(cleaned.trim(), " ");
    let mut name = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string();

    if name.len() > MAX_FILENAME_BYTES {
        let mut cut = MAX_FILENAME_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }

    if name.is_empty() {
        "video".to_string()
    } else {
        name
    }
}

/// Swap the extension component of `path`, keeping the stem and directory
pub fn replace_extension(path: &Path, ext: &str) -> PathBuf {
    path.with_extension(ext.trim_start_matches('.'))
}

/// Best-effort removal of an intermediate file
pub async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary file"),
    }
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}
