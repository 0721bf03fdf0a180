use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{NetworkConfig, StreamDescriptor};
use crate::downloader::traits::StreamTransport;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Plain HTTP(S) download of a resolved stream URL
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

        if let Some(secs) = config.timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs as u64));
        }

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::Config(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn download(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let path = destination_dir.join(filename.unwrap_or(&stream.default_filename));
        debug!("[HttpTransport] {} -> {}", stream.format_id, path.display());

        let mut response = self
            .client
            .get(&stream.url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(&path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("[HttpTransport] wrote {} bytes to {}", written, path.display());
        Ok(path)
    }
}
