//! Fetching remote coverages into local files.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::config::HttpConfig;
use crate::error::{Result, StorageError};

/// Source of coverage bytes.
#[async_trait]
pub trait CoverageFetcher: Send + Sync {
    /// Write the resource at `url` to `destination`, returning the number of
    /// bytes written.
    async fn fetch_to(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Streams HTTP responses to disk.
#[derive(Debug, Clone)]
pub struct HttpCoverageFetcher {
    client: Client,
}

impl HttpCoverageFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
        })
    }

    /// Reuse an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoverageFetcher for HttpCoverageFetcher {
    #[instrument(skip(self, destination), fields(url = %url))]
    async fn fetch_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::from_reqwest(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        debug!(bytes = written, path = %destination.display(), "Fetched coverage");
        Ok(written)
    }
}
