//! Reading item assets into coverages.

use std::path::PathBuf;

use async_trait::async_trait;
use coverage_processor::{read_geotiff, read_geotiff_from_buffer, Coverage};
use tracing::{debug, instrument};

use crate::error::{Result, StacError};

/// Loads the raster behind an asset `href`.
#[async_trait]
pub trait AssetReader: Send + Sync {
    async fn read(&self, href: &str) -> Result<Coverage>;
}

/// Reads `http(s)://` hrefs over the network and anything else from disk.
#[derive(Debug, Clone)]
pub struct HttpAssetReader {
    client: reqwest::Client,
}

impl HttpAssetReader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetReader for HttpAssetReader {
    #[instrument(skip(self), fields(href = %href))]
    async fn read(&self, href: &str) -> Result<Coverage> {
        if href.starts_with("http://") || href.starts_with("https://") {
            let response = self
                .client
                .get(href)
                .send()
                .await
                .map_err(|e| StacError::from_reqwest("asset", href, e))?;
            if !response.status().is_success() {
                return Err(StacError::access("asset", href));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| StacError::from_reqwest("asset", href, e))?;
            debug!(bytes = bytes.len(), "Downloaded asset");

            tokio::task::spawn_blocking(move || read_geotiff_from_buffer(&bytes))
                .await
                .map_err(|e| StacError::invalid_data(format!("asset decode task failed: {}", e)))?
                .map_err(StacError::from)
        } else {
            let path = PathBuf::from(href.strip_prefix("file://").unwrap_or(href));
            tokio::task::spawn_blocking(move || read_geotiff(path))
                .await
                .map_err(|e| StacError::invalid_data(format!("asset decode task failed: {}", e)))?
                .map_err(StacError::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use test_utils::{geotiff_bytes, temp_geotiff};

    const EXTENT: (f64, f64, f64, f64) = (0.0, 0.0, 2.0, 2.0);

    #[tokio::test]
    async fn test_read_local_file() {
        let (_dir, path) = temp_geotiff(2, 2, EXTENT, 4326, &[1.0, 2.0, 3.0, 4.0], None);
        let reader = HttpAssetReader::new(reqwest::Client::new());

        let coverage = reader.read(path.to_str().unwrap()).await.unwrap();
        assert_eq!((coverage.width, coverage.height), (2, 2));
        assert_eq!(coverage.bands[0].data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_read_remote_asset() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/a.tif")).respond_with(
                status_code(200).body(geotiff_bytes(2, 2, EXTENT, 4326, &[5.0; 4], Some(-1.0))),
            ),
        );
        let reader = HttpAssetReader::new(reqwest::Client::new());

        let coverage = reader.read(&server.url_str("/a.tif")).await.unwrap();
        assert_eq!(coverage.bands[0].nodata, vec![-1.0]);
    }

    #[tokio::test]
    async fn test_missing_remote_asset() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/gone.tif")).respond_with(status_code(404)),
        );
        let reader = HttpAssetReader::new(reqwest::Client::new());

        let err = reader.read(&server.url_str("/gone.tif")).await.unwrap_err();
        assert!(matches!(err, StacError::Access { .. }));
    }
}
