//! Connected WCS endpoint.

use std::collections::HashMap;
use std::time::Duration;

use coverage_processor::Interpolation;
use geo_common::Geometry;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{parse_capabilities, parse_describe_coverage};
use crate::error::{Result, WcsError};
use crate::layer::{WcsLayer, LAYER_INFO_TTL};
use crate::request::{build_retrieve_url, capabilities_url, describe_coverage_url};
use crate::version::WcsVersion;

/// Version used to build GetCoverage requests, whatever version the
/// service was discovered with. Its request shape is the most widely served.
pub const RETRIEVAL_VERSION: WcsVersion = WcsVersion::V1_0_0;

/// A WCS endpoint whose capabilities have been read.
///
/// Layer descriptions are fetched on first use and refreshed once they are
/// older than the layer TTL.
#[derive(Debug)]
pub struct WcsService {
    url: String,
    version: WcsVersion,
    client: reqwest::Client,
    layers: RwLock<HashMap<String, WcsLayer>>,
    layer_ttl: Duration,
}

impl WcsService {
    /// Read the capabilities of `url` and list its layers.
    #[instrument(skip(client), fields(url = %url, version = %version))]
    pub async fn connect(client: reqwest::Client, url: &str, version: WcsVersion) -> Result<Self> {
        let request = capabilities_url(url, version);
        let body = get_text(&client, &request).await?;
        let layers = parse_capabilities(&body, url)?;

        info!(url = %url, version = %version, layers = layers.len(), "Read WCS capabilities");

        Ok(Self {
            url: url.to_string(),
            version,
            client,
            layers: RwLock::new(layers.into_iter().map(|l| (l.name.clone(), l)).collect()),
            layer_ttl: LAYER_INFO_TTL,
        })
    }

    pub fn with_layer_ttl(mut self, ttl: Duration) -> Self {
        self.layer_ttl = ttl;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> WcsVersion {
        self.version
    }

    pub async fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn has_layer(&self, name: &str) -> bool {
        self.layers.read().await.contains_key(name)
    }

    /// The layer with a current coverage description.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn describe_layer(&self, name: &str) -> Result<WcsLayer> {
        let mut layer = {
            let layers = self.layers.read().await;
            match layers.get(name) {
                Some(layer) if layer.is_fresh(self.layer_ttl) => return Ok(layer.clone()),
                Some(layer) => layer.clone(),
                None => {
                    return Err(WcsError::LayerNotFound {
                        layer: name.to_string(),
                        url: self.url.clone(),
                    })
                }
            }
        };

        let request = describe_coverage_url(&self.url, self.version, name);
        let body = get_text(&self.client, &request).await.map_err(|e| {
            warn!(layer = %name, error = %e, "Failed to retrieve coverage description");
            e
        })?;
        let description = parse_describe_coverage(&body, &request, self.version)?;
        layer.apply(description);

        debug!(
            layer = %name,
            identifier = ?layer.identifier,
            bands = layer.bands.len(),
            "Retrieved coverage description"
        );

        self.layers
            .write()
            .await
            .insert(name.to_string(), layer.clone());
        Ok(layer)
    }

    /// GetCoverage URL for `name` on the grid of `geometry`.
    pub async fn retrieve_url(
        &self,
        name: &str,
        geometry: &Geometry,
        interpolation: Option<Interpolation>,
    ) -> Result<String> {
        let layer = self.describe_layer(name).await?;
        build_retrieve_url(&self.url, &layer, RETRIEVAL_VERSION, geometry, interpolation)
    }
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| WcsError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(WcsError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| WcsError::from_reqwest(url, e))
}
