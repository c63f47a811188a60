//! The YAML job file: a resource plus the scale it is wanted at.

use std::path::Path;
use std::sync::Arc;

use adapters::{ContextRequest, Resource, ResourceParameters};
use anyhow::{anyhow, Context, Result};
use geo_common::{Geometry, ObservableKind, TimeRange};
use serde::Deserialize;

/// One contextualization to run.
///
/// ```yaml
/// adapter: wcs
/// parameters:
///   serviceUrl: https://example.org/geoserver/ows
///   wcsIdentifier: im__elevation
/// geometry: "S2(934,631){bbox=[-75.22 -72.67 3.56 5.30],proj=EPSG:4326}"
/// time: 2021-01-01/2022-01-01
/// observable: quantity
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub adapter: String,
    #[serde(default)]
    pub parameters: ResourceParameters,
    pub geometry: Option<String>,
    /// "start/end" window, replacing any time dimension of the geometry.
    pub time: Option<String>,
    pub observable: Option<String>,
    pub interpolation: Option<String>,
}

impl JobFile {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Invalid job file")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        Self::parse(&yaml).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Split into the resource and the request, letting command line values
    /// win over the file.
    pub fn into_request(self, overrides: &Overrides) -> Result<(Resource, ContextRequest)> {
        let descriptor = overrides
            .geometry
            .clone()
            .or(self.geometry)
            .ok_or_else(|| anyhow!("No geometry given in the job file or on the command line"))?;
        let mut geometry = Geometry::parse(&descriptor)
            .with_context(|| format!("Invalid geometry '{}'", descriptor))?;
        if let Some(interval) = overrides.time.clone().or(self.time) {
            let range = TimeRange::from_interval_string(&interval)
                .with_context(|| format!("Invalid time window '{}'", interval))?;
            geometry = geometry.with_time(range);
        }

        let observable = overrides
            .observable
            .as_deref()
            .or(self.observable.as_deref())
            .map(ObservableKind::from_str)
            .unwrap_or(ObservableKind::Quantity);

        let mut request = ContextRequest::new(Arc::new(geometry), observable);
        if let Some(interpolation) = overrides.interpolation.clone().or(self.interpolation) {
            request = request.with_interpolation(interpolation);
        }

        Ok((Resource::new(self.adapter, self.parameters), request))
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub geometry: Option<String>,
    pub time: Option<String>,
    pub observable: Option<String>,
    pub interpolation: Option<String>,
}
