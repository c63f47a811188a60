//! Shared state handed to adapters, and the contextualization entry point.

use std::path::PathBuf;
use std::sync::Arc;

use coverage_processor::{
    read_geotiff, CellEncoder, Coverage, CoverageProcessorConfig, CoverageResampler, DataBuilder,
    EncodeOptions, EncodedData, GridTransform, Interpolation, Scanner,
};
use geo_common::{Geometry, Notification, ValueType};
use stac_catalog::StacConfig;
use storage::{CoverageCache, CoverageCacheConfig, HttpConfig, HttpCoverageFetcher, ServiceRegistry};
use tracing::{info, instrument};
use wcs_protocol::WcsService;

use crate::adapter::{AdapterRegistry, ContextRequest, Resource};
use crate::error::{AdapterError, Result};
use crate::process::ProcessAdapter;
use crate::raster::RasterAdapter;
use crate::stac::StacAdapter;
use crate::wcs::WcsAdapter;

/// Long-lived collaborators of every adapter: one HTTP client, the coverage
/// file cache and the table of connected WCS services.
pub struct AdapterContext {
    pub http: reqwest::Client,
    pub cache: Arc<CoverageCache>,
    pub wcs_services: Arc<ServiceRegistry<WcsService>>,
    pub processor: CoverageProcessorConfig,
    pub stac: StacConfig,
}

impl AdapterContext {
    pub fn new(
        http: &HttpConfig,
        cache: CoverageCacheConfig,
        processor: CoverageProcessorConfig,
        stac: StacConfig,
    ) -> Result<Self> {
        processor
            .validate()
            .map_err(|e| AdapterError::invalid_parameter("coverage", e))?;
        stac.validate().map_err(|e| AdapterError::invalid_parameter("stac", e))?;

        let client = http.build_client()?;
        let fetcher = Arc::new(HttpCoverageFetcher::with_client(client.clone()));
        let cache = CoverageCache::new(cache, fetcher, GridTransform::new(processor.clone()))?;

        Ok(Self {
            http: client,
            cache: Arc::new(cache),
            wcs_services: Arc::new(ServiceRegistry::new()),
            processor,
            stac,
        })
    }

    /// Resample `source` onto the request grid off the async runtime, then
    /// encode it into `scanner`.
    pub(crate) async fn encode_coverage(
        &self,
        source: Coverage,
        geometry: &Arc<Geometry>,
        interpolation: Interpolation,
        options: &EncodeOptions,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()> {
        let resampler = CoverageResampler::new(self.processor.clone());
        let target = geometry.clone();
        let resampled = tokio::task::spawn_blocking(move || resampler.contextualize(&source, &target, interpolation))
            .await
            .map_err(|e| AdapterError::Task(e.to_string()))??;

        CellEncoder::new(self.processor.clone()).encode(&resampled, geometry, options, scanner)?;
        Ok(())
    }

    /// Decode a local GeoTIFF off the async runtime.
    pub(crate) async fn read_file(&self, path: PathBuf) -> Result<Coverage> {
        let coverage = tokio::task::spawn_blocking(move || read_geotiff(path))
            .await
            .map_err(|e| AdapterError::Task(e.to_string()))??;
        Ok(coverage)
    }
}

impl AdapterRegistry {
    /// Registry with the raster, wcs, stac and process adapters.
    pub fn with_defaults(context: Arc<AdapterContext>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RasterAdapter::new(context.clone())));
        registry.register(Arc::new(WcsAdapter::new(context.clone())));
        registry.register(Arc::new(StacAdapter::new(context.clone())));
        registry.register(Arc::new(ProcessAdapter::new(context)));
        registry
    }
}

/// Runs a resource through its adapter into a fresh output buffer.
#[derive(Clone)]
pub struct Contextualizer {
    registry: AdapterRegistry,
}

impl Contextualizer {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Values of `resource` on the request grid, with the notifications
    /// raised along the way.
    #[instrument(skip_all, fields(adapter = %resource.adapter))]
    pub async fn contextualize(&self, resource: &Resource, request: &ContextRequest) -> Result<EncodedData> {
        let adapter = self.registry.get(&resource.adapter)?;
        let (_, shape) = request.geometry.require_grid()?;

        let mut builder = DataBuilder::new(shape);
        adapter.encode(resource, request, &mut builder).await?;
        let data = builder.build();

        info!(
            cells = data.values.len(),
            valid = data.valid_count(),
            notifications = data.notifications.len(),
            "Contextualized resource"
        );
        Ok(data)
    }

    pub async fn value_type(&self, resource: &Resource) -> Result<ValueType> {
        self.registry.get(&resource.adapter)?.value_type(resource).await
    }

    pub async fn validate(&self, resource: &Resource) -> Result<Notification> {
        self.registry.get(&resource.adapter)?.validate(resource).await
    }
}
