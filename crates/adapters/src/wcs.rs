//! Layers of OGC Web Coverage Services.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_processor::Scanner;
use geo_common::{Notification, ValueType};
use storage::CacheKey;
use tracing::{debug, instrument};
use wcs_protocol::{WcsService, WcsVersion};

use crate::adapter::{ContextRequest, Resource, ResourceAdapter};
use crate::context::AdapterContext;
use crate::error::Result;

pub const SERVICE_URL: &str = "serviceUrl";
pub const IDENTIFIER: &str = "wcsIdentifier";
pub const VERSION: &str = "wcsVersion";

/// Version assumed when a resource does not name one.
pub const DEFAULT_VERSION: WcsVersion = WcsVersion::V2_0_1;

pub struct WcsAdapter {
    context: Arc<AdapterContext>,
}

struct LayerRef {
    url: String,
    identifier: String,
    version: WcsVersion,
}

impl WcsAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }

    fn layer_ref(resource: &Resource) -> Result<LayerRef> {
        let params = &resource.parameters;
        let version = match params.get_str(VERSION) {
            Some(v) => WcsVersion::parse(&v)?,
            None => DEFAULT_VERSION,
        };
        Ok(LayerRef {
            url: params.require_str(SERVICE_URL)?,
            identifier: params.require_str(IDENTIFIER)?,
            version,
        })
    }

    /// The connected service, shared through the registry.
    async fn service(&self, layer: &LayerRef) -> Result<Arc<WcsService>> {
        let client = self.context.http.clone();
        let service = self
            .context
            .wcs_services
            .get_or_connect(&layer.url, &layer.version.to_string(), || {
                WcsService::connect(client, &layer.url, layer.version)
            })
            .await?;
        Ok(service)
    }
}

#[async_trait]
impl ResourceAdapter for WcsAdapter {
    fn kind(&self) -> &'static str {
        "wcs"
    }

    #[instrument(skip_all, fields(layer = ?resource.parameters.get(IDENTIFIER)))]
    async fn encode(
        &self,
        resource: &Resource,
        request: &ContextRequest,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()> {
        let layer_ref = Self::layer_ref(resource)?;
        let mut options = resource.parameters.encode_options()?;
        let interpolation = request.interpolation_for(resource)?;

        let service = self.service(&layer_ref).await?;
        let layer = service.describe_layer(&layer_ref.identifier).await?;
        options.nodata.extend_from_slice(layer.nodata_for(options.band));

        let url = service
            .retrieve_url(&layer_ref.identifier, &request.geometry, Some(interpolation))
            .await?;
        debug!(url = %url, "GetCoverage");

        let key = CacheKey::new(
            format!("{}#{}", service.url(), layer_ref.identifier),
            request.geometry.clone(),
            interpolation,
        );
        let path = self.context.cache.get(&key, &url).await?;

        scanner.notify(Notification::debug(format!(
            "Encoding WCS layer {} from {}",
            layer_ref.identifier,
            service.url()
        )));
        let source = self.context.read_file(path).await?;
        self.context
            .encode_coverage(source, &request.geometry, interpolation, &options, scanner)
            .await
    }

    async fn value_type(&self, _resource: &Resource) -> Result<ValueType> {
        Ok(ValueType::Number)
    }

    async fn validate(&self, resource: &Resource) -> Result<Notification> {
        let layer = Self::layer_ref(resource)?;
        Ok(Notification::info(format!(
            "WCS layer {} at {} (version {})",
            layer.identifier, layer.url, layer.version
        )))
    }
}
