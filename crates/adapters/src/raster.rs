//! Local GeoTIFF files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use coverage_processor::Scanner;
use geo_common::{Notification, ValueType};
use tracing::instrument;

use crate::adapter::{ContextRequest, Resource, ResourceAdapter};
use crate::context::AdapterContext;
use crate::error::{AdapterError, Result};

/// Path of the raster file.
pub const FILE: &str = "file";

/// Extensions a raster resource may have.
pub const FILE_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

pub struct RasterAdapter {
    context: Arc<AdapterContext>,
}

impl RasterAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }

    fn path(resource: &Resource) -> Result<PathBuf> {
        let file = resource.parameters.require_str(FILE)?;
        Ok(PathBuf::from(file.strip_prefix("file://").unwrap_or(&file)))
    }
}

fn has_raster_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FILE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[async_trait]
impl ResourceAdapter for RasterAdapter {
    fn kind(&self) -> &'static str {
        "raster"
    }

    #[instrument(skip_all, fields(file = ?resource.parameters.get(FILE)))]
    async fn encode(
        &self,
        resource: &Resource,
        request: &ContextRequest,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()> {
        scanner.notify(Notification::debug("Encoding a raster."));

        let path = Self::path(resource)?;
        let options = resource.parameters.encode_options()?;
        let interpolation = request.interpolation_for(resource)?;

        let source = self.context.read_file(path).await?;
        self.context
            .encode_coverage(source, &request.geometry, interpolation, &options, scanner)
            .await
    }

    async fn value_type(&self, _resource: &Resource) -> Result<ValueType> {
        Ok(ValueType::Number)
    }

    async fn validate(&self, resource: &Resource) -> Result<Notification> {
        let path = Self::path(resource)?;
        if !has_raster_extension(&path) {
            return Err(AdapterError::InvalidResource(format!(
                "{} is not a GeoTIFF file (.tif, .tiff)",
                path.display()
            )));
        }
        if !tokio::fs::try_exists(&path).await? {
            return Err(AdapterError::InvalidResource(format!("{} does not exist", path.display())));
        }

        let coverage = self.context.read_file(path.clone()).await?;
        Ok(Notification::info(format!(
            "Raster imported: {} ({}x{}, {} band(s), {})",
            path.display(),
            coverage.width,
            coverage.height,
            coverage.band_count(),
            coverage.crs
        )))
    }
}
