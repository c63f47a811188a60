//! Assets of STAC collections, merged across items.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_processor::{CellEncoder, Scanner};
use geo_common::{Notification, ValueType};
use serde_json::Value;
use stac_catalog::{
    value_type, Asset, CatalogSearch, HttpAssetReader, MergeMode, StacClient, StacCollection,
};
use tracing::{debug, instrument};

use crate::adapter::{ContextRequest, Resource, ResourceAdapter};
use crate::context::AdapterContext;
use crate::error::{AdapterError, Result};

/// URL of the collection document.
pub const COLLECTION: &str = "collection";
pub const ASSET: &str = "asset";
/// `sum` or `substitute`.
pub const MERGE: &str = "merge";

pub struct StacAdapter {
    context: Arc<AdapterContext>,
}

impl StacAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }

    fn client(&self) -> StacClient {
        StacClient::new(self.context.http.clone(), self.context.stac.clone())
    }

    fn search(&self) -> CatalogSearch {
        CatalogSearch::new(
            self.client(),
            Arc::new(HttpAssetReader::new(self.context.http.clone())),
            self.context.processor.clone(),
        )
    }

    async fn collection(&self, resource: &Resource) -> Result<StacCollection> {
        let url = resource.parameters.require_str(COLLECTION)?;
        Ok(self.client().collection(&url).await?)
    }
}

fn merge_mode(resource: &Resource) -> Result<MergeMode> {
    match resource.parameters.get_str(MERGE) {
        Some(mode) => Ok(mode.parse()?),
        None => Ok(MergeMode::default()),
    }
}

/// Asset definition a collection advertises for its items.
fn item_asset(collection: &StacCollection, asset_id: &str) -> Option<Asset> {
    let data = collection.data();
    ["item_assets", "assets"]
        .iter()
        .filter_map(|field| data.get(field)?.get(asset_id))
        .find_map(|definition| {
            let mut definition = definition.clone();
            if let Value::Object(map) = &mut definition {
                map.entry("href").or_insert_with(|| Value::String(String::new()));
            }
            serde_json::from_value(definition).ok()
        })
}

#[async_trait]
impl ResourceAdapter for StacAdapter {
    fn kind(&self) -> &'static str {
        "stac"
    }

    #[instrument(skip_all, fields(collection = ?resource.parameters.get(COLLECTION)))]
    async fn encode(
        &self,
        resource: &Resource,
        request: &ContextRequest,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()> {
        let asset_id = resource.parameters.require_str(ASSET)?;
        let mode = merge_mode(resource)?;
        let options = resource.parameters.encode_options()?;
        let interpolation = request.interpolation_for(resource)?;

        let collection = self.collection(resource).await?;
        let merged = self
            .search()
            .build_coverage(&collection, &asset_id, &request.geometry, mode, interpolation)
            .await?;

        for notification in merged.notifications {
            scanner.notify(notification);
        }
        CellEncoder::new(self.context.processor.clone()).encode(
            &merged.coverage,
            &request.geometry,
            &options,
            scanner,
        )?;
        Ok(())
    }

    async fn value_type(&self, resource: &Resource) -> Result<ValueType> {
        let asset_id = resource
            .parameters
            .get_str(ASSET)
            .ok_or_else(|| AdapterError::Unsupported("STAC resources without an asset".to_string()))?;
        let collection = self.collection(resource).await?;

        match item_asset(&collection, &asset_id) {
            Some(asset) => value_type(&asset).ok_or_else(|| {
                AdapterError::Unsupported(format!(
                    "asset '{}' of type {}",
                    asset_id,
                    asset.media_type.as_deref().unwrap_or("unknown")
                ))
            }),
            None => {
                debug!(asset = %asset_id, "Collection does not describe the asset, assuming a raster");
                Ok(ValueType::Number)
            }
        }
    }

    async fn validate(&self, resource: &Resource) -> Result<Notification> {
        let collection = self.collection(resource).await?;
        let missing = collection.missing_fields();
        if !missing.is_empty() {
            return Err(AdapterError::InvalidResource(format!(
                "STAC collection {} lacks required fields: {}",
                collection.url(),
                missing.join(", ")
            )));
        }
        let asset_id = resource.parameters.require_str(ASSET)?;
        merge_mode(resource)?;

        Ok(Notification::info(format!(
            "STAC collection {} ({}), asset {}",
            collection.id(),
            collection.title().unwrap_or("untitled"),
            asset_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ResourceParameters;
    use serde_json::json;
    use test_utils::fixtures;

    #[test]
    fn test_merge_mode_parameter() {
        let resource = Resource::new("stac", ResourceParameters::new());
        assert_eq!(merge_mode(&resource).unwrap(), MergeMode::Sum);

        let resource = Resource::new("stac", ResourceParameters::new().with("merge", "SUBSTITUTE"));
        assert_eq!(merge_mode(&resource).unwrap(), MergeMode::Substitute);

        let resource = Resource::new("stac", ResourceParameters::new().with("merge", "max"));
        assert!(matches!(merge_mode(&resource), Err(AdapterError::Stac(_))));
    }

    #[test]
    fn test_item_asset_lookup() {
        let mut data = fixtures::stac_collection("http://stac.test");
        data["item_assets"] = json!({
            "data": { "type": fixtures::COG_MEDIA_TYPE, "roles": ["data"] },
            "footprint": { "type": "application/geo+json" }
        });
        let collection = StacCollection::from_value("http://stac.test/collections/landcover", data).unwrap();

        let asset = item_asset(&collection, "data").unwrap();
        assert_eq!(value_type(&asset), Some(ValueType::Number));
        let footprint = item_asset(&collection, "footprint").unwrap();
        assert_eq!(value_type(&footprint), None);
        assert!(item_asset(&collection, "other").is_none());
    }
}
