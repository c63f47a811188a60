//! Building one coverage out of the items of a STAC collection.

use std::collections::BTreeSet;
use std::sync::Arc;

use coverage_processor::{Band, Coverage, CoverageProcessorConfig, CoverageResampler, Interpolation};
use geo_common::{Geometry, Notification};
use tracing::{info, instrument};

use crate::client::StacClient;
use crate::error::{Result, StacError};
use crate::media::{classify, AssetKind};
use crate::merge::{sort_by_date, MergeMode};
use crate::models::{StacCollection, StacItem};
use crate::reader::AssetReader;
use crate::search::{filter_items, ItemFilter, SearchRequest};

/// Merged result of a catalog search.
#[derive(Debug)]
pub struct CatalogCoverage {
    /// Single band named after the asset, on the target grid.
    pub coverage: Coverage,
    /// Items that passed the filter, in merge order.
    pub items: Vec<StacItem>,
    pub notifications: Vec<Notification>,
}

/// Searches a collection for items over a target geometry and merges one
/// asset of every item onto the target grid.
#[derive(Clone)]
pub struct CatalogSearch {
    client: StacClient,
    reader: Arc<dyn AssetReader>,
    resampler: CoverageResampler,
    config: CoverageProcessorConfig,
}

impl CatalogSearch {
    pub fn new(client: StacClient, reader: Arc<dyn AssetReader>, config: CoverageProcessorConfig) -> Self {
        Self {
            client,
            reader,
            resampler: CoverageResampler::new(config.clone()),
            config,
        }
    }

    pub fn client(&self) -> &StacClient {
        &self.client
    }

    /// Search, filter, order and merge.
    ///
    /// An empty item set is an error. Items whose asset is missing, not a
    /// raster or unreadable are skipped with a warning; if none is left the
    /// search fails.
    #[instrument(skip(self, collection, target), fields(collection = %collection.id(), asset = %asset_id, mode = %mode))]
    pub async fn build_coverage(
        &self,
        collection: &StacCollection,
        asset_id: &str,
        target: &Geometry,
        mode: MergeMode,
        interpolation: Interpolation,
    ) -> Result<CatalogCoverage> {
        let (space, shape) = target.require_grid()?;
        let envelope = space.envelope()?;
        let filter = ItemFilter::from_geometry(target, self.config.envelope_segments)?;

        let catalog = self.client.catalog(collection).await?;
        let request = SearchRequest::new(collection.id(), &filter, self.client.config().page_size);
        let features = self.client.search(&catalog, &request).await?;

        let mut notifications = Vec::new();
        let mut items = filter_items(&features, &filter, &mut notifications);
        if items.is_empty() {
            return Err(StacError::NoItems);
        }
        notify(&mut notifications, Notification::debug(format!("Found {} STAC items.", items.len())));

        if mode == MergeMode::Substitute {
            let ordered = sort_by_date(&mut items)?;
            notify(&mut notifications, ordered);
        }
        if let Some(warning) = epsg_warning(&items) {
            notify(&mut notifications, warning);
        }

        let mut merged = vec![f64::NAN; shape.cell_count()];
        let mut merged_items = 0;
        for item in &items {
            let Some(asset) = item.asset(asset_id) else {
                notify(
                    &mut notifications,
                    Notification::warning(format!("STAC item {} has no asset '{}'", item.id, asset_id)),
                );
                continue;
            };
            if classify(asset) != AssetKind::Raster {
                notify(
                    &mut notifications,
                    Notification::warning(format!(
                        "Asset '{}' of STAC item {} is not a supported raster",
                        asset_id, item.id
                    )),
                );
                continue;
            }

            let layer = match self.read_layer(&asset.href, target, interpolation).await {
                Ok(layer) => layer,
                Err(e) => {
                    notify(
                        &mut notifications,
                        Notification::warning(format!("Skipping STAC item {}: {}", item.id, e)),
                    );
                    continue;
                }
            };
            mode.apply(&mut merged, &layer);
            merged_items += 1;
        }

        if merged_items == 0 {
            return Err(StacError::invalid_data(format!(
                "none of the {} STAC items has a readable '{}' asset",
                items.len(),
                asset_id
            )));
        }
        info!(items = items.len(), merged = merged_items, "Merged STAC items");

        let coverage = Coverage::new(
            shape.width,
            shape.height,
            envelope,
            space.crs,
            vec![Band::new(asset_id, merged)],
        )?;
        Ok(CatalogCoverage {
            coverage,
            items,
            notifications,
        })
    }

    /// One item's asset on the target grid, nodata masked to NaN.
    async fn read_layer(&self, href: &str, target: &Geometry, interpolation: Interpolation) -> Result<Vec<f64>> {
        let source = self.reader.read(href).await?;
        let resampled = self.resampler.contextualize(&source, target, interpolation)?;
        Ok(resampled.band(0)?.masked(self.config.nodata_epsilon))
    }
}

fn notify(notifications: &mut Vec<Notification>, notification: Notification) {
    notification.log();
    notifications.push(notification);
}

fn epsg_warning(items: &[StacItem]) -> Option<Notification> {
    let codes: BTreeSet<u32> = items.iter().filter_map(|item| item.epsg).collect();
    if codes.len() < 2 {
        return None;
    }
    let listed: Vec<String> = codes.iter().map(u32::to_string).collect();
    Some(Notification::warning(format!(
        "Multiple EPSGs found on the items [{}]. The reprojection could affect the data.",
        listed.join(", ")
    )))
}
