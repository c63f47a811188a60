//! HTTP access to STAC collections, catalogs and the item search API.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::StacConfig;
use crate::error::{Result, StacError};
use crate::models::{find_link, links_of, resolve_href, StacCatalog, StacCollection, StacKind};
use crate::search::SearchRequest;

#[derive(Debug, Clone)]
pub struct StacClient {
    http: reqwest::Client,
    config: StacConfig,
}

impl StacClient {
    pub fn new(http: reqwest::Client, config: StacConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &StacConfig {
        &self.config
    }

    /// GET a STAC document and check its `type`.
    #[instrument(skip(self), fields(url = %url, kind = kind.label()))]
    pub async fn request_metadata(&self, url: &str, kind: StacKind) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StacError::from_reqwest(kind.label(), url, e))?;
        self.read_document(response, url, kind).await
    }

    pub async fn collection(&self, url: &str) -> Result<StacCollection> {
        let data = self.request_metadata(url, StacKind::Collection).await?;
        StacCollection::from_value(url, data)
    }

    /// The root catalog of a collection.
    pub async fn catalog(&self, collection: &StacCollection) -> Result<StacCatalog> {
        let url = collection.catalog_url()?;
        let data = self.request_metadata(&url, StacKind::Catalog).await?;
        StacCatalog::from_value(url, data)
    }

    /// Run an item search, following `next` links up to the page limit.
    ///
    /// Returns the raw features; callers decide what a usable item is.
    #[instrument(skip(self, catalog, request), fields(catalog = %catalog.url))]
    pub async fn search(&self, catalog: &StacCatalog, request: &SearchRequest) -> Result<Vec<Value>> {
        let search_url = catalog
            .search_url
            .as_deref()
            .ok_or_else(|| StacError::Unsupported("Static catalogs are not implemented yet".to_string()))?;

        let body = serde_json::to_value(request)
            .map_err(|e| StacError::invalid_data(format!("cannot encode search request: {}", e)))?;

        let label = StacKind::ItemCollection.label();
        let mut response = self
            .http
            .post(search_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StacError::from_reqwest(label, search_url, e))?;
        let mut page_url = search_url.to_string();
        let mut features = Vec::new();
        let mut pages = 0;

        loop {
            let page = self
                .read_document(response, &page_url, StacKind::ItemCollection)
                .await?;
            pages += 1;

            let page_features = page
                .get("features")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            debug!(page = pages, items = page_features.len(), "Read search page");
            features.extend(page_features);

            let next = links_of(&page).and_then(|links| find_link(&links, "next").cloned());
            let Some(next) = next else {
                break;
            };
            if pages >= self.config.max_pages {
                warn!(
                    pages,
                    items = features.len(),
                    "Search result truncated at the page limit"
                );
                break;
            }

            page_url = resolve_href(&page_url, &next.href)?;
            let post = next
                .method
                .as_deref()
                .map(|m| m.eq_ignore_ascii_case("POST"))
                .unwrap_or(false);
            let request = if post {
                self.http.post(&page_url).json(next.body.as_ref().unwrap_or(&body))
            } else {
                self.http.get(&page_url)
            };
            response = request
                .send()
                .await
                .map_err(|e| StacError::from_reqwest(label, &page_url, e))?;
        }

        info!(items = features.len(), pages, "STAC search complete");
        Ok(features)
    }

    async fn read_document(&self, response: reqwest::Response, url: &str, kind: StacKind) -> Result<Value> {
        if !response.status().is_success() {
            debug!(url = %url, status = response.status().as_u16(), "STAC request rejected");
            return Err(StacError::access(kind.label(), url));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|e| StacError::from_reqwest(kind.label(), url, e))?;
        if !kind.matches(&data) {
            return Err(StacError::InvalidType {
                kind: kind.label().to_string(),
                url: url.to_string(),
            });
        }
        Ok(data)
    }
}
