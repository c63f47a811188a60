//! STAC documents: links, collections, catalogs, items and assets.
//!
//! Collections and catalogs keep their raw JSON; only the fields the
//! pipeline reads are typed. Items are parsed one by one so that a single
//! malformed item can be skipped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use geo_common::{parse_iso8601, BoundingBox};
use once_cell::sync::OnceCell;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StacError};

/// Top-level document kinds, as found in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StacKind {
    Collection,
    Catalog,
    Item,
    ItemCollection,
}

impl StacKind {
    /// Expected `type` value, compared case-insensitively.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Catalog => "catalog",
            Self::Item => "Feature",
            Self::ItemCollection => "FeatureCollection",
        }
    }

    /// Name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Catalog => "catalog",
            Self::Item => "item",
            Self::ItemCollection => "item collection",
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        data.get("type")
            .and_then(Value::as_str)
            .map(|t| t.eq_ignore_ascii_case(self.type_name()))
            .unwrap_or(false)
    }
}

// ============================================================================
// Links
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Links of a document. Entries without `rel` or `href` are dropped.
/// `None` when the document has no `links` array at all.
pub fn links_of(data: &Value) -> Option<Vec<Link>> {
    let links = data.get("links")?.as_array()?;
    Some(
        links
            .iter()
            .filter_map(|link| serde_json::from_value(link.clone()).ok())
            .collect(),
    )
}

/// First link with the given relation, compared case-insensitively.
pub fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel.eq_ignore_ascii_case(rel))
}

/// Resolve a possibly relative `href` (`./x`, `../x`) against the URL of
/// the document it was found in.
pub fn resolve_href(document_url: &str, href: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(href) {
        return Ok(absolute.to_string());
    }
    let base = Url::parse(document_url)
        .map_err(|e| StacError::invalid_data(format!("invalid URL {}: {}", document_url, e)))?;
    base.join(href)
        .map(|url| url.to_string())
        .map_err(|e| StacError::invalid_data(format!("cannot resolve {} against {}: {}", href, document_url, e)))
}

// ============================================================================
// Collection
// ============================================================================

/// Keys that may carry a DOI, in order of preference.
const DOI_KEYS: [&str; 5] = [
    "sci:doi",
    "assets.sci:doi",
    "summaries.sci:doi",
    "properties.sci:doi",
    "item_assets.sci:doi",
];

/// Fields a conforming collection must have.
pub const REQUIRED_COLLECTION_FIELDS: [&str; 7] =
    ["type", "stac_version", "id", "description", "license", "extent", "links"];

/// A STAC collection document with memoized descriptive metadata.
#[derive(Debug)]
pub struct StacCollection {
    url: String,
    id: String,
    data: Value,
    title: OnceCell<Option<String>>,
    description: OnceCell<Option<String>>,
    keywords: OnceCell<Option<String>>,
    doi: OnceCell<Option<String>>,
    license: OnceCell<Option<String>>,
}

impl StacCollection {
    /// Wrap a collection document fetched from `url`.
    pub fn from_value(url: impl Into<String>, data: Value) -> Result<Self> {
        let url = url.into();
        if !StacKind::Collection.matches(&data) {
            return Err(StacError::InvalidType {
                kind: StacKind::Collection.label().to_string(),
                url,
            });
        }
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StacError::invalid_data(format!("collection at {} has no id", url)))?
            .to_string();

        Ok(Self {
            url,
            id,
            data,
            title: OnceCell::new(),
            description: OnceCell::new(),
            keywords: OnceCell::new(),
            doi: OnceCell::new(),
            license: OnceCell::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn title(&self) -> Option<&str> {
        self.title
            .get_or_init(|| string_field(&self.data, "title"))
            .as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .get_or_init(|| string_field(&self.data, "description"))
            .as_deref()
    }

    /// Keywords joined with `,`.
    pub fn keywords(&self) -> Option<&str> {
        self.keywords
            .get_or_init(|| {
                let keywords: Vec<&str> = self
                    .data
                    .get("keywords")?
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_str)
                    .collect();
                (!keywords.is_empty()).then(|| keywords.join(","))
            })
            .as_deref()
    }

    pub fn doi(&self) -> Option<&str> {
        self.doi
            .get_or_init(|| DOI_KEYS.iter().find_map(|key| string_field(&self.data, key)))
            .as_deref()
    }

    /// Target of the first `license` link.
    pub fn license(&self) -> Option<&str> {
        self.license
            .get_or_init(|| {
                links_of(&self.data)?
                    .into_iter()
                    .find(|link| link.rel == "license")
                    .map(|link| link.href)
            })
            .as_deref()
    }

    /// URL of the root catalog, resolved against the collection URL.
    pub fn catalog_url(&self) -> Result<String> {
        let links = links_of(&self.data).ok_or_else(|| {
            StacError::MissingLink(
                "STAC collection is missing links. It is not fully compliant and cannot be accessed."
                    .to_string(),
            )
        })?;
        let root = find_link(&links, "root").ok_or_else(|| {
            StacError::MissingLink(format!(
                "STAC collection {} is missing a relationship to the root catalog",
                self.id
            ))
        })?;
        resolve_href(&self.url, &root.href)
    }

    /// Required fields absent from the document.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_COLLECTION_FIELDS
            .iter()
            .copied()
            .filter(|field| self.data.get(field).is_none())
            .collect()
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct StacCatalog {
    pub url: String,
    pub id: Option<String>,
    pub data: Value,
    /// Resolved target of the `search` link.
    pub search_url: Option<String>,
}

impl StacCatalog {
    pub fn from_value(url: impl Into<String>, data: Value) -> Result<Self> {
        let url = url.into();
        if !StacKind::Catalog.matches(&data) {
            return Err(StacError::InvalidType {
                kind: StacKind::Catalog.label().to_string(),
                url,
            });
        }
        let search_url = links_of(&data)
            .and_then(|links| find_link(&links, "search").map(|l| l.href.clone()))
            .map(|href| resolve_href(&url, &href))
            .transpose()?;

        Ok(Self {
            id: string_field(&data, "id"),
            url,
            data,
            search_url,
        })
    }

    pub fn is_searchable(&self) -> bool {
        self.search_url.is_some()
    }
}

// ============================================================================
// Items and assets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: RawProperties,
    #[serde(default)]
    assets: HashMap<String, Asset>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    start_datetime: Option<String>,
    #[serde(default)]
    end_datetime: Option<String>,
    #[serde(rename = "proj:epsg", default)]
    epsg: Option<u32>,
}

/// A STAC item reduced to what filtering and merging need.
#[derive(Debug, Clone, PartialEq)]
pub struct StacItem {
    pub id: String,
    /// Footprint bounds in WGS84.
    pub bbox: BoundingBox,
    pub datetime: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub epsg: Option<u32>,
    pub assets: HashMap<String, Asset>,
}

impl StacItem {
    /// Parse an item, rejecting anything that cannot be placed in space.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawItem = serde_json::from_value(value.clone())
            .map_err(|e| StacError::invalid_data(format!("malformed item: {}", e)))?;
        if !raw.kind.eq_ignore_ascii_case(StacKind::Item.type_name()) {
            return Err(StacError::invalid_data(format!(
                "item {} has type {} instead of Feature",
                raw.id, raw.kind
            )));
        }

        let bbox = raw
            .bbox
            .as_deref()
            .and_then(bbox_from_array)
            .or_else(|| raw.geometry.as_ref().and_then(geometry_bounds))
            .ok_or_else(|| {
                StacError::invalid_data(format!(
                    "item {} has no geometry or bbox definition",
                    raw.id
                ))
            })?;

        let time = |field: &Option<String>| -> Result<Option<DateTime<Utc>>> {
            field
                .as_deref()
                .map(|s| {
                    parse_iso8601(s).map_err(|e| {
                        StacError::invalid_data(format!("item {}: {}", raw.id, e))
                    })
                })
                .transpose()
        };

        Ok(Self {
            datetime: time(&raw.properties.datetime)?,
            start: time(&raw.properties.start_datetime)?,
            end: time(&raw.properties.end_datetime)?,
            epsg: raw.properties.epsg,
            bbox,
            id: raw.id,
            assets: raw.assets,
        })
    }

    /// Instant used to order items: `datetime`, else the interval start.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.datetime.or(self.start)
    }

    /// Time span covered by the item, if it declares one.
    pub fn interval(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.datetime, self.start, self.end) {
            (Some(at), _, _) => Some((at, at)),
            (None, Some(start), Some(end)) => Some((start, end)),
            (None, Some(start), None) => Some((start, start)),
            (None, None, Some(end)) => Some((end, end)),
            (None, None, None) => None,
        }
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }
}

/// `[w, s, e, n]` or `[w, s, zmin, e, n, zmax]`.
fn bbox_from_array(values: &[f64]) -> Option<BoundingBox> {
    match *values {
        [w, s, e, n] => Some(BoundingBox::new(w, s, e, n)),
        [w, s, _, e, n, _] => Some(BoundingBox::new(w, s, e, n)),
        _ => None,
    }
}

/// Bounds of every position in a GeoJSON geometry.
fn geometry_bounds(geometry: &Value) -> Option<BoundingBox> {
    fn visit(value: &Value, bounds: &mut Option<BoundingBox>) {
        let Some(array) = value.as_array() else {
            return;
        };
        if let [x, y, ..] = array.as_slice() {
            if let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) {
                let b = bounds.get_or_insert(BoundingBox::new(x, y, x, y));
                *b = b.union(&BoundingBox::new(x, y, x, y));
                return;
            }
        }
        for item in array {
            visit(item, bounds);
        }
    }

    let mut bounds = None;
    visit(geometry.get("coordinates")?, &mut bounds);
    bounds
}
