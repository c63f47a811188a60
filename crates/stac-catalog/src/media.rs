//! Asset media types.

use geo_common::ValueType;

use crate::models::Asset;

/// GeoTIFF and COG media types, lowercased without whitespace.
pub const RASTER_MEDIA_TYPES: [&str; 5] = [
    "image/tiff;application=geotiff",
    "image/vnd.stac.geotiff",
    "image/tiff;application=geotiff;profile=cloud-optimized",
    "image/vnd.stac.geotiff;profile=cloud-optimized",
    "image/vnd.stac.geotiff;cloud-optimized=true",
];

pub const VECTOR_MEDIA_TYPES: [&str; 3] = ["application/geo+json", "application/vnd.shp", "application/gml+xml"];

/// Extensions that identify a raster when an asset declares no type.
pub const RASTER_EXTENSIONS: [&str; 2] = [".tif", ".tiff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Raster,
    Vector,
    Unsupported,
}

/// Canonical form of a media type: no whitespace, lowercase.
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub fn classify(asset: &Asset) -> AssetKind {
    match asset.media_type.as_deref() {
        Some(media_type) => {
            let normalized = normalize_media_type(media_type);
            if RASTER_MEDIA_TYPES.contains(&normalized.as_str()) {
                AssetKind::Raster
            } else if VECTOR_MEDIA_TYPES.contains(&normalized.as_str()) {
                AssetKind::Vector
            } else {
                AssetKind::Unsupported
            }
        }
        None => {
            let href = asset.href.to_lowercase();
            let path = href.split(['?', '#']).next().unwrap_or_default();
            if RASTER_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
                AssetKind::Raster
            } else {
                AssetKind::Unsupported
            }
        }
    }
}

/// Value type an asset contributes, if the pipeline can read it.
pub fn value_type(asset: &Asset) -> Option<ValueType> {
    match classify(asset) {
        AssetKind::Raster => Some(ValueType::Number),
        AssetKind::Vector | AssetKind::Unsupported => None,
    }
}
