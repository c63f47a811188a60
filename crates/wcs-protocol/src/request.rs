//! WCS request URL construction.

use coverage_processor::Interpolation;
use geo_common::{BoundingBox, Geometry};

use crate::error::{Result, WcsError};
use crate::layer::WcsLayer;
use crate::version::WcsVersion;

/// Fraction of a CRS axis extent used to widen a zero-width request.
/// Roughly ten meters on a geographic axis.
const DEGENERATE_WIDENING: f64 = 3_900_000.0;

/// Append `query` to `service_url`, which may already carry parameters.
pub fn with_query(service_url: &str, query: &str) -> String {
    let separator = if !service_url.contains('?') {
        "?"
    } else if service_url.ends_with('?') || service_url.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{}{}{}", service_url, separator, query)
}

pub fn capabilities_url(service_url: &str, version: WcsVersion) -> String {
    with_query(
        service_url,
        &format!("service=WCS&request=getCapabilities&version={}", version),
    )
}

pub fn describe_coverage_url(service_url: &str, version: WcsVersion, layer_name: &str) -> String {
    let parameter = if version.is_v2() { "coverageId" } else { "identifiers" };
    with_query(
        service_url,
        &format!(
            "service=WCS&version={}&request=DescribeCoverage&{}={}",
            version, parameter, layer_name
        ),
    )
}

/// GetCoverage URL fetching `layer` on the grid of `geometry` as GeoTIFF.
///
/// The target must be a regular 2-D grid. A bounding box with no width or
/// no height is widened on both sides so servers do not reject it.
pub fn build_retrieve_url(
    service_url: &str,
    layer: &WcsLayer,
    version: WcsVersion,
    geometry: &Geometry,
    interpolation: Option<Interpolation>,
) -> Result<String> {
    let (space, shape) = geometry.require_grid()?;
    let crs = space.crs;
    let BoundingBox {
        min_x: mut west,
        min_y: mut south,
        max_x: mut east,
        max_y: mut north,
    } = space.envelope()?;

    let (x_extent, y_extent) = crs.axis_extent();
    if west == east {
        let delta = x_extent / DEGENERATE_WIDENING;
        west -= delta;
        east += delta;
    }
    if south == north {
        let delta = y_extent / DEGENERATE_WIDENING;
        south -= delta;
        north += delta;
    }

    let query = match (version.major, version.minor) {
        (1, 0) => format!(
            "service=WCS&version={}&request=GetCoverage&coverage={}&bbox={},{},{},{}&crs={}&responseCRS={}&width={}&height={}&format=GeoTIFF",
            version,
            layer.request_identifier()?,
            west,
            south,
            east,
            north,
            crs,
            crs,
            shape.width,
            shape.height
        ),
        (1, _) => format!(
            "service=WCS&version={}&request=GetCoverage&identifier={}&boundingbox={},{},{},{},{}&responseCRS={}&width={}&height={}&format=GeoTIFF",
            version,
            layer.request_identifier()?,
            west,
            south,
            east,
            north,
            crs,
            crs,
            shape.width,
            shape.height
        ),
        // TODO: 2.x GetCoverage needs subset=Long(..)&subset=Lat(..) and scaling extension parameters
        _ => return Err(WcsError::UnsupportedVersion(version.to_string())),
    };

    let mut url = with_query(service_url, &query);
    if let Some(interpolation) = interpolation {
        url.push_str("&interpolation=");
        url.push_str(interpolation.as_str());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{CrsCode, GeoError};
    use crate::layer::LayerDescription;

    const SERVICE: &str = "http://wcs.example.org/ows";

    fn layer() -> WcsLayer {
        let mut layer = WcsLayer::new("ns__dem");
        layer.apply(LayerDescription::default());
        layer
    }

    fn grid(envelope: BoundingBox) -> Geometry {
        Geometry::grid(envelope, CrsCode::Epsg4326, 10, 5)
    }

    // ========================================================================
    // Query helpers
    // ========================================================================

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("http://h/ows", "a=1"), "http://h/ows?a=1");
        assert_eq!(with_query("http://h/ows?map=x", "a=1"), "http://h/ows?map=x&a=1");
        assert_eq!(with_query("http://h/ows?", "a=1"), "http://h/ows?a=1");
    }

    #[test]
    fn test_capabilities_url() {
        assert_eq!(
            capabilities_url(SERVICE, WcsVersion::V2_0_1),
            "http://wcs.example.org/ows?service=WCS&request=getCapabilities&version=2.0.1"
        );
    }

    #[test]
    fn test_describe_coverage_parameter_by_version() {
        assert!(describe_coverage_url(SERVICE, WcsVersion::V2_0_1, "dem").ends_with("&coverageId=dem"));
        assert!(describe_coverage_url(SERVICE, WcsVersion::V1_0_0, "dem").ends_with("&identifiers=dem"));
    }

    // ========================================================================
    // GetCoverage
    // ========================================================================

    #[test]
    fn test_retrieve_url_v1_0() {
        let url = build_retrieve_url(
            SERVICE,
            &layer(),
            WcsVersion::V1_0_0,
            &grid(BoundingBox::new(-75.0, 3.0, -73.0, 5.0)),
            None,
        )
        .unwrap();
        assert_eq!(
            url,
            "http://wcs.example.org/ows?service=WCS&version=1.0.0&request=GetCoverage&coverage=ns:dem&bbox=-75,3,-73,5&crs=EPSG:4326&responseCRS=EPSG:4326&width=10&height=5&format=GeoTIFF"
        );
    }

    #[test]
    fn test_retrieve_url_v1_1_with_interpolation() {
        let url = build_retrieve_url(
            SERVICE,
            &layer(),
            WcsVersion::V1_1_0,
            &grid(BoundingBox::new(-75.0, 3.0, -73.0, 5.0)),
            Some(Interpolation::Bilinear),
        )
        .unwrap();
        assert!(url.contains("&identifier=ns:dem&boundingbox=-75,3,-73,5,EPSG:4326&responseCRS=EPSG:4326"));
        assert!(url.ends_with("&format=GeoTIFF&interpolation=bilinear"));
    }

    #[test]
    fn test_degenerate_bbox_is_widened() {
        let url = build_retrieve_url(
            SERVICE,
            &layer(),
            WcsVersion::V1_0_0,
            &grid(BoundingBox::new(10.0, 20.0, 10.0, 20.0)),
            None,
        )
        .unwrap();
        let dx = 360.0 / DEGENERATE_WIDENING;
        let dy = 180.0 / DEGENERATE_WIDENING;
        let expected = format!("&bbox={},{},{},{}&", 10.0 - dx, 20.0 - dy, 10.0 + dx, 20.0 + dy);
        assert!(url.contains(&expected), "{}", url);
    }

    #[test]
    fn test_v2_is_unsupported() {
        let err = build_retrieve_url(
            SERVICE,
            &layer(),
            WcsVersion::V2_0_1,
            &grid(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, WcsError::UnsupportedVersion(ref v) if v == "2.0.1"));
        assert!(matches!(GeoError::from(err), GeoError::Unsupported(_)));
    }

    #[test]
    fn test_non_grid_target_is_rejected() {
        let irregular = Geometry::parse(test_utils::fixtures::descriptors::IRREGULAR).unwrap();
        let err = build_retrieve_url(SERVICE, &layer(), WcsVersion::V1_0_0, &irregular, None).unwrap_err();
        assert!(matches!(err, WcsError::Geo(GeoError::InvalidGeometry(_))));
    }

    #[test]
    fn test_undescribed_layer_is_rejected() {
        let err = build_retrieve_url(
            SERVICE,
            &WcsLayer::new("dem"),
            WcsVersion::V1_0_0,
            &grid(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, WcsError::MissingParameter(_)));
    }
}
