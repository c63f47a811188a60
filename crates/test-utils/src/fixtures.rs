//! Common test fixtures for contextualization tests.
//!
//! This module provides pre-defined geometries and service documents that
//! represent common scenarios: a regional grid over central Colombia, STAC
//! collections/items and WCS capabilities for mock servers.

use serde_json::{json, Value};

/// Common bounding box definitions for testing, as (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Central Colombia, roughly 2x2 degrees around Bogotá
    pub const CENTRAL_COLOMBIA: (f64, f64, f64, f64) = (-75.22, 3.56, -72.67, 5.30);

    /// A 2x2 degree square
    pub const TWO_DEGREES: (f64, f64, f64, f64) = (-75.0, 3.0, -73.0, 5.0);

    /// Single point (degenerate bbox)
    pub const POINT: (f64, f64, f64, f64) = (-74.0, 4.0, -74.0, 4.0);
}

/// Textual geometry descriptors.
pub mod descriptors {
    /// 934x631 grid over central Colombia with a 2021 time period.
    pub const CENTRAL_COLOMBIA: &str = "τ0(1){ttype=LOGICAL,period=[1609459200000 1640995200000],tscope=1.0,tunit=YEAR}S2(934,631){bbox=[-75.22 -72.67 3.56 5.30],proj=EPSG:4326}";

    /// 2x2 degree square at 934x631, no time.
    pub const TWO_DEGREES: &str = "S2(934,631){bbox=[-75.0 -73.0 3.0 5.0],proj=EPSG:4326}";

    /// A small 20x10 grid, fast enough for end-to-end tests.
    pub const SMALL_GRID: &str = "S2(20,10){bbox=[-75.0 -73.0 3.0 5.0],proj=EPSG:4326}";

    /// Irregular space: no grid.
    pub const IRREGULAR: &str = "s2{bbox=[-75.0 -73.0 3.0 5.0],proj=EPSG:4326}";
}

/// Build the central Colombia geometry.
pub fn central_colombia() -> geo_common::Geometry {
    geo_common::Geometry::parse(descriptors::CENTRAL_COLOMBIA)
        .expect("fixture descriptor must parse")
}

/// Build a small regular grid geometry.
pub fn small_grid() -> geo_common::Geometry {
    geo_common::Geometry::parse(descriptors::SMALL_GRID).expect("fixture descriptor must parse")
}

// ============================================================================
// STAC documents
// ============================================================================

/// GeoTIFF media type used by item assets.
pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

/// A STAC collection whose root link points at `{base}/catalog.json`.
pub fn stac_collection(base: &str) -> Value {
    json!({
        "type": "Collection",
        "stac_version": "1.0.0",
        "id": "landcover",
        "title": "Land cover",
        "description": "Yearly land cover classes",
        "license": "CC-BY-4.0",
        "keywords": ["land", "cover"],
        "sci:doi": "10.5555/landcover",
        "extent": {
            "spatial": { "bbox": [[-80.0, -5.0, -66.0, 13.0]] },
            "temporal": { "interval": [["2019-01-01T00:00:00Z", null]] }
        },
        "links": [
            { "rel": "root", "href": format!("{}/catalog.json", base), "type": "application/json" },
            { "rel": "self", "href": format!("{}/collections/landcover", base) },
            { "rel": "license", "href": "https://creativecommons.org/licenses/by/4.0/" }
        ]
    })
}

/// A searchable STAC catalog (has a `search` link).
pub fn stac_catalog(base: &str) -> Value {
    json!({
        "type": "Catalog",
        "stac_version": "1.0.0",
        "id": "root",
        "description": "Test catalog",
        "links": [
            { "rel": "self", "href": format!("{}/catalog.json", base) },
            { "rel": "search", "href": format!("{}/search", base), "method": "POST" }
        ]
    })
}

/// A static STAC catalog (no `search` link).
pub fn static_stac_catalog(base: &str) -> Value {
    json!({
        "type": "Catalog",
        "stac_version": "1.0.0",
        "id": "static",
        "description": "Static catalog",
        "links": [
            { "rel": "self", "href": format!("{}/catalog.json", base) },
            { "rel": "child", "href": format!("{}/collections/landcover", base) }
        ]
    })
}

/// A STAC item with one GeoTIFF asset named `data`.
pub fn stac_item(id: &str, datetime: Option<&str>, bbox: [f64; 4], href: &str) -> Value {
    let [w, s, e, n] = bbox;
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "collection": "landcover",
        "bbox": [w, s, e, n],
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[w, s], [e, s], [e, n], [w, n], [w, s]]]
        },
        "properties": { "datetime": datetime },
        "assets": {
            "data": { "href": href, "type": COG_MEDIA_TYPE, "roles": ["data"] }
        },
        "links": []
    })
}

/// A search response page.
pub fn stac_item_collection(features: Vec<Value>, next: Option<&str>) -> Value {
    let links: Vec<Value> = next
        .map(|href| vec![json!({ "rel": "next", "href": href, "method": "GET" })])
        .unwrap_or_default();
    json!({
        "type": "FeatureCollection",
        "features": features,
        "links": links
    })
}

// ============================================================================
// WCS documents
// ============================================================================

/// WCS 1.0.0 capabilities listing one layer.
pub fn wcs_capabilities_v1(layer: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<WCS_Capabilities version="1.0.0" xmlns="http://www.opengis.net/wcs" xmlns:gml="http://www.opengis.net/gml">
  <Service><name>WCS</name><label>Test service</label></Service>
  <ContentMetadata>
    <CoverageOfferingBrief>
      <name>{layer}</name>
      <label>Elevation</label>
      <lonLatEnvelope srsName="urn:ogc:def:crs:OGC:1.3:CRS84">
        <gml:pos>-180.0 -90.0</gml:pos>
        <gml:pos>180.0 90.0</gml:pos>
      </lonLatEnvelope>
    </CoverageOfferingBrief>
  </ContentMetadata>
</WCS_Capabilities>"#
    )
}

/// WCS 2.0.1 capabilities listing one layer.
pub fn wcs_capabilities_v2(layer: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wcs:Capabilities version="2.0.1" xmlns:wcs="http://www.opengis.net/wcs/2.0" xmlns:ows="http://www.opengis.net/ows/2.0">
  <wcs:Contents>
    <wcs:CoverageSummary>
      <wcs:CoverageId>{layer}</wcs:CoverageId>
      <ows:Title>Elevation</ows:Title>
      <ows:WGS84BoundingBox>
        <ows:LowerCorner>-180.0 -90.0</ows:LowerCorner>
        <ows:UpperCorner>180.0 90.0</ows:UpperCorner>
      </ows:WGS84BoundingBox>
    </wcs:CoverageSummary>
  </wcs:Contents>
</wcs:Capabilities>"#
    )
}

/// WCS 2.0.1 coverage description with one band carrying a nil value.
pub fn wcs_describe_coverage_v2(layer: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wcs:CoverageDescriptions xmlns:wcs="http://www.opengis.net/wcs/2.0" xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:gmlcov="http://www.opengis.net/gmlcov/1.0" xmlns:swe="http://www.opengis.net/swe/2.0">
  <wcs:CoverageDescription gml:id="{layer}">
    <gml:boundedBy>
      <gml:Envelope srsName="http://www.opengis.net/def/crs/EPSG/0/4326" axisLabels="Long Lat" srsDimension="2">
        <gml:lowerCorner>-180.0 -90.0</gml:lowerCorner>
        <gml:upperCorner>180.0 90.0</gml:upperCorner>
      </gml:Envelope>
    </gml:boundedBy>
    <wcs:CoverageId>{layer}</wcs:CoverageId>
    <gml:domainSet>
      <gml:RectifiedGrid gml:id="grid" dimension="2">
        <gml:limits>
          <gml:GridEnvelope>
            <gml:low>0 0</gml:low>
            <gml:high>43199 21599</gml:high>
          </gml:GridEnvelope>
        </gml:limits>
      </gml:RectifiedGrid>
    </gml:domainSet>
    <gmlcov:rangeType>
      <swe:DataRecord>
        <swe:field name="elevation">
          <swe:Quantity>
            <swe:nilValues>
              <swe:NilValues>
                <swe:nilValue reason="http://www.opengis.net/def/nil/OGC/0/unknown">-32768</swe:nilValue>
              </swe:NilValues>
            </swe:nilValues>
            <swe:constraint>
              <swe:AllowedValues>
                <swe:interval>-500 9000</swe:interval>
              </swe:AllowedValues>
            </swe:constraint>
          </swe:Quantity>
        </swe:field>
      </swe:DataRecord>
    </gmlcov:rangeType>
  </wcs:CoverageDescription>
</wcs:CoverageDescriptions>"#
    )
}

/// WCS 1.0.0 coverage description with a single null value.
pub fn wcs_describe_coverage_v1(layer: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CoverageDescription version="1.0.0" xmlns="http://www.opengis.net/wcs" xmlns:gml="http://www.opengis.net/gml">
  <CoverageOffering>
    <name>{layer}</name>
    <label>Elevation</label>
    <domainSet>
      <spatialDomain>
        <gml:Envelope srsName="EPSG:4326">
          <gml:pos>-180.0 -90.0</gml:pos>
          <gml:pos>180.0 90.0</gml:pos>
        </gml:Envelope>
      </spatialDomain>
    </domainSet>
    <rangeSet>
      <RangeSet>
        <name>elevation</name>
        <nullValues>
          <singleValue>-9999</singleValue>
        </nullValues>
      </RangeSet>
    </rangeSet>
  </CoverageOffering>
</CoverageDescription>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_fixtures_parse() {
        let geometry = central_colombia();
        let (_, shape) = geometry.require_grid().unwrap();
        assert_eq!((shape.width, shape.height), (934, 631));
        assert!(geometry.time().is_some());

        assert!(small_grid().require_grid().is_ok());
    }

    #[test]
    fn test_item_fixture() {
        let item = stac_item("a", Some("2021-01-01T00:00:00Z"), [0.0, 0.0, 1.0, 1.0], "x.tif");
        assert_eq!(item["type"], "Feature");
        assert_eq!(item["assets"]["data"]["href"], "x.tif");
    }
}
