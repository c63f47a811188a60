//! End-to-end contextualization through every adapter.

use std::sync::Arc;

use adapters::{
    AdapterContext, AdapterError, AdapterRegistry, ContextRequest, Contextualizer, Resource,
    ResourceParameters,
};
use coverage_processor::{write_geotiff, Band, Coverage, CoverageProcessorConfig};
use geo_common::{BoundingBox, CrsCode, Geometry, NotificationLevel, ObservableKind, ValueType};
use httptest::{all_of, matchers::*, responders::*, Expectation, Server};
use serde_json::json;
use stac_catalog::StacConfig;
use storage::{CoverageCacheConfig, HttpConfig};
use tempfile::TempDir;
use test_utils::{fixtures, geotiff_bytes, write_test_geotiff};

const WIDTH: u32 = 20;
const HEIGHT: u32 = 10;
const EXTENT: (f64, f64, f64, f64) = (-75.0, 3.0, -73.0, 5.0);
const CELLS: usize = (WIDTH * HEIGHT) as usize;

fn contextualizer(cache_dir: &TempDir) -> Contextualizer {
    let context = AdapterContext::new(
        &HttpConfig::default(),
        CoverageCacheConfig::default().with_directory(cache_dir.path()),
        CoverageProcessorConfig::default(),
        StacConfig::default(),
    )
    .unwrap();
    Contextualizer::new(AdapterRegistry::with_defaults(Arc::new(context)))
}

fn request() -> ContextRequest {
    ContextRequest::new(Arc::new(fixtures::small_grid()), ObservableKind::Quantity).with_interpolation("nearest")
}

// =============================================================================
// Raster files
// =============================================================================

#[tokio::test]
async fn test_raster_nodata_becomes_nan() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("dem.tif");
    let mut data = vec![100.0f32; CELLS];
    data[0] = -9999.0;
    data[1] = -9998.5;
    write_test_geotiff(&file, WIDTH, HEIGHT, EXTENT, 4326, &data, None);

    let resource = Resource::new(
        "raster",
        ResourceParameters::new()
            .with("file", file.to_str().unwrap())
            .with("nodata", -9999.0),
    );
    let result = contextualizer(&dir).contextualize(&resource, &request()).await.unwrap();

    assert_eq!(result.values.len(), CELLS);
    assert!(result.values[0].is_nan());
    assert_eq!(result.values[1], -9998.5);
    assert!(result.values[2..].iter().all(|&v| v == 100.0));
    assert!(result
        .notifications
        .iter()
        .any(|n| n.level == NotificationLevel::Debug && n.message == "Encoding a raster."));
}

#[tokio::test]
async fn test_raster_band_mixer_picks_band_index() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bands.tif");
    let envelope = BoundingBox::new(EXTENT.0, EXTENT.1, EXTENT.2, EXTENT.3);
    let mut first = vec![1.0; CELLS];
    first[0] = f64::NAN;
    let coverage = Coverage::new(
        WIDTH as usize,
        HEIGHT as usize,
        envelope,
        CrsCode::Epsg4326,
        vec![
            Band::new("a", first),
            Band::new("b", vec![5.0; CELLS]),
            Band::new("c", vec![3.0; CELLS]),
        ],
    )
    .unwrap();
    write_geotiff(&coverage, &file).unwrap();

    let resource = Resource::new(
        "raster",
        ResourceParameters::new()
            .with("file", file.to_str().unwrap())
            .with("bandMixer", "band_max_value"),
    );
    let result = contextualizer(&dir).contextualize(&resource, &request()).await.unwrap();

    assert!(result.values.iter().all(|&v| v == 1.0));
}

#[tokio::test]
async fn test_raster_transform() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("kelvin.tif");
    write_test_geotiff(&file, WIDTH, HEIGHT, EXTENT, 4326, &vec![300.0; CELLS], None);

    let resource = Resource::new(
        "raster",
        ResourceParameters::new()
            .with("file", file.to_str().unwrap())
            .with("transform", "self - 273.0"),
    );
    let result = contextualizer(&dir).contextualize(&resource, &request()).await.unwrap();
    assert!(result.values.iter().all(|&v| (v - 27.0).abs() < 1e-9));
}

#[tokio::test]
async fn test_raster_validation() {
    let dir = tempfile::tempdir().unwrap();
    let contextualizer = contextualizer(&dir);

    let missing = Resource::new(
        "raster",
        ResourceParameters::new().with("file", dir.path().join("none.tif").to_str().unwrap()),
    );
    let err = contextualizer.validate(&missing).await.unwrap_err();
    assert!(matches!(err, AdapterError::InvalidResource(_)));

    let not_tiff = Resource::new("raster", ResourceParameters::new().with("file", "/data/dem.png"));
    assert!(contextualizer.validate(&not_tiff).await.is_err());

    let file = dir.path().join("ok.tif");
    write_test_geotiff(&file, WIDTH, HEIGHT, EXTENT, 4326, &vec![1.0; CELLS], None);
    let ok = Resource::new("raster", ResourceParameters::new().with("file", file.to_str().unwrap()));
    let notification = contextualizer.validate(&ok).await.unwrap();
    assert_eq!(notification.level, NotificationLevel::Info);
    assert_eq!(contextualizer.value_type(&ok).await.unwrap(), ValueType::Number);
}

#[tokio::test]
async fn test_irregular_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = ContextRequest::new(
        Arc::new(Geometry::parse(fixtures::descriptors::IRREGULAR).unwrap()),
        ObservableKind::Quantity,
    );
    let resource = Resource::new("raster", ResourceParameters::new().with("file", "/data/dem.tif"));

    let err = contextualizer(&dir).contextualize(&resource, &request).await.unwrap_err();
    assert!(matches!(err, AdapterError::Geo(_)));
}

#[tokio::test]
async fn test_unknown_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let resource = Resource::new("shapefile", ResourceParameters::new());
    let err = contextualizer(&dir).contextualize(&resource, &request()).await.unwrap_err();
    assert_eq!(err.to_string(), "No adapter registered for 'shapefile'");
}

// =============================================================================
// WCS
// =============================================================================

#[tokio::test]
async fn test_wcs_concurrent_requests_fetch_once() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("request", "getCapabilities")))),
        ])
        .times(1)
        .respond_with(status_code(200).body(fixtures::wcs_capabilities_v1("ns__dem"))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("request", "DescribeCoverage")))),
        ])
        .times(1..)
        .respond_with(status_code(200).body(fixtures::wcs_describe_coverage_v1("ns__dem"))),
    );
    let mut data = vec![7.0f32; CELLS];
    data[3] = -9999.0;
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("request", "GetCoverage")))),
            request::query(url_decoded(contains(("coverage", "ns:dem")))),
        ])
        .times(1)
        .respond_with(status_code(200).body(geotiff_bytes(WIDTH, HEIGHT, EXTENT, 4326, &data, None))),
    );

    let dir = tempfile::tempdir().unwrap();
    let contextualizer = contextualizer(&dir);
    let resource = Resource::new(
        "wcs",
        ResourceParameters::new()
            .with("serviceUrl", server.url_str("/ows"))
            .with("wcsIdentifier", "ns__dem")
            .with("wcsVersion", "1.0.0"),
    );
    let request = request();

    let (first, second) = tokio::join!(
        contextualizer.contextualize(&resource, &request),
        contextualizer.contextualize(&resource, &request),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    // Layer nodata from the coverage description
    assert!(first.values[3].is_nan());
    assert_eq!(first.values[0], 7.0);
    assert_eq!(first.values.len(), second.values.len());
    assert_eq!(second.valid_count(), CELLS - 1);
}

#[tokio::test]
async fn test_wcs_unknown_layer() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/ows"))
            .respond_with(status_code(200).body(fixtures::wcs_capabilities_v1("ns__dem"))),
    );

    let dir = tempfile::tempdir().unwrap();
    let resource = Resource::new(
        "wcs",
        ResourceParameters::new()
            .with("serviceUrl", server.url_str("/ows"))
            .with("wcsIdentifier", "ns__slope")
            .with("wcsVersion", "1.0.0"),
    );
    let err = contextualizer(&dir).contextualize(&resource, &request()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Wcs(_)));
}

// =============================================================================
// STAC
// =============================================================================

#[tokio::test]
async fn test_stac_collection_asset() {
    let server = Server::run();
    let base = server.url_str("").trim_end_matches('/').to_string();
    let dir = tempfile::tempdir().unwrap();
    let asset = dir.path().join("landcover.tif");
    write_test_geotiff(&asset, WIDTH, HEIGHT, EXTENT, 4326, &vec![4.0; CELLS], None);

    server.expect(
        Expectation::matching(request::method_path("GET", "/collections/landcover"))
            .respond_with(json_encoded(fixtures::stac_collection(&base))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/catalog.json"))
            .respond_with(json_encoded(fixtures::stac_catalog(&base))),
    );
    server.expect(
        Expectation::matching(request::method_path("POST", "/search")).respond_with(json_encoded(
            fixtures::stac_item_collection(
                vec![fixtures::stac_item(
                    "lc-2021",
                    Some("2021-01-01T00:00:00Z"),
                    [-75.0, 3.0, -73.0, 5.0],
                    asset.to_str().unwrap(),
                )],
                None,
            ),
        )),
    );

    let resource = Resource::new(
        "stac",
        ResourceParameters::new()
            .with("collection", server.url_str("/collections/landcover"))
            .with("asset", "data")
            .with("merge", "substitute"),
    );
    let result = contextualizer(&dir)
        .contextualize(&resource, &request())
        .await
        .unwrap();

    assert!(result.values.iter().all(|&v| v == 4.0));
    assert!(result.notifications.iter().any(|n| n.message == "Found 1 STAC items."));
}

#[tokio::test]
async fn test_stac_validation_reports_missing_fields() {
    let server = Server::run();
    let base = server.url_str("").trim_end_matches('/').to_string();
    let mut collection = fixtures::stac_collection(&base);
    collection.as_object_mut().unwrap().remove("license");
    server.expect(
        Expectation::matching(request::method_path("GET", "/collections/landcover"))
            .respond_with(json_encoded(collection)),
    );

    let dir = tempfile::tempdir().unwrap();
    let resource = Resource::new(
        "stac",
        ResourceParameters::new()
            .with("collection", server.url_str("/collections/landcover"))
            .with("asset", "data"),
    );
    let err = contextualizer(&dir).validate(&resource).await.unwrap_err();
    assert!(err.to_string().contains("license"));
}

// =============================================================================
// Process execution
// =============================================================================

#[tokio::test]
async fn test_process_result_is_encoded() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/processes/ndvi/execution"),
            request::body(json_decoded(|body: &serde_json::Value| {
                body["inputs"]["epsg"] == json!(4326) && body["inputs"]["collection"] == json!("S2")
            })),
        ])
        .respond_with(json_encoded(json!({
            "outputs": {
                "result": {
                    "href": server.url_str("/results/ndvi.tif"),
                    "type": "image/tiff; application=geotiff"
                }
            }
        }))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/results/ndvi.tif")).respond_with(
            status_code(200).body(geotiff_bytes(WIDTH, HEIGHT, EXTENT, 4326, &vec![0.5; CELLS], None)),
        ),
    );

    let dir = tempfile::tempdir().unwrap();
    let resource = Resource::new(
        "process",
        ResourceParameters::new()
            .with("serviceUrl", server.url_str(""))
            .with("processId", "ndvi")
            .with("collection", "S2"),
    );
    let result = contextualizer(&dir)
        .contextualize(&resource, &request())
        .await
        .unwrap();
    assert!(result.values.iter().all(|&v| v == 0.5));
}

#[tokio::test]
async fn test_process_failure() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/processes/ndvi/execution"))
            .respond_with(status_code(500)),
    );

    let dir = tempfile::tempdir().unwrap();
    let resource = Resource::new(
        "process",
        ResourceParameters::new()
            .with("serviceUrl", server.url_str(""))
            .with("processId", "ndvi"),
    );
    let err = contextualizer(&dir)
        .contextualize(&resource, &request())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Process { .. }));
}
