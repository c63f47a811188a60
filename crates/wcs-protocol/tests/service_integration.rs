//! WcsService against a mock WCS endpoint.

use std::time::Duration;

use coverage_processor::Interpolation;
use geo_common::CrsCode;
use httptest::{all_of, matchers::*, responders::*, Expectation, Server};
use test_utils::fixtures;
use wcs_protocol::{WcsError, WcsService, WcsVersion};

fn expect_capabilities(server: &Server, body: String) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("request", "getCapabilities")))),
        ])
        .respond_with(status_code(200).body(body)),
    );
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_connect_lists_layers() {
    let server = Server::run();
    expect_capabilities(&server, fixtures::wcs_capabilities_v2("ns__dem"));

    let url = server.url_str("/ows");
    let service = WcsService::connect(reqwest::Client::new(), &url, WcsVersion::V2_0_1)
        .await
        .unwrap();

    assert_eq!(service.url(), url);
    assert_eq!(service.version(), WcsVersion::V2_0_1);
    assert_eq!(service.layer_names().await, vec!["ns__dem".to_string()]);
    assert!(service.has_layer("ns__dem").await);
    assert!(!service.has_layer("other").await);
}

#[tokio::test]
async fn test_connect_http_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/ows")).respond_with(status_code(503)),
    );

    let err = WcsService::connect(reqwest::Client::new(), &server.url_str("/ows"), WcsVersion::V2_0_1)
        .await
        .unwrap_err();
    assert!(matches!(err, WcsError::Http { status: 503, .. }));
}

// =============================================================================
// Describe and retrieve
// =============================================================================

#[tokio::test]
async fn test_describe_layer_v2() {
    let server = Server::run();
    expect_capabilities(&server, fixtures::wcs_capabilities_v2("dem"));
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("request", "DescribeCoverage")))),
            request::query(url_decoded(contains(("coverageId", "dem")))),
        ])
        .respond_with(status_code(200).body(fixtures::wcs_describe_coverage_v2("dem"))),
    );

    let service = WcsService::connect(reqwest::Client::new(), &server.url_str("/ows"), WcsVersion::V2_0_1)
        .await
        .unwrap();

    let layer = service.describe_layer("dem").await.unwrap();
    assert_eq!(layer.identifier.as_deref(), Some("dem"));
    assert_eq!(layer.nodata_for(0), &[-32768.0]);
    assert_eq!(layer.original_crs, Some(CrsCode::Epsg4326));

    // Second call is served from the fresh description
    let again = service.describe_layer("dem").await.unwrap();
    assert_eq!(again.bands, layer.bands);
}

#[tokio::test]
async fn test_stale_description_is_refetched() {
    let server = Server::run();
    expect_capabilities(&server, fixtures::wcs_capabilities_v1("dem"));
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/ows"),
            request::query(url_decoded(contains(("identifiers", "dem")))),
        ])
        .times(2)
        .respond_with(status_code(200).body(fixtures::wcs_describe_coverage_v1("dem"))),
    );

    let service = WcsService::connect(reqwest::Client::new(), &server.url_str("/ows"), WcsVersion::V1_0_0)
        .await
        .unwrap()
        .with_layer_ttl(Duration::ZERO);

    service.describe_layer("dem").await.unwrap();
    let layer = service.describe_layer("dem").await.unwrap();
    assert_eq!(layer.nodata_for(0), &[-9999.0]);
}

#[tokio::test]
async fn test_unknown_layer() {
    let server = Server::run();
    expect_capabilities(&server, fixtures::wcs_capabilities_v2("dem"));

    let service = WcsService::connect(reqwest::Client::new(), &server.url_str("/ows"), WcsVersion::V2_0_1)
        .await
        .unwrap();

    let err = service.describe_layer("missing").await.unwrap_err();
    assert!(matches!(err, WcsError::LayerNotFound { .. }));
}

#[tokio::test]
async fn test_retrieve_url_uses_version_1_0() {
    let server = Server::run();
    expect_capabilities(&server, fixtures::wcs_capabilities_v2("ns__dem"));
    server.expect(
        Expectation::matching(request::query(url_decoded(contains(("request", "DescribeCoverage")))))
            .respond_with(status_code(200).body(fixtures::wcs_describe_coverage_v2("ns__dem"))),
    );

    let url = server.url_str("/ows");
    let service = WcsService::connect(reqwest::Client::new(), &url, WcsVersion::V2_0_1)
        .await
        .unwrap();

    let retrieve = service
        .retrieve_url("ns__dem", &fixtures::small_grid(), Some(Interpolation::Nearest))
        .await
        .unwrap();

    assert!(retrieve.starts_with(&format!("{}?service=WCS&version=1.0.0&request=GetCoverage", url)));
    assert!(retrieve.contains("&coverage=ns:dem&"));
    assert!(retrieve.contains("&width=20&height=10&"));
    assert!(retrieve.ends_with("&interpolation=nearest"));
}
