//! GetCapabilities and DescribeCoverage response parsing.
//!
//! Both 1.x dialects (1.0 `CoverageOffering`, 1.1 `ows:` elements) and the
//! 2.0 GML/SWE shape are read from the same namespace-free element tree.

use geo_common::{BoundingBox, CrsCode, GridShape};
use tracing::{debug, warn};

use crate::error::{Result, WcsError};
use crate::layer::{LayerDescription, WcsBand, WcsLayer};
use crate::version::WcsVersion;
use crate::xml::{numbers, parse_document, Element};

/// Lat/lon ordered WGS84 as written by 1.1 servers. Its corners cannot be
/// used as lon/lat, so the capabilities envelope is kept instead.
const FLIPPED_WGS84: &str = "urn:ogc:def:crs:EPSG::4326";

/// Values some servers put in null value lists that mean "none".
const INFINITY: &str = "Infinity";

/// Parse the layers listed in a capabilities document.
pub fn parse_capabilities(xml: &str, url: &str) -> Result<Vec<WcsLayer>> {
    let root = parse_document(xml)?;
    check_exception(&root, url)?;

    let summaries = root
        .find_all("CoverageOfferingBrief")
        .into_iter()
        .chain(root.find_all("CoverageSummary"));

    let mut layers = Vec::new();
    for summary in summaries {
        let name = match summary
            .child_any(&["CoverageId", "Identifier", "name"])
            .map(Element::text)
            .filter(|s| !s.is_empty())
        {
            Some(name) => name,
            None => {
                debug!(url = %url, "Skipping coverage summary without identifier");
                continue;
            }
        };

        let mut layer = WcsLayer::new(name);
        layer.title = summary
            .child_any(&["Title", "label"])
            .map(|e| e.text().to_string())
            .filter(|s| !s.is_empty());
        layer.wgs84_envelope = wgs84_envelope(summary);
        layers.push(layer);
    }

    if layers.is_empty() {
        warn!(url = %url, "Capabilities document lists no coverages");
    }
    Ok(layers)
}

/// Parse a DescribeCoverage response for a service of the given version.
pub fn parse_describe_coverage(xml: &str, url: &str, version: WcsVersion) -> Result<LayerDescription> {
    let root = parse_document(xml)?;
    check_exception(&root, url)?;

    let node = root
        .find("CoverageOffering")
        .or_else(|| root.find("CoverageDescription"))
        .ok_or_else(|| WcsError::xml(format!("{} returned no coverage description", url)))?;

    let mut description = if version.is_v2() {
        parse_v2(node)
    } else {
        parse_v1(node)
    };
    description.grid_shape = grid_shape(node);
    Ok(description)
}

fn parse_v1(node: &Element) -> LayerDescription {
    let mut description = LayerDescription {
        identifier: node
            .child_any(&["Identifier", "name"])
            .map(|e| e.text().to_string()),
        ..LayerDescription::default()
    };

    for name in ["SupportedCRS", "requestResponseCRSs", "requestCRSs"] {
        for crs in node.find_all(name) {
            let crs = crs.text().to_string();
            if !crs.is_empty() && !description.supported_crs.contains(&crs) {
                description.supported_crs.push(crs);
            }
        }
    }

    // 1.1: BoundingBox with crs + Lower/UpperCorner. 1.0: gml:Envelope with two pos.
    let boxes = node.find_all("BoundingBox").into_iter().filter_map(|bbox| {
        let crs = bbox.attribute("crs")?;
        let lower = numbers(bbox.child("LowerCorner")?.text());
        let upper = numbers(bbox.child("UpperCorner")?.text());
        Some((crs, lower, upper))
    });
    let envelopes = node.find_all("Envelope").into_iter().filter_map(|env| {
        let crs = env.attribute("srsName")?;
        let corners: Vec<Vec<f64>> = env.children_named("pos").map(|p| numbers(p.text())).collect();
        let [lower, upper]: [Vec<f64>; 2] = corners.try_into().ok()?;
        Some((crs, lower, upper))
    });
    description.envelope = boxes
        .chain(envelopes)
        .filter(|(crs, _, _)| *crs != FLIPPED_WGS84)
        .find_map(|(crs, lower, upper)| envelope(crs, &lower, &upper));

    for null in node
        .find_all("NullValue")
        .into_iter()
        .chain(node.find_all("nullValues").into_iter().flat_map(|n| n.find_all("singleValue")))
    {
        let text = null.text();
        if text.contains(INFINITY) {
            continue;
        }
        if let Ok(value) = text.parse::<f64>() {
            description.nodata.push(value);
        }
    }

    description
}

fn parse_v2(node: &Element) -> LayerDescription {
    let mut description = LayerDescription {
        identifier: node.child("CoverageId").map(|e| e.text().to_string()),
        ..LayerDescription::default()
    };

    if let Some(env) = node.path(&["boundedBy", "Envelope"]) {
        let lower = env.child("lowerCorner").map(|e| numbers(e.text()));
        let upper = env.child("upperCorner").map(|e| numbers(e.text()));
        if let (Some(crs), Some(mut lower), Some(mut upper)) = (env.attribute("srsName"), lower, upper) {
            let lat_first = env
                .attribute("axisLabels")
                .map(|labels| labels.trim_start().to_lowercase().starts_with("lat"))
                .unwrap_or(false);
            if lat_first && lower.len() >= 2 && upper.len() >= 2 {
                lower.swap(0, 1);
                upper.swap(0, 1);
            }
            description.envelope = envelope(crs, &lower, &upper);
        }
    }

    if let Some(record) = node.find("DataRecord") {
        for field in record.children_named("field") {
            description.bands.push(parse_band(field));
        }
    }

    description
}

fn parse_band(field: &Element) -> WcsBand {
    let mut band = WcsBand::new(field.attribute("name").unwrap_or_default());

    for nil in field.find_all("nilValue") {
        if let Ok(value) = nil.text().parse::<f64>() {
            band.nodata.push(value);
        }
    }

    if let Some(interval) = field.find("AllowedValues").and_then(|a| a.find("interval")) {
        if let [min, max] = numbers(interval.text())[..] {
            if min == max {
                band.nodata.push(min);
            } else {
                band.valid_range = Some((min, max));
            }
        }
    }

    band
}

/// Cell counts from `GridEnvelope` low/high, which are inclusive indices.
fn grid_shape(node: &Element) -> Option<GridShape> {
    let grid = node.find("GridEnvelope")?;
    let low = numbers(grid.child("low")?.text());
    let high = numbers(grid.child("high")?.text());
    if low.len() < 2 || high.len() < 2 {
        return None;
    }
    let width = high[0] - low[0] + 1.0;
    let height = high[1] - low[1] + 1.0;
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(GridShape::new(width as usize, height as usize))
}

fn envelope(crs: &str, lower: &[f64], upper: &[f64]) -> Option<(BoundingBox, CrsCode)> {
    let crs = match CrsCode::from_code_string(crs) {
        Ok(crs) => crs,
        Err(e) => {
            debug!(error = %e, "Ignoring envelope in unknown CRS");
            return None;
        }
    };
    match (lower, upper) {
        ([min_x, min_y, ..], [max_x, max_y, ..]) => {
            Some((BoundingBox::new(*min_x, *min_y, *max_x, *max_y), crs))
        }
        _ => None,
    }
}

fn wgs84_envelope(summary: &Element) -> Option<BoundingBox> {
    if let Some(bbox) = summary.child("WGS84BoundingBox") {
        let lower = numbers(bbox.child("LowerCorner")?.text());
        let upper = numbers(bbox.child("UpperCorner")?.text());
        return envelope("CRS:84", &lower, &upper).map(|(b, _)| b);
    }
    let env = summary.child("lonLatEnvelope")?;
    let corners: Vec<Vec<f64>> = env.children_named("pos").map(|p| numbers(p.text())).collect();
    match &corners[..] {
        [lower, upper] => envelope("CRS:84", lower, upper).map(|(b, _)| b),
        _ => None,
    }
}

fn check_exception(root: &Element, url: &str) -> Result<()> {
    if root.name != "ExceptionReport" && root.name != "ServiceExceptionReport" {
        return Ok(());
    }
    let message = root
        .find("ExceptionText")
        .or_else(|| root.find("ServiceException"))
        .map(|e| e.text().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            root.find("Exception")
                .and_then(|e| e.attribute("exceptionCode"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown exception".to_string());
    Err(WcsError::ServiceException {
        url: url.to_string(),
        message,
    })
}
