//! Remote process execution returning a GeoTIFF.
//!
//! The job is posted to `{serviceUrl}/processes/{processId}/execution` with
//! the request's space and time as inputs. The first result whose `type`
//! mentions GeoTIFF is downloaded through the coverage cache and encoded
//! like any other raster.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_processor::Scanner;
use geo_common::{Geometry, Notification, ValueType};
use serde_json::{json, Map, Value};
use storage::CacheKey;
use tracing::{debug, info, instrument};

use crate::adapter::{ContextRequest, Resource, ResourceAdapter};
use crate::context::AdapterContext;
use crate::error::{AdapterError, Result};
use crate::params::{self, ResourceParameters};

pub const SERVICE_URL: &str = "serviceUrl";
pub const PROCESS_ID: &str = "processId";
/// URL of a process definition sent along with the job.
pub const NAMESPACE: &str = "namespace";

/// Parameters naming the job inputs that receive the request's space and
/// time, with the input names used when a resource does not set them.
const SPACE_SHAPE: (&str, &str) = ("space.shape", "geometry");
const SPACE_RESOLUTION: (&str, &str) = ("space.resolution", "resolution");
const SPACE_PROJECTION: (&str, &str) = ("space.projection", "epsg");
const TIME_EXTENT: (&str, &str) = ("time.extent", "temporal_extent");

/// Parameters consumed by the adapter rather than forwarded as inputs.
const RESERVED: [&str; 13] = [
    SERVICE_URL,
    PROCESS_ID,
    NAMESPACE,
    params::NODATA,
    params::BAND,
    params::BAND_MIXER,
    params::TRANSFORM,
    params::INTERPOLATION,
    SPACE_SHAPE.0,
    SPACE_RESOLUTION.0,
    SPACE_PROJECTION.0,
    TIME_EXTENT.0,
    "synchronous",
];

pub struct ProcessAdapter {
    context: Arc<AdapterContext>,
}

impl ProcessAdapter {
    pub fn new(context: Arc<AdapterContext>) -> Self {
        Self { context }
    }

    fn execution_url(params: &ResourceParameters) -> Result<String> {
        let service = params.require_str(SERVICE_URL)?;
        let process = params.require_str(PROCESS_ID)?;
        Ok(format!(
            "{}/processes/{}/execution",
            service.trim_end_matches('/'),
            process
        ))
    }

    /// Run the job and return its outputs document.
    #[instrument(skip(self, body), fields(url = %url))]
    async fn execute(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .context
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::process(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::process(url, format!("HTTP {}", status.as_u16())));
        }
        response
            .json()
            .await
            .map_err(|e| AdapterError::process(url, format!("unreadable results: {}", e)))
    }
}

/// Job inputs: forwarded resource parameters plus the request's space and time.
fn job_inputs(params: &ResourceParameters, geometry: &Geometry) -> Result<Map<String, Value>> {
    let mut inputs: Map<String, Value> = params
        .iter()
        .filter(|(key, _)| !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(key)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let input_name = |(param, default): (&str, &str)| params.get_str(param).unwrap_or_else(|| default.to_string());

    let space = geometry.require_space()?;
    let e = space.envelope()?;
    inputs.insert(
        input_name(SPACE_SHAPE),
        json!({
            "type": "Polygon",
            "coordinates": [[
                [e.min_x, e.min_y],
                [e.max_x, e.min_y],
                [e.max_x, e.max_y],
                [e.min_x, e.max_y],
                [e.min_x, e.min_y]
            ]]
        }),
    );
    if let Ok((cell_width, _)) = space.resolution() {
        inputs.insert(input_name(SPACE_RESOLUTION), json!(cell_width));
    }
    inputs.insert(input_name(SPACE_PROJECTION), json!(space.crs.epsg()));

    if let Some(range) = geometry.time().and_then(|t| t.extent) {
        inputs.insert(
            input_name(TIME_EXTENT),
            json!([range.start.to_rfc3339(), range.end.to_rfc3339()]),
        );
    }
    Ok(inputs)
}

/// `href` of the first GeoTIFF result, in output-name order.
fn geotiff_href(results: &Value) -> Option<String> {
    let outputs = results.get("outputs").unwrap_or(results);
    let candidates: Vec<&Value> = match outputs {
        Value::Object(map) => map.values().collect(),
        Value::Array(list) => list.iter().collect(),
        _ => Vec::new(),
    };
    candidates.into_iter().find_map(|result| {
        let href = result.get("href")?.as_str()?;
        let media_type = result.get("type")?.as_str()?;
        media_type
            .to_lowercase()
            .contains("geotiff")
            .then(|| href.to_string())
    })
}

#[async_trait]
impl ResourceAdapter for ProcessAdapter {
    fn kind(&self) -> &'static str {
        "process"
    }

    #[instrument(skip_all, fields(process = ?resource.parameters.get(PROCESS_ID)))]
    async fn encode(
        &self,
        resource: &Resource,
        request: &ContextRequest,
        scanner: &mut (dyn Scanner + Send),
    ) -> Result<()> {
        let params = &resource.parameters;
        let url = Self::execution_url(params)?;
        let options = params.encode_options()?;
        let interpolation = request.interpolation_for(resource)?;

        let mut body = json!({ "inputs": job_inputs(params, &request.geometry)? });
        if let Some(namespace) = params.get_str(NAMESPACE) {
            body["namespace"] = Value::String(namespace);
        }
        debug!(body = %body, "Submitting process job");

        let results = self.execute(&url, &body).await?;
        let href = geotiff_href(&results)
            .ok_or_else(|| AdapterError::process(&url, "the job returned no GeoTIFF result"))?;
        info!(href = %href, "Process result");

        let key = CacheKey::new(url.clone(), request.geometry.clone(), interpolation);
        let path = self.context.cache.get(&key, &href).await?;

        scanner.notify(Notification::debug(format!("Encoding process result {}", href)));
        let source = self.context.read_file(path).await?;
        self.context
            .encode_coverage(source, &request.geometry, interpolation, &options, scanner)
            .await
    }

    async fn value_type(&self, _resource: &Resource) -> Result<ValueType> {
        Ok(ValueType::Number)
    }

    async fn validate(&self, resource: &Resource) -> Result<Notification> {
        let url = Self::execution_url(&resource.parameters)?;
        resource.parameters.nodata()?;
        Ok(Notification::info(format!("Process endpoint {}", url)))
    }
}
