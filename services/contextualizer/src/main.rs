//! Raster contextualization runner.
//!
//! Reads a job file naming a resource (local GeoTIFF, WCS layer, STAC
//! collection asset or remote process) and a target grid, validates the
//! resource, resamples it onto the grid and writes the cell values with
//! their notifications as JSON.

mod job;

use std::path::PathBuf;
use std::sync::Arc;

use adapters::{AdapterContext, AdapterRegistry, Contextualizer};
use anyhow::{Context, Result};
use clap::Parser;
use coverage_processor::{CoverageProcessorConfig, EncodedData};
use geo_common::{Notification, ValueType};
use serde::Serialize;
use stac_catalog::StacConfig;
use storage::{CoverageCacheConfig, HttpConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use job::{JobFile, Overrides};

#[derive(Parser, Debug)]
#[command(name = "contextualizer")]
#[command(about = "Resample a raster resource onto a target grid")]
struct Args {
    /// Job file (YAML) with the adapter, its parameters and the geometry
    #[arg(env = "CONTEXTUALIZER_JOB")]
    job: PathBuf,

    /// Geometry descriptor, overriding the job file
    #[arg(short, long)]
    geometry: Option<String>,

    /// Time window as "start/end", overriding the job file
    #[arg(short, long)]
    time: Option<String>,

    /// Observable kind (quantity, category, ...), overriding the job file
    #[arg(long)]
    observable: Option<String>,

    /// Interpolation kernel, overriding the resource's
    #[arg(short, long)]
    interpolation: Option<String>,

    /// Where to write the JSON result (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for cached coverage files
    #[arg(long, env = "COVERAGE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Cache size limit in megabytes
    #[arg(long, env = "COVERAGE_CACHE_MAX_MB")]
    cache_max_mb: Option<u64>,

    /// Only validate the resource
    #[arg(long)]
    validate_only: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// What gets written out.
#[derive(Debug, Serialize)]
struct Report {
    adapter: String,
    value_type: ValueType,
    validation: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<EncodedData>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays clean for the result.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let report = run(&args).await?;
    let json = serde_json::to_string_pretty(&report)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote result");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cache_config(args: &Args) -> CoverageCacheConfig {
    let mut config = CoverageCacheConfig::from_env();
    if let Some(dir) = &args.cache_dir {
        config = config.with_directory(dir);
    }
    if let Some(mb) = args.cache_max_mb {
        config = config.with_max_weight_mb(mb);
    }
    config
}

async fn run(args: &Args) -> Result<Report> {
    let job = JobFile::load(&args.job).await?;
    let overrides = Overrides {
        geometry: args.geometry.clone(),
        time: args.time.clone(),
        observable: args.observable.clone(),
        interpolation: args.interpolation.clone(),
    };
    let (resource, request) = job.into_request(&overrides)?;

    let context = AdapterContext::new(
        &HttpConfig::from_env(),
        cache_config(args),
        CoverageProcessorConfig::from_env(),
        StacConfig::from_env(),
    )
    .context("Failed to set up adapters")?;
    let contextualizer = Contextualizer::new(AdapterRegistry::with_defaults(Arc::new(context)));

    info!(adapter = %resource.adapter, job = %args.job.display(), "Starting contextualization");

    let validation = contextualizer
        .validate(&resource)
        .await
        .with_context(|| format!("Resource in {} is not valid", args.job.display()))?;
    validation.log();
    let value_type = contextualizer
        .value_type(&resource)
        .await
        .context("Could not determine the value type")?;

    let data = if args.validate_only {
        None
    } else {
        Some(
            contextualizer
                .contextualize(&resource, &request)
                .await
                .context("Contextualization failed")?,
        )
    };

    Ok(Report {
        adapter: resource.adapter,
        value_type,
        validation,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{fixtures::bbox, write_test_geotiff};

    fn args_for(job: PathBuf, cache_dir: PathBuf) -> Args {
        Args {
            job,
            geometry: None,
            time: None,
            observable: None,
            interpolation: None,
            output: None,
            cache_dir: Some(cache_dir),
            cache_max_mb: Some(10),
            validate_only: false,
            log_level: "info".to_string(),
        }
    }

    fn write_job(dir: &std::path::Path, raster: &std::path::Path) -> PathBuf {
        let yaml = format!(
            "adapter: raster\nparameters:\n  file: {}\n  nodata: -9999\ngeometry: \"S2(20,10){{bbox=[-75.0 -73.0 3.0 5.0],proj=EPSG:4326}}\"\n",
            raster.display()
        );
        let path = dir.join("job.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_raster_job() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("dem.tif");
        write_test_geotiff(&raster, 20, 10, bbox::TWO_DEGREES, 4326, &[12.5; 200], None);
        let job = write_job(dir.path(), &raster);

        let report = run(&args_for(job, dir.path().join("cache"))).await.unwrap();
        assert_eq!(report.adapter, "raster");
        assert_eq!(report.value_type, ValueType::Number);

        let data = report.data.unwrap();
        assert_eq!(data.values.len(), 200);
        assert!(data.values.iter().all(|v| *v == 12.5));
    }

    #[tokio::test]
    async fn test_validate_only() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("dem.tif");
        write_test_geotiff(&raster, 20, 10, bbox::TWO_DEGREES, 4326, &[1.0; 200], None);
        let mut args = args_for(write_job(dir.path(), &raster), dir.path().join("cache"));
        args.validate_only = true;

        let report = run(&args).await.unwrap();
        assert!(report.data.is_none());
        assert!(report.validation.message.contains("Raster imported"));
    }

    #[tokio::test]
    async fn test_missing_raster_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), &dir.path().join("absent.tif"));

        let err = run(&args_for(job, dir.path().join("cache"))).await.unwrap_err();
        assert!(err.to_string().contains("is not valid"));
    }
}
