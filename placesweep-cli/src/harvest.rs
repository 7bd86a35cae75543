//! `harvest` command: sample, search, deliver.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use log::warn;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placesweep_core::Boundary;
use placesweep_data::harvest::DEFAULT_CONCURRENCY;
use placesweep_data::run::{DEFAULT_RADIUS_M, DEFAULT_STEP};
use placesweep_data::search::{HttpPlaceSearch, HttpPlaceSearchConfig, PaginationPolicy};
use placesweep_data::{
    CancelFlag, Destination, FsArtifactStore, HarvestError, NdjsonWarehouse, RunContext,
    RunFailure, RunSettings, spawn_harvest,
};
use placesweep_fs::read_utf8_file;
use serde::{Deserialize, Serialize};

use crate::{
    ARG_API_KEY, ARG_API_KEY_FILE, ARG_BOUNDARY, ARG_CATEGORY, ARG_CONCURRENCY, ARG_DATASET,
    ARG_ENDPOINT, ARG_OUTPUT_DIR, ARG_PREFIX, ARG_RADIUS, ARG_STEP, ARG_TABLE, ARG_TIMEOUT_SECS,
    CliError, ENV_HARVEST_API_KEY, ENV_HARVEST_BOUNDARY, write_json,
};

/// CLI arguments for the `harvest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Sample a GeoJSON polygon on a regular grid, run a nearby \
                 search at every sample point, deduplicate the results by \
                 place id and write them as a GeoJSON artifact plus NDJSON \
                 warehouse rows under the output directory. Prints a JSON \
                 run report.",
    about = "Harvest places inside a boundary"
)]
#[ortho_config(prefix = "PLACESWEEP")]
pub(crate) struct HarvestArgs {
    /// Path to the GeoJSON boundary (Polygon or MultiPolygon).
    #[arg(long = ARG_BOUNDARY, value_name = "path")]
    #[serde(default)]
    pub(crate) boundary: Option<Utf8PathBuf>,
    /// Grid step in degrees.
    #[arg(long = ARG_STEP, value_name = "degrees")]
    #[serde(default)]
    pub(crate) step: Option<f64>,
    /// Search radius in metres.
    #[arg(long = ARG_RADIUS, value_name = "metres")]
    #[serde(default)]
    pub(crate) radius: Option<u32>,
    /// Provider category filter, e.g. "restaurant".
    #[arg(long = ARG_CATEGORY, value_name = "type")]
    #[serde(default)]
    pub(crate) category: Option<String>,
    /// Number of sample points searched at once.
    #[arg(long = ARG_CONCURRENCY, value_name = "n")]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,
    /// Place search API key.
    #[arg(long = ARG_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) api_key: Option<String>,
    /// File holding the place search API key.
    #[arg(long = ARG_API_KEY_FILE, value_name = "path")]
    #[serde(default)]
    pub(crate) api_key_file: Option<Utf8PathBuf>,
    /// Override the nearby search endpoint.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Directory receiving artifacts and warehouse tables.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Artifact key prefix.
    #[arg(long = ARG_PREFIX, value_name = "prefix")]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Warehouse dataset.
    #[arg(long = ARG_DATASET, value_name = "name")]
    #[serde(default)]
    pub(crate) dataset: Option<String>,
    /// Warehouse table.
    #[arg(long = ARG_TABLE, value_name = "name")]
    #[serde(default)]
    pub(crate) table: Option<String>,
}

impl HarvestArgs {
    pub(crate) fn into_config(self) -> Result<HarvestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        HarvestConfig::try_from(merged)
    }
}

/// Where the API key comes from.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum ApiKeySource {
    Inline(String),
    File(Utf8PathBuf),
}

impl fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl ApiKeySource {
    pub(crate) fn resolve(&self) -> Result<String, CliError> {
        let key = match self {
            Self::Inline(key) => key.trim().to_owned(),
            Self::File(path) => {
                let bytes = read_utf8_file(path).map_err(|source| CliError::ReadInput {
                    field: ARG_API_KEY_FILE,
                    path: path.clone(),
                    source,
                })?;
                String::from_utf8_lossy(&bytes).trim().to_owned()
            }
        };
        if key.is_empty() {
            return Err(CliError::InvalidArgument {
                field: ARG_API_KEY,
                reason: "must not be empty",
            });
        }
        Ok(key)
    }
}

/// Resolved `harvest` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HarvestConfig {
    pub(crate) boundary: Utf8PathBuf,
    pub(crate) api_key: ApiKeySource,
    pub(crate) endpoint: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) settings: RunSettings,
}

impl TryFrom<HarvestArgs> for HarvestConfig {
    type Error = CliError;

    fn try_from(args: HarvestArgs) -> Result<Self, Self::Error> {
        let boundary = args.boundary.ok_or(CliError::MissingArgument {
            field: ARG_BOUNDARY,
            env: ENV_HARVEST_BOUNDARY,
        })?;
        let api_key = args
            .api_key
            .filter(|key| !key.trim().is_empty())
            .map(ApiKeySource::Inline)
            .or_else(|| args.api_key_file.map(ApiKeySource::File))
            .ok_or(CliError::MissingArgument {
                field: ARG_API_KEY,
                env: ENV_HARVEST_API_KEY,
            })?;
        let timeout = match args.timeout_secs {
            Some(0) => {
                return Err(CliError::InvalidArgument {
                    field: ARG_TIMEOUT_SECS,
                    reason: "must be at least one second",
                });
            }
            other => other.map(Duration::from_secs),
        };

        let defaults = Destination::default();
        let settings = RunSettings {
            step: args.step.unwrap_or(DEFAULT_STEP),
            radius_m: args.radius.unwrap_or(DEFAULT_RADIUS_M),
            category: args.category.filter(|category| !category.is_empty()),
            concurrency: args.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            pagination: PaginationPolicy::default(),
            destination: Destination {
                prefix: args.prefix.unwrap_or(defaults.prefix),
                dataset: args.dataset.unwrap_or(defaults.dataset),
                table: args.table.unwrap_or(defaults.table),
            },
        };

        Ok(Self {
            boundary,
            api_key,
            endpoint: args.endpoint,
            timeout,
            output_dir: args.output_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            settings,
        })
    }
}

impl HarvestConfig {
    fn build_context(&self) -> Result<RunContext, CliError> {
        let mut search_config = HttpPlaceSearchConfig::new(self.api_key.resolve()?);
        if let Some(endpoint) = &self.endpoint {
            search_config = search_config.with_endpoint(endpoint.clone());
        }
        if let Some(timeout) = self.timeout {
            search_config = search_config.with_timeout(timeout);
        }
        let endpoint = search_config.endpoint.clone();
        let search = HttpPlaceSearch::with_config(search_config)
            .map_err(|source| CliError::BuildSearchClient { endpoint, source })?;

        let open_error = |source| CliError::OpenOutputDir {
            path: self.output_dir.clone(),
            source,
        };
        let artifacts = FsArtifactStore::open(&self.output_dir).map_err(open_error)?;
        let warehouse = NdjsonWarehouse::open(&self.output_dir).map_err(open_error)?;

        Ok(RunContext {
            search: Arc::new(search),
            artifacts: Arc::new(artifacts),
            warehouse: Arc::new(warehouse),
        })
    }

    fn load_boundary(&self) -> Result<Result<Boundary, HarvestError>, CliError> {
        let bytes = read_utf8_file(&self.boundary).map_err(|source| CliError::ReadInput {
            field: ARG_BOUNDARY,
            path: self.boundary.clone(),
            source,
        })?;
        Ok(Boundary::from_slice(&bytes).map_err(HarvestError::from))
    }
}

/// Run a harvest and print its report.
///
/// Harvest failures print a `RunFailure` payload before returning
/// [`CliError::Harvest`]. Ctrl-C cancels the run: in-flight points finish and
/// the features gathered so far are still delivered.
pub(crate) async fn execute(config: HarvestConfig, out: &mut dyn Write) -> Result<(), CliError> {
    if let Err(err) = config.settings.validate() {
        return Err(report_failure(out, err));
    }
    let boundary = match config.load_boundary()? {
        Ok(boundary) => boundary,
        Err(err) => return Err(report_failure(out, err)),
    };
    let context = config.build_context()?;

    let handle = spawn_harvest(Arc::new(context), boundary, config.settings);
    let watcher = tokio::spawn(cancel_on_interrupt(handle.cancel_flag()));
    let outcome = handle.join().await;
    watcher.abort();

    match outcome {
        Ok(report) => write_json(out, &report),
        Err(err) => Err(report_failure(out, err)),
    }
}

async fn cancel_on_interrupt(cancel: CancelFlag) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, delivering features gathered so far");
            cancel.cancel();
        }
        Err(err) => warn!("cannot listen for interrupts: {err}"),
    }
}

fn report_failure(out: &mut dyn Write, err: HarvestError) -> CliError {
    if let Err(write_err) = write_json(out, &RunFailure::from(&err)) {
        warn!("failed to print run failure: {write_err}");
    }
    CliError::Harvest(err)
}
