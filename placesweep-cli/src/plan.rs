//! `plan` command: describe the sampling grid for a boundary.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placesweep_core::{Boundary, GridStep, SampleGrid};
use placesweep_data::run::DEFAULT_STEP;
use placesweep_fs::read_utf8_file;
use serde::{Deserialize, Serialize};

use crate::{ARG_BOUNDARY, ARG_STEP, CliError, ENV_PLAN_BOUNDARY, write_json};

/// CLI arguments for the `plan` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load a GeoJSON boundary and report its bounding box, the \
                 number of grid candidates and the number of sample points \
                 that fall inside it. No search requests are made.",
    about = "Report the sampling plan for a boundary"
)]
#[ortho_config(prefix = "PLACESWEEP")]
pub(crate) struct PlanArgs {
    /// Path to the GeoJSON boundary (Polygon or MultiPolygon).
    #[arg(long = ARG_BOUNDARY, value_name = "path")]
    #[serde(default)]
    pub(crate) boundary: Option<Utf8PathBuf>,
    /// Grid step in degrees.
    #[arg(long = ARG_STEP, value_name = "degrees")]
    #[serde(default)]
    pub(crate) step: Option<f64>,
}

impl PlanArgs {
    pub(crate) fn into_config(self) -> Result<PlanConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PlanConfig::try_from(merged)
    }
}

/// Resolved `plan` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlanConfig {
    pub(crate) boundary: Utf8PathBuf,
    pub(crate) step: GridStep,
}

impl TryFrom<PlanArgs> for PlanConfig {
    type Error = CliError;

    fn try_from(args: PlanArgs) -> Result<Self, Self::Error> {
        let boundary = args.boundary.ok_or(CliError::MissingArgument {
            field: ARG_BOUNDARY,
            env: ENV_PLAN_BOUNDARY,
        })?;
        let step = GridStep::new(args.step.unwrap_or(DEFAULT_STEP))?;
        Ok(Self { boundary, step })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Bounds {
    pub(crate) min_lon: f64,
    pub(crate) min_lat: f64,
    pub(crate) max_lon: f64,
    pub(crate) max_lat: f64,
}

/// Output of the `plan` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Plan {
    pub(crate) bounds: Bounds,
    pub(crate) step: f64,
    pub(crate) candidate_count: u64,
    pub(crate) sample_count: u64,
}

impl Plan {
    pub(crate) fn for_boundary(boundary: &Boundary, step: GridStep) -> Self {
        let rect = boundary.bounds();
        let grid = SampleGrid::new(boundary, step);
        let candidate_count = grid.candidate_count();
        let sample_count = grid.fold(0_u64, |count, _| count.saturating_add(1));
        Self {
            bounds: Bounds {
                min_lon: rect.min().x,
                min_lat: rect.min().y,
                max_lon: rect.max().x,
                max_lat: rect.max().y,
            },
            step: step.degrees(),
            candidate_count,
            sample_count,
        }
    }
}

pub(crate) fn load(config: &PlanConfig) -> Result<Plan, CliError> {
    let bytes = read_utf8_file(&config.boundary).map_err(|source| CliError::ReadInput {
        field: ARG_BOUNDARY,
        path: config.boundary.clone(),
        source,
    })?;
    let boundary = Boundary::from_slice(&bytes).map_err(|source| CliError::InvalidBoundary {
        path: config.boundary.clone(),
        source,
    })?;
    Ok(Plan::for_boundary(&boundary, config.step))
}

pub(crate) fn execute(config: &PlanConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let plan = load(config)?;
    write_json(out, &plan)
}
