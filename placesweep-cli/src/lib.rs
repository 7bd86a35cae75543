//! Command-line interface for placesweep.
//!
//! Three subcommands share one layered configuration scheme (CLI flags over
//! `PLACESWEEP_*` environment variables over configuration files):
//!
//! - `harvest` samples a boundary, searches every point and delivers the
//!   deduplicated features to the output directory;
//! - `plan` reports what a harvest would sample without calling the provider;
//! - `latest` names (and optionally prints) the newest artifact.
#![forbid(unsafe_code)]

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use serde::Serialize;

mod error;
mod harvest;
mod latest;
mod plan;

pub use error::CliError;

use harvest::HarvestArgs;
use latest::LatestArgs;
use plan::PlanArgs;

const ARG_BOUNDARY: &str = "boundary";
const ARG_STEP: &str = "step";
const ARG_RADIUS: &str = "radius";
const ARG_CATEGORY: &str = "category";
const ARG_CONCURRENCY: &str = "concurrency";
const ARG_API_KEY: &str = "api-key";
const ARG_API_KEY_FILE: &str = "api-key-file";
const ARG_ENDPOINT: &str = "endpoint";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_PREFIX: &str = "prefix";
const ARG_DATASET: &str = "dataset";
const ARG_TABLE: &str = "table";
const ARG_CONTENTS: &str = "contents";

const ENV_HARVEST_BOUNDARY: &str = "PLACESWEEP_CMDS_HARVEST_BOUNDARY";
const ENV_HARVEST_API_KEY: &str = "PLACESWEEP_CMDS_HARVEST_API_KEY";
const ENV_PLAN_BOUNDARY: &str = "PLACESWEEP_CMDS_PLAN_BOUNDARY";

/// Run the placesweep CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, or when
/// the selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(cli.command, &mut out)
}

fn dispatch(command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Harvest(args) => {
            let config = args.into_config()?;
            block_on(harvest::execute(config, out))
        }
        Command::Plan(args) => {
            let config = args.into_config()?;
            plan::execute(&config, out)
        }
        Command::Latest(args) => {
            let config = args.into_config()?;
            block_on(latest::execute(&config, out))
        }
    }
}

fn block_on<F>(future: F) -> Result<(), CliError>
where
    F: Future<Output = Result<(), CliError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(future)
}

/// Write `value` as pretty JSON followed by a newline.
fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let body = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writeln!(out, "{body}").map_err(CliError::WriteOutput)
}

#[derive(Debug, Parser)]
#[command(
    name = "placesweep",
    about = "Harvest nearby places inside a polygon boundary",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sample a boundary, search each point and deliver the features.
    Harvest(HarvestArgs),
    /// Report the sampling plan for a boundary without searching.
    Plan(PlanArgs),
    /// Show the newest artifact under a prefix.
    Latest(LatestArgs),
}

#[cfg(test)]
mod tests;
