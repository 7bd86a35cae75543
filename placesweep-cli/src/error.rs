//! Error types emitted by the placesweep CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use placesweep_core::{GeometryError, GridError, StoreError};
use placesweep_data::HarvestError;
use placesweep_data::search::ProviderBuildError;
use thiserror::Error;

/// Errors emitted by the placesweep CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option was supplied with an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },
    /// A referenced input file could not be read.
    #[error("failed to read {field} file {path:?}: {source}")]
    ReadInput {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The boundary document is unusable.
    #[error("boundary {path:?} is invalid: {source}")]
    InvalidBoundary {
        path: Utf8PathBuf,
        #[source]
        source: GeometryError,
    },
    /// The grid step was rejected.
    #[error(transparent)]
    InvalidStep(#[from] GridError),
    /// The output directory could not be opened.
    #[error("failed to open output directory {path:?}: {source}")]
    OpenOutputDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Constructing the place search client failed.
    #[error("failed to build place search client for {endpoint:?}: {source}")]
    BuildSearchClient {
        endpoint: String,
        #[source]
        source: ProviderBuildError,
    },
    /// Starting the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The harvest run failed. Its JSON failure payload has already been
    /// written to the output.
    #[error("harvest failed: {0}")]
    Harvest(#[source] HarvestError),
    /// Reading the artifact store failed.
    #[error("failed to read artifact store: {0}")]
    Store(#[from] StoreError),
    /// No artifact exists under the prefix.
    #[error("no artifact found under {prefix:?}")]
    NoArtifact { prefix: String },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
