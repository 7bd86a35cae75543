//! `latest` command: find the newest artifact under a prefix.

use std::io::{self, Write};

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placesweep_core::{ArtifactRef, ArtifactStore};
use placesweep_data::{Destination, FsArtifactStore, latest_artifact, read_feature_collection};
use serde::{Deserialize, Serialize};

use crate::{ARG_CONTENTS, ARG_OUTPUT_DIR, ARG_PREFIX, CliError, write_json};

/// CLI arguments for the `latest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the key and URI of the newest artifact under a prefix \
                 of the output directory, or its GeoJSON body with --contents.",
    about = "Show the newest artifact"
)]
#[ortho_config(prefix = "PLACESWEEP")]
pub(crate) struct LatestArgs {
    /// Directory holding the artifacts.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Artifact key prefix.
    #[arg(long = ARG_PREFIX, value_name = "prefix")]
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Print the artifact body instead of its location.
    #[arg(long = ARG_CONTENTS)]
    #[serde(default)]
    pub(crate) contents: bool,
}

impl LatestArgs {
    pub(crate) fn into_config(self) -> Result<LatestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(LatestConfig::from(merged))
    }
}

/// Resolved `latest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LatestConfig {
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) prefix: String,
    pub(crate) contents: bool,
}

impl From<LatestArgs> for LatestConfig {
    fn from(args: LatestArgs) -> Self {
        Self {
            output_dir: args.output_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            prefix: args
                .prefix
                .unwrap_or_else(|| Destination::default().prefix),
            contents: args.contents,
        }
    }
}

#[derive(Debug, Serialize)]
struct LatestSummary {
    #[serde(flatten)]
    artifact: ArtifactRef,
    /// `None` when the body is not a readable feature collection.
    feature_count: Option<usize>,
}

pub(crate) async fn execute(config: &LatestConfig, out: &mut dyn Write) -> Result<(), CliError> {
    let store = match FsArtifactStore::open_existing(&config.output_dir) {
        Ok(store) => store,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CliError::NoArtifact {
                prefix: config.prefix.clone(),
            });
        }
        Err(source) => {
            return Err(CliError::OpenOutputDir {
                path: config.output_dir.clone(),
                source,
            });
        }
    };
    let key = latest_artifact(&store, &config.prefix)
        .await?
        .ok_or_else(|| CliError::NoArtifact {
            prefix: config.prefix.clone(),
        })?;
    let body = store.get(&key).await?;

    if config.contents {
        out.write_all(&body).map_err(CliError::WriteOutput)?;
        return writeln!(out).map_err(CliError::WriteOutput);
    }

    let feature_count = read_feature_collection(&body)
        .ok()
        .map(|features| features.len());
    write_json(
        out,
        &LatestSummary {
            artifact: store.artifact_ref(&key),
            feature_count,
        },
    )
}
