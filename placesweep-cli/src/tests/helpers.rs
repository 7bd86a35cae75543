//! Scratch directories and canned documents for CLI tests.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) const UNIT_SQUARE: &str =
    r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#;

pub(super) const POINT_DOCUMENT: &str = r#"{"type":"Point","coordinates":[73.85,18.52]}"#;

/// A temporary directory addressed with UTF-8 paths.
#[derive(Debug)]
pub(super) struct Scratch {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Scratch {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn write(&self, relative: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directories");
        }
        fs::write(&path, contents).expect("write scratch file");
        path
    }

    pub(super) fn files_under(&self, relative: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.root.join(relative)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|entry| {
                entry
                    .expect("directory entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

/// A minimal artifact body holding one point feature per id.
pub(super) fn artifact_body(place_ids: &[&str]) -> String {
    let features: Vec<serde_json::Value> = place_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.5, 0.5] },
                "properties": {
                    "place_id": id,
                    "collected_at": "2024-05-01T12:00:00.000000Z"
                }
            })
        })
        .collect();
    serde_json::json!({ "type": "FeatureCollection", "features": features }).to_string()
}

/// Parse `args` as a full command line and run it, capturing stdout.
pub(super) fn invoke(args: &[String], out: &mut Vec<u8>) -> Result<(), CliError> {
    let cli = Cli::try_parse_from(args)?;
    dispatch(cli.command, out)
}
