//! Focused unit tests covering CLI configuration resolution.

use super::helpers::{Scratch, UNIT_SQUARE};
use super::*;
use crate::harvest::{ApiKeySource, HarvestArgs, HarvestConfig};
use crate::latest::{LatestArgs, LatestConfig};
use crate::plan::{Plan, PlanArgs, PlanConfig};
use camino::Utf8PathBuf;
use placesweep_core::{Boundary, GridStep};
use placesweep_data::RunSettings;
use rstest::rstest;
use std::time::Duration;

fn harvest_args() -> HarvestArgs {
    HarvestArgs {
        boundary: Some(Utf8PathBuf::from("boundary.geojson")),
        api_key: Some("secret".to_owned()),
        ..HarvestArgs::default()
    }
}

#[rstest]
fn harvest_defaults_match_run_settings() {
    let config = HarvestConfig::try_from(harvest_args()).expect("valid args");
    assert_eq!(config.settings, RunSettings::default());
    assert_eq!(config.output_dir, Utf8PathBuf::from("."));
    assert_eq!(config.endpoint, None);
    assert_eq!(config.timeout, None);
    assert_eq!(config.api_key, ApiKeySource::Inline("secret".to_owned()));
}

#[rstest]
fn harvest_overrides_reach_settings() {
    let args = HarvestArgs {
        step: Some(0.001),
        radius: Some(500),
        category: Some("cafe".to_owned()),
        concurrency: Some(2),
        timeout_secs: Some(10),
        prefix: Some("exports".to_owned()),
        dataset: Some("geo".to_owned()),
        table: Some("cafes".to_owned()),
        ..harvest_args()
    };
    let config = HarvestConfig::try_from(args).expect("valid args");
    assert_eq!(config.settings.step, 0.001);
    assert_eq!(config.settings.radius_m, 500);
    assert_eq!(config.settings.category.as_deref(), Some("cafe"));
    assert_eq!(config.settings.concurrency, 2);
    assert_eq!(config.settings.destination.prefix, "exports");
    assert_eq!(config.settings.destination.table_ref().to_string(), "geo.cafes");
    assert_eq!(config.timeout, Some(Duration::from_secs(10)));
}

#[rstest]
#[case::no_boundary(
    HarvestArgs { boundary: None, ..harvest_args() },
    ARG_BOUNDARY,
    ENV_HARVEST_BOUNDARY
)]
#[case::no_key(
    HarvestArgs { api_key: None, ..harvest_args() },
    ARG_API_KEY,
    ENV_HARVEST_API_KEY
)]
#[case::blank_key(
    HarvestArgs { api_key: Some("  ".to_owned()), ..harvest_args() },
    ARG_API_KEY,
    ENV_HARVEST_API_KEY
)]
fn harvest_requires_boundary_and_key(
    #[case] args: HarvestArgs,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let err = HarvestConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn blank_inline_key_falls_back_to_key_file() {
    let args = HarvestArgs {
        api_key: Some(String::new()),
        api_key_file: Some(Utf8PathBuf::from("key.txt")),
        ..harvest_args()
    };
    let config = HarvestConfig::try_from(args).expect("valid args");
    assert_eq!(
        config.api_key,
        ApiKeySource::File(Utf8PathBuf::from("key.txt"))
    );
}

#[rstest]
fn zero_timeout_is_rejected() {
    let args = HarvestArgs {
        timeout_secs: Some(0),
        ..harvest_args()
    };
    let err = HarvestConfig::try_from(args).expect_err("zero timeout should error");
    assert!(matches!(
        err,
        CliError::InvalidArgument {
            field: ARG_TIMEOUT_SECS,
            ..
        }
    ));
}

#[rstest]
fn key_file_contents_are_trimmed() {
    let scratch = Scratch::new();
    let path = scratch.write("key.txt", "  file-key\n");
    let key = ApiKeySource::File(path).resolve().expect("key file readable");
    assert_eq!(key, "file-key");
}

#[rstest]
fn empty_key_file_is_rejected() {
    let scratch = Scratch::new();
    let path = scratch.write("key.txt", "\n");
    let err = ApiKeySource::File(path)
        .resolve()
        .expect_err("empty key should error");
    assert!(matches!(
        err,
        CliError::InvalidArgument {
            field: ARG_API_KEY,
            ..
        }
    ));
}

#[rstest]
fn missing_key_file_names_the_flag() {
    let scratch = Scratch::new();
    let err = ApiKeySource::File(scratch.root().join("absent.txt"))
        .resolve()
        .expect_err("missing file should error");
    match err {
        CliError::ReadInput { field, .. } => assert_eq!(field, ARG_API_KEY_FILE),
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn debug_output_hides_inline_key() {
    let config = HarvestConfig::try_from(harvest_args()).expect("valid args");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("secret"), "{rendered}");
    assert!(rendered.contains("<redacted>"));
}

#[rstest]
#[case::zero(Some(0.0))]
#[case::negative(Some(-0.1))]
fn plan_rejects_unusable_steps(#[case] step: Option<f64>) {
    let args = PlanArgs {
        boundary: Some(Utf8PathBuf::from("boundary.geojson")),
        step,
    };
    let err = PlanConfig::try_from(args).expect_err("invalid step should error");
    assert!(matches!(err, CliError::InvalidStep(_)));
}

#[rstest]
fn plan_requires_boundary() {
    let err = PlanConfig::try_from(PlanArgs::default()).expect_err("missing boundary");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_BOUNDARY);
            assert_eq!(env, ENV_PLAN_BOUNDARY);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
fn plan_counts_unit_square_samples() {
    let boundary = Boundary::from_slice(UNIT_SQUARE.as_bytes()).expect("valid boundary");
    let plan = Plan::for_boundary(&boundary, GridStep::new(0.5).expect("valid step"));
    assert_eq!(plan.candidate_count, 4);
    assert_eq!(plan.sample_count, 4);
    assert_eq!(plan.bounds.max_lon, 1.0);
    assert_eq!(plan.bounds.min_lat, 0.0);
}

#[rstest]
fn latest_defaults_to_export_prefix() {
    let config = LatestConfig::from(LatestArgs::default());
    assert_eq!(config.prefix, "places_exports");
    assert_eq!(config.output_dir, Utf8PathBuf::from("."));
    assert!(!config.contents);
}

#[rstest]
fn clap_accepts_harvest_flags() {
    let cli = Cli::try_parse_from([
        "placesweep",
        "harvest",
        "--boundary",
        "area.geojson",
        "--step",
        "0.001",
        "--api-key-file",
        "key.txt",
    ])
    .expect("flags should parse");
    match cli.command {
        Command::Harvest(args) => {
            assert_eq!(args.boundary, Some(Utf8PathBuf::from("area.geojson")));
            assert_eq!(args.step, Some(0.001));
            assert_eq!(args.api_key_file, Some(Utf8PathBuf::from("key.txt")));
        }
        other => panic!("unexpected command {other:?}"),
    }
}
