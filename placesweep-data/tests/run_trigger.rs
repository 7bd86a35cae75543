//! Integration tests for the run trigger and the local adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use geo::{LineString, Polygon};
use placesweep_core::{ArtifactStore, Boundary, PageRequest, PlaceSearch, SearchError, SearchPage};
use placesweep_data::test_support::{
    MemoryArtifactStore, MemoryWarehouse, StubPlaceSearch, page, place,
};
use placesweep_data::{
    BoundaryLoadError, CancelFlag, FsArtifactStore, NdjsonWarehouse, RunContext, RunSettings,
    latest_artifact, load_boundary, read_feature_collection, run_harvest, spawn_harvest,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

fn unit_square() -> Boundary {
    let ring: LineString<f64> = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].into();
    Boundary::from_polygon(Polygon::new(ring, Vec::new())).expect("fixture polygon")
}

fn settings() -> RunSettings {
    RunSettings {
        step: 0.5,
        ..RunSettings::default()
    }
}

/// Search that finds one place at every queried point and raises `cancel`
/// once it has answered `after` requests.
struct CancellingSearch {
    cancel: CancelFlag,
    after: u64,
    calls: AtomicU64,
}

#[async_trait]
impl PlaceSearch for CancellingSearch {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, SearchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.after {
            self.cancel.cancel();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        let PageRequest::Initial(query) = request else {
            return Ok(SearchPage::default());
        };
        let (lat, lon) = (query.location.lat(), query.location.lon());
        Ok(page(vec![place(&format!("p{n}"), lat, lon)], None))
    }
}

#[fixture]
fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    (temp, root)
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn spawned_run_reports_through_its_handle() {
    let context = Arc::new(RunContext {
        search: Arc::new(
            StubPlaceSearch::new().with_page_at(0.5, 0.5, page(vec![place("a", 0.5, 0.5)], None)),
        ),
        artifacts: Arc::new(MemoryArtifactStore::new()),
        warehouse: Arc::new(MemoryWarehouse::new()),
    });

    let handle = spawn_harvest(context, unit_square(), settings());
    assert!(!handle.is_finished());
    let report = handle.join().await.expect("run succeeds");

    assert_eq!(report.feature_count, 1);
    assert_eq!(report.statistics.points_visited, 4);
    assert!(!report.cancelled);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelled_run_still_delivers() {
    let search = Arc::new(StubPlaceSearch::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let context = Arc::new(RunContext {
        search: search.clone(),
        artifacts: artifacts.clone(),
        warehouse: Arc::new(MemoryWarehouse::new()),
    });

    let handle = spawn_harvest(context, unit_square(), settings());
    handle.cancel();
    let report = handle.join().await.expect("cancelled runs still deliver");

    assert!(report.cancelled);
    assert_eq!(report.statistics.points_visited, 0);
    assert_eq!(search.call_count(), 0);
    let bytes = artifacts.get(&report.artifact.key).await.expect("artifact exists");
    assert!(read_feature_collection(&bytes).expect("parses").is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelling_mid_run_stops_new_points_and_delivers_partial_results() {
    let ring: LineString<f64> = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)].into();
    let boundary =
        Boundary::from_polygon(Polygon::new(ring, Vec::new())).expect("fixture polygon");
    let cancel = CancelFlag::new();
    let search = Arc::new(CancellingSearch {
        cancel: cancel.clone(),
        after: 3,
        calls: AtomicU64::new(0),
    });
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let context = RunContext {
        search: search.clone(),
        artifacts: artifacts.clone(),
        warehouse: Arc::new(MemoryWarehouse::new()),
    };
    let settings = RunSettings {
        concurrency: 3,
        ..settings()
    };

    let report = run_harvest(&context, &boundary, &settings, &cancel)
        .await
        .expect("cancelled runs still deliver");

    assert!(report.cancelled);
    assert_eq!(search.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.call_count, 3);
    assert_eq!(report.statistics.points_visited, 3);
    assert_eq!(report.feature_count, 3);
    let bytes = artifacts.get(&report.artifact.key).await.expect("artifact exists");
    let mut ids: Vec<_> = read_feature_collection(&bytes)
        .expect("parses")
        .into_iter()
        .map(|feature| feature.place_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn invalid_settings_fail_before_searching() {
    let search = Arc::new(StubPlaceSearch::new());
    let context = Arc::new(RunContext {
        search: search.clone(),
        artifacts: Arc::new(MemoryArtifactStore::new()),
        warehouse: Arc::new(MemoryWarehouse::new()),
    });
    let settings = RunSettings {
        radius_m: 0,
        ..settings()
    };

    let err = spawn_harvest(context, unit_square(), settings)
        .join()
        .await
        .expect_err("zero radius is rejected");

    assert_eq!(err.kind(), "invalid_configuration");
    assert_eq!(search.call_count(), 0);
}

#[rstest]
#[tokio::test]
async fn filesystem_run_round_trips(temp_root: (TempDir, Utf8PathBuf)) {
    let (_temp, root) = temp_root;
    let artifacts = Arc::new(FsArtifactStore::open(&root).expect("open store"));
    let context = Arc::new(RunContext {
        search: Arc::new(StubPlaceSearch::new().with_page_at(
            0.0,
            0.5,
            page(vec![place("x", 0.0, 0.5), place("y", 0.25, 0.5)], None),
        )),
        artifacts: artifacts.clone(),
        warehouse: Arc::new(NdjsonWarehouse::open(&root).expect("open warehouse")),
    });

    let report = spawn_harvest(context, unit_square(), settings())
        .join()
        .await
        .expect("run succeeds");

    assert!(report.artifact.uri.starts_with("file://"));
    let latest = latest_artifact(artifacts.as_ref(), "places_exports")
        .await
        .expect("list")
        .expect("one artifact");
    assert_eq!(latest, report.artifact.key);
    let bytes = artifacts.get(&latest).await.expect("artifact exists");
    let mut ids: Vec<_> = read_feature_collection(&bytes)
        .expect("parses")
        .into_iter()
        .map(|feature| feature.place_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["x", "y"]);
    let table = std::fs::read_to_string(root.join("places/pois.ndjson")).expect("table file");
    assert_eq!(table.lines().count(), 2);
}

#[rstest]
#[tokio::test]
async fn latest_artifact_prefers_newest_and_ignores_strangers() {
    let store = MemoryArtifactStore::new();
    for key in [
        "exports/places_20240101T000000Z.geojson",
        "exports/places_20240301T000000Z.geojson",
        "exports/places_20240301T000000Z_1.geojson",
        "exports/readme.txt",
        "exports-old/places_20250101T000000Z.geojson",
    ] {
        store.put(key, "application/geo+json", b"{}").await.expect("put");
    }

    let latest = latest_artifact(&store, "exports").await.expect("list");

    assert_eq!(
        latest.as_deref(),
        Some("exports/places_20240301T000000Z_1.geojson")
    );
    assert_eq!(latest_artifact(&store, "missing").await.expect("list"), None);
}

#[rstest]
#[tokio::test]
async fn boundaries_load_from_storage() {
    let store = MemoryArtifactStore::new();
    let document = "\u{feff}{\"type\":\"Feature\",\"properties\":{},\"geometry\":{\"type\":\"Polygon\",\"coordinates\":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}";
    store
        .put("boundaries/square.geojson", "application/geo+json", document.as_bytes())
        .await
        .expect("put");

    let boundary = load_boundary(&store, "boundaries/square.geojson")
        .await
        .expect("boundary loads");
    assert_eq!(boundary, unit_square());

    let err = load_boundary(&store, "boundaries/missing.geojson")
        .await
        .expect_err("missing boundary");
    assert!(matches!(err, BoundaryLoadError::Fetch { .. }));
}
