//! Full collection runs against an in-memory boundary API: coverage of every
//! (country, ADM level) pair, the freshness gate, and all-or-nothing writes.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use geoguardian::config::DatasetPaths;
use geoguardian::data::cache::{self, RefreshPolicy, RefreshReason};
use geoguardian::data::registry::{load_registry, METADATA_DATASET, MISSING_DATASET};
use geoguardian::data::AdmLevel;
use geoguardian::fetch::{
    run_full_analysis, BoundaryFetcher, CollectError, Collector, DatasetOrigin, FetchError,
    HttpRequest, HttpResponse, HttpTransport, RetryPolicy, TransportError,
};

const BASE_URL: &str = "https://boundaries.test/gbOpen";

/// Serves canned layers by URL; anything unlisted is a 404.
#[derive(Default)]
struct FakeBoundaryApi {
    layers: HashMap<String, (u16, String)>,
    calls: AtomicUsize,
}

impl FakeBoundaryApi {
    fn layer(mut self, iso: &str, adm: &str, status: u16, body: &str) -> Self {
        self.layers
            .insert(format!("{BASE_URL}/{iso}/{adm}/"), (status, body.to_string()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeBoundaryApi {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.layers.get(&request.url) {
            Some((status, body)) => HttpResponse::new(*status, body.clone()),
            None => HttpResponse::new(404, "Not Found"),
        })
    }
}

fn testland_adm0() -> String {
    serde_json::json!({
        "boundaryName": "Testland National",
        "boundaryLicense": "Public Domain",
        "licenseSource": "https://testland.test/license",
        "boundarySourceURL": "https://testland.test",
        "boundaryYearRepresented": 2021,
        "gjDownloadURL": "https://testland.test/TST_ADM0.geojson"
    })
    .to_string()
}

fn workspace(countries: &[(&str, &str)]) -> (TempDir, DatasetPaths) {
    let dir = TempDir::new().unwrap();
    let iso = dir.path().join("iso_codes.csv");
    let mut csv = String::from("Country or Area,ISO-alpha3 code\n");
    for (name, code) in countries {
        csv.push_str(&format!("{name},{code}\n"));
    }
    fs::write(&iso, csv).unwrap();
    let paths = DatasetPaths {
        iso,
        metadata: dir.path().join("out/geoBoundaries_metadata.csv"),
        missing: dir.path().join("out/missing_layers.csv"),
        registry: dir.path().join("out/registry.json"),
    };
    (dir, paths)
}

fn collector(api: Arc<FakeBoundaryApi>) -> Collector {
    Collector::new(
        BoundaryFetcher::new(api, BASE_URL)
            .with_retry(RetryPolicy::no_delay(3))
            .with_request_delay(Duration::ZERO),
    )
}

#[tokio::test]
async fn testland_run_records_adm0_and_four_missing_layers() {
    let (_dir, paths) = workspace(&[("Testland", "TST")]);
    let api = Arc::new(FakeBoundaryApi::default().layer("TST", "ADM0", 200, &testland_adm0()));

    let outcome = run_full_analysis(&paths, RefreshPolicy::Never, &collector(api.clone()))
        .await
        .unwrap();

    assert_eq!(
        outcome.origin,
        DatasetOrigin::Refreshed {
            reason: RefreshReason::NoCache
        }
    );
    let records = &outcome.collection.records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].country, "Testland");
    assert_eq!(records[0].boundary_type, AdmLevel::Adm0);
    assert_eq!(records[0].boundary_name, "Testland National");
    assert_eq!(records[0].year, "2021");

    let missing: Vec<AdmLevel> = outcome.collection.missing.iter().map(|m| m.adm_level).collect();
    assert_eq!(
        missing,
        vec![AdmLevel::Adm1, AdmLevel::Adm2, AdmLevel::Adm3, AdmLevel::Adm4]
    );
    assert!(outcome.collection.missing.iter().all(|m| m.iso == "TST" && m.country == "Testland"));
    assert_eq!(api.calls(), 5);

    let persisted = cache::read_collection(&paths.metadata, &paths.missing).unwrap();
    assert_eq!(persisted, outcome.collection);

    let registry = load_registry(&paths.registry).expect("registry should be written");
    assert_eq!(registry[METADATA_DATASET].rows, Some(1));
    assert_eq!(registry[MISSING_DATASET].rows, Some(4));
    assert_eq!(registry[METADATA_DATASET].source, BASE_URL);
}

#[tokio::test]
async fn every_pair_is_either_a_record_or_missing() {
    let (_dir, paths) = workspace(&[("Testland", "TST"), ("Otherland", "OTH"), ("Nowhere", "NWH")]);
    let api = Arc::new(
        FakeBoundaryApi::default()
            .layer("TST", "ADM0", 200, &testland_adm0())
            .layer("OTH", "ADM0", 200, &testland_adm0())
            .layer("OTH", "ADM1", 200, &format!("[{}]", testland_adm0()))
            .layer("OTH", "ADM3", 200, &testland_adm0()),
    );

    let collection = run_full_analysis(&paths, RefreshPolicy::AlwaysRefresh, &collector(api))
        .await
        .unwrap()
        .collection;

    assert_eq!(collection.pair_count(), 3 * AdmLevel::ALL.len());
    let found: HashSet<(String, AdmLevel)> = collection
        .records
        .iter()
        .map(|r| (r.iso.clone(), r.boundary_type))
        .collect();
    let missing: HashSet<(String, AdmLevel)> = collection
        .missing
        .iter()
        .map(|m| (m.iso.clone(), m.adm_level))
        .collect();
    assert!(found.is_disjoint(&missing));
    for iso in ["TST", "OTH", "NWH"] {
        for adm in AdmLevel::ALL {
            let key = (iso.to_string(), adm);
            assert!(found.contains(&key) || missing.contains(&key), "{iso} {adm} unaccounted for");
        }
    }
    assert_eq!(found.len(), 4);
}

#[tokio::test]
async fn fatal_fetch_error_keeps_previous_dataset() {
    let (_dir, paths) = workspace(&[("Testland", "TST"), ("Brokenland", "BRK")]);
    let good = Arc::new(FakeBoundaryApi::default().layer("TST", "ADM0", 200, &testland_adm0()));
    run_full_analysis(&paths, RefreshPolicy::Never, &collector(good))
        .await
        .unwrap();
    let metadata_before = fs::read_to_string(&paths.metadata).unwrap();
    let missing_before = fs::read_to_string(&paths.missing).unwrap();

    let broken = Arc::new(
        FakeBoundaryApi::default()
            .layer("TST", "ADM0", 200, &testland_adm0())
            .layer("BRK", "ADM2", 503, "unavailable"),
    );
    let err = run_full_analysis(&paths, RefreshPolicy::AlwaysRefresh, &collector(broken.clone()))
        .await
        .unwrap_err();

    match err {
        CollectError::Fetch {
            iso,
            adm,
            source: FetchError::FetchFailed { attempts, .. },
            ..
        } => {
            assert_eq!(iso, "BRK");
            assert_eq!(adm, AdmLevel::Adm2);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected a fetch failure, got {other:?}"),
    }
    // 5 layers for TST, ADM0..ADM1 for BRK, then 4 attempts at ADM2.
    assert_eq!(broken.calls(), 5 + 2 + 4);
    assert_eq!(fs::read_to_string(&paths.metadata).unwrap(), metadata_before);
    assert_eq!(fs::read_to_string(&paths.missing).unwrap(), missing_before);
}

#[tokio::test]
async fn fresh_cache_is_reused_without_network_calls() {
    let (_dir, paths) = workspace(&[("Testland", "TST")]);
    let api = Arc::new(FakeBoundaryApi::default().layer("TST", "ADM0", 200, &testland_adm0()));
    let collector = collector(api.clone());

    let first = run_full_analysis(&paths, RefreshPolicy::MaxAgeDays(7), &collector)
        .await
        .unwrap();
    let second = run_full_analysis(&paths, RefreshPolicy::MaxAgeDays(7), &collector)
        .await
        .unwrap();

    assert_eq!(second.origin, DatasetOrigin::Cached { age_days: 0 });
    assert_eq!(second.collection, first.collection);
    assert_eq!(api.calls(), 5);
}

#[tokio::test]
async fn metadata_without_missing_file_triggers_refresh() {
    let (_dir, paths) = workspace(&[("Testland", "TST")]);
    let api = Arc::new(FakeBoundaryApi::default().layer("TST", "ADM0", 200, &testland_adm0()));
    let collector = collector(api.clone());
    run_full_analysis(&paths, RefreshPolicy::Never, &collector)
        .await
        .unwrap();
    fs::remove_file(&paths.missing).unwrap();

    let outcome = run_full_analysis(&paths, RefreshPolicy::Never, &collector)
        .await
        .unwrap();

    assert_eq!(
        outcome.origin,
        DatasetOrigin::Refreshed {
            reason: RefreshReason::IncompleteCache
        }
    );
    assert!(Path::new(&paths.missing).exists());
    assert_eq!(api.calls(), 10);
}

#[tokio::test]
async fn missing_country_table_is_reported() {
    let (_dir, mut paths) = workspace(&[]);
    paths.iso = paths.iso.with_file_name("absent.csv");
    let api = Arc::new(FakeBoundaryApi::default());

    let err = run_full_analysis(&paths, RefreshPolicy::Never, &collector(api.clone()))
        .await
        .unwrap_err();

    assert!(matches!(err, CollectError::CountryIndex(_)));
    assert!(err.to_string().contains("ISO country codes file not found"));
    assert_eq!(api.calls(), 0);
    assert!(!paths.metadata.exists());
}
