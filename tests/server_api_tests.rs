use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use tempfile::TempDir;

use geoguardian::config::Settings;
use geoguardian::server::routes::route_request;

const METADATA_CSV: &str = "\
Country,ISO,BoundaryType,BoundaryName,License,LicenseSource,SourceURL,Year,GeoJSON
Testland,TST,ADM0,Testland National,Public Domain,,https://testland.test,2021,https://testland.test/TST_ADM0.geojson
Otherland,OTH,ADM0,Otherland,,,https://otherland.test,2020,https://otherland.test/OTH_ADM0.geojson
Otherland,OTH,ADM1,Otherland Regions,Proprietary,,https://otherland.test,2020,https://otherland.test/OTH_ADM1.geojson
";

fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.paths.iso = dir.path().join("iso_codes.csv");
    settings.paths.metadata = dir.path().join("metadata.csv");
    settings.paths.missing = dir.path().join("missing.csv");
    settings.paths.registry = dir.path().join("registry.json");
    settings
}

fn with_cache(dir: &TempDir) -> Settings {
    fs::write(dir.path().join("metadata.csv"), METADATA_CSV).expect("metadata fixture should be written");
    fs::write(
        dir.path().join("missing.csv"),
        "Country,ISO,ADM_Level\nTestland,TST,ADM1\nOtherland,OTH,ADM2\n",
    )
    .expect("missing fixture should be written");
    settings(dir)
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("response should be valid json")
}

#[test]
fn health_endpoint_returns_ok_json() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/health", &settings(&dir));
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("\"status\": \"ok\""));
}

#[test]
fn boundaries_endpoint_lists_cached_records() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/boundaries", &with_cache(&dir));

    assert_eq!(response.status_code, 200);
    let payload = json(&response.body);
    assert_eq!(payload["count"], 3);
    assert_eq!(payload["boundaries"][0]["ISO"], "TST");
    assert_eq!(payload["boundaries"][0]["BoundaryType"], "ADM0");
}

#[test]
fn boundaries_endpoint_filters_by_iso() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/boundaries?iso=oth", &with_cache(&dir));

    let payload = json(&response.body);
    assert_eq!(payload["count"], 2);
    let names: Vec<&str> = payload["boundaries"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["BoundaryName"].as_str())
        .collect();
    assert_eq!(names, vec!["Otherland", "Otherland Regions"]);
}

#[test]
fn endpoints_tolerate_missing_files() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let boundaries = json(&route_request("GET", "/api/boundaries", &settings).body);
    assert_eq!(boundaries["count"], 0);
    let missing = json(&route_request("GET", "/api/missing", &settings).body);
    assert_eq!(missing["count"], 0);
    let status = json(&route_request("GET", "/api/status", &settings).body);
    assert_eq!(status["next_run"]["reason"]["kind"], "no_cache");
    assert!(status["registry"].is_null());
}

#[test]
fn missing_endpoint_lists_absent_layers() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/missing", &with_cache(&dir));

    let payload = json(&response.body);
    assert_eq!(payload["count"], 2);
    assert_eq!(payload["missing"][1]["ADM_Level"], "ADM2");
}

#[test]
fn licenses_endpoint_groups_unacceptable_licenses() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/licenses", &with_cache(&dir));

    assert_eq!(response.status_code, 200);
    let payload = json(&response.body);
    assert_eq!(payload["report"]["total"], 3);
    assert_eq!(payload["report"]["acceptable"], 1);
    assert_eq!(payload["report"]["unacceptable"], 2);
    let groups = payload["report"]["unacceptable_by_license"].as_array().unwrap();
    let labels: Vec<&str> = groups.iter().filter_map(|g| g["license"].as_str()).collect();
    assert_eq!(labels, vec!["(unset)", "Proprietary"]);
}

#[test]
fn status_endpoint_reports_cached_decision() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/status", &with_cache(&dir));

    let payload = json(&response.body);
    assert_eq!(payload["metadata"]["exists"], true);
    assert_eq!(payload["missing"]["exists"], true);
    assert_eq!(payload["refresh_policy"], "never");
    assert_eq!(payload["next_run"]["decision"], "use_cached");
}

#[test]
fn unknown_route_is_not_found() {
    let dir = TempDir::new().unwrap();
    let response = route_request("GET", "/api/shapefiles", &settings(&dir));
    assert_eq!(response.status_code, 404);
    assert!(response.body.contains("Route not found"));
}

#[test]
fn writes_are_not_allowed() {
    let dir = TempDir::new().unwrap();
    let response = route_request("POST", "/api/boundaries", &settings(&dir));
    assert_eq!(response.status_code, 405);
}

#[test]
fn corrupt_cache_is_a_server_error() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("metadata.csv"),
        "Country,ISO,BoundaryType\nTestland,TST,ADM7\n",
    )
    .unwrap();
    let response = route_request("GET", "/api/boundaries", &settings(&dir));
    assert_eq!(response.status_code, 500);
    assert!(response.body.contains("\"status\": \"error\""));
}

#[test]
fn server_answers_over_tcp() {
    let dir = TempDir::new().unwrap();
    let settings = with_cache(&dir);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || geoguardian::server::serve(listener, &settings));

    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(b"GET /api/boundaries?iso=TST HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK"));
    let body = raw.split("\r\n\r\n").nth(1).unwrap();
    assert_eq!(json(body)["count"], 1);
}
