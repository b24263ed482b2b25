use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::data::boundary::BoundaryRecord;
use crate::data::cache::{self, CacheDecision, CacheError, RefreshPolicy};
use crate::data::license::{check_license, license_report, LicenseReport};
use crate::data::registry::{load_registry, Registry};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("failed to serialize response: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "geoguardian-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn query_param<'a>(path: &'a str, name: &str) -> Option<&'a str> {
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

#[derive(Debug, Serialize)]
struct BoundaryList {
    count: usize,
    boundaries: Vec<BoundaryRecord>,
}

/// `?iso=XXX` narrows the list to one country (case-insensitive).
pub fn boundaries_payload(settings: &Settings, path: &str) -> Result<String, ApiError> {
    let mut boundaries = read_if_present(&settings.paths.metadata, |file| cache::read_records(file))?;
    if let Some(iso) = query_param(path, "iso").filter(|iso| !iso.is_empty()) {
        boundaries.retain(|record| record.iso.eq_ignore_ascii_case(iso));
    }
    Ok(serde_json::to_string_pretty(&BoundaryList {
        count: boundaries.len(),
        boundaries,
    })?)
}

pub fn missing_payload(settings: &Settings) -> Result<String, ApiError> {
    let missing = read_if_present(&settings.paths.missing, |file| cache::read_missing(file))?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "count": missing.len(),
        "missing": missing,
    }))?)
}

#[derive(Debug, Serialize)]
struct LicensesResponse {
    report: LicenseReport,
    unacceptable: Vec<BoundaryRecord>,
}

pub fn licenses_payload(settings: &Settings) -> Result<String, ApiError> {
    let classification = check_license(&settings.paths.metadata, &settings.acceptable_licenses)?;
    let report = license_report(&classification);
    Ok(serde_json::to_string_pretty(&LicensesResponse {
        report,
        unacceptable: classification.unacceptable,
    })?)
}

pub fn status_payload(settings: &Settings) -> Result<String, ApiError> {
    let status = dataset_status(settings, Local::now())?;
    Ok(serde_json::to_string_pretty(&status)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatus {
    pub metadata: FileStatus,
    pub missing: FileStatus,
    pub refresh_policy: RefreshPolicy,
    /// What a `collect` run would do right now.
    pub next_run: CacheDecision,
    pub registry: Option<Registry>,
}

pub fn dataset_status(settings: &Settings, now: DateTime<Local>) -> Result<DatasetStatus, CacheError> {
    let paths = &settings.paths;
    Ok(DatasetStatus {
        metadata: file_status(&paths.metadata, now)?,
        missing: file_status(&paths.missing, now)?,
        refresh_policy: settings.refresh,
        next_run: cache::evaluate(settings.refresh, &paths.metadata, &paths.missing, now)?,
        registry: load_registry(&paths.registry),
    })
}

fn file_status(path: &Path, now: DateTime<Local>) -> Result<FileStatus, CacheError> {
    let modified = cache::modified_at(path)?;
    Ok(FileStatus {
        path: path.display().to_string(),
        exists: modified.is_some(),
        modified_at: modified.map(|at| at.to_rfc3339()),
        age_days: modified.map(|at| (now - at).num_days().max(0)),
    })
}

fn read_if_present<T>(
    path: &Path,
    read: impl Fn(&Path) -> Result<Vec<T>, CacheError>,
) -> Result<Vec<T>, CacheError> {
    if path.exists() {
        read(path)
    } else {
        Ok(Vec::new())
    }
}
