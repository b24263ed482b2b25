//! Cached dataset on disk: freshness gate plus CSV persistence of the two
//! output files (boundary metadata and missing layers).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::boundary::{BoundaryRecord, Collection, MissingLayer};

pub const DEFAULT_METADATA_PATH: &str = "data/geoBoundaries_metadata.csv";
pub const DEFAULT_MISSING_PATH: &str = "data/missing_layers.csv";

const METADATA_HEADERS: [&str; 9] = [
    "Country",
    "ISO",
    "BoundaryType",
    "BoundaryName",
    "License",
    "LicenseSource",
    "SourceURL",
    "Year",
    "GeoJSON",
];
const MISSING_HEADERS: [&str; 3] = ["Country", "ISO", "ADM_Level"];

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// When a present cache may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Reuse whatever is on disk.
    #[default]
    Never,
    AlwaysRefresh,
    /// Reuse while the metadata file is at most this many whole days old.
    MaxAgeDays(u32),
}

impl RefreshPolicy {
    /// `None` never refreshes, `Some(0)` always refreshes.
    pub fn from_days(days: Option<u32>) -> Self {
        match days {
            None => Self::Never,
            Some(0) => Self::AlwaysRefresh,
            Some(n) => Self::MaxAgeDays(n),
        }
    }

    /// Parses `never`, `always`, or a day count.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "never" | "none" | "" => Some(Self::Never),
            "always" => Some(Self::AlwaysRefresh),
            other => other.parse::<u32>().ok().map(|n| Self::from_days(Some(n))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshReason {
    NoCache,
    /// Metadata file present without its missing-layers companion.
    IncompleteCache,
    AlwaysRefresh,
    Stale { age_days: i64, max_age_days: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CacheDecision {
    UseCached { age_days: i64 },
    Refresh { reason: RefreshReason },
}

/// Pure decision over the age of the metadata file (`None` = absent).
pub fn decide(policy: RefreshPolicy, age_days: Option<i64>) -> CacheDecision {
    let Some(age_days) = age_days else {
        return CacheDecision::Refresh {
            reason: RefreshReason::NoCache,
        };
    };
    match policy {
        RefreshPolicy::Never => CacheDecision::UseCached { age_days },
        RefreshPolicy::AlwaysRefresh => CacheDecision::Refresh {
            reason: RefreshReason::AlwaysRefresh,
        },
        RefreshPolicy::MaxAgeDays(max_age_days) if age_days <= i64::from(max_age_days) => {
            CacheDecision::UseCached { age_days }
        }
        RefreshPolicy::MaxAgeDays(max_age_days) => CacheDecision::Refresh {
            reason: RefreshReason::Stale {
                age_days,
                max_age_days,
            },
        },
    }
}

/// Whole days since last modification, or `None` when the file is absent.
/// A modification time in the future counts as age zero.
pub fn file_age_days(path: &Path, now: DateTime<Local>) -> Result<Option<i64>, CacheError> {
    match modified_at(path)? {
        None => Ok(None),
        Some(modified) => Ok(Some((now - modified).num_days().max(0))),
    }
}

pub fn modified_at(path: &Path) -> Result<Option<DateTime<Local>>, CacheError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(io_error(path, source)),
    };
    let modified: SystemTime = metadata.modified().map_err(|source| io_error(path, source))?;
    Ok(Some(DateTime::<Local>::from(modified)))
}

/// Applies the freshness gate to the cached pair on disk.
pub fn evaluate(
    policy: RefreshPolicy,
    metadata_path: &Path,
    missing_path: &Path,
    now: DateTime<Local>,
) -> Result<CacheDecision, CacheError> {
    let age_days = file_age_days(metadata_path, now)?;
    if age_days.is_some() && !missing_path.exists() {
        warn!(
            path = %missing_path.display(),
            "missing-layers file absent next to cached metadata; rebuilding"
        );
        return Ok(CacheDecision::Refresh {
            reason: RefreshReason::IncompleteCache,
        });
    }
    let decision = decide(policy, age_days);
    match decision {
        CacheDecision::UseCached { age_days } => info!(
            path = %metadata_path.display(),
            age_days,
            ?policy,
            "using cached dataset; no API calls made"
        ),
        CacheDecision::Refresh { reason } => info!(
            path = %metadata_path.display(),
            ?reason,
            "cached dataset will be rebuilt"
        ),
    }
    Ok(decision)
}

pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<BoundaryRecord>, CacheError> {
    read_csv(path.as_ref())
}

pub fn read_missing(path: impl AsRef<Path>) -> Result<Vec<MissingLayer>, CacheError> {
    read_csv(path.as_ref())
}

pub fn read_collection(
    metadata_path: &Path,
    missing_path: &Path,
) -> Result<Collection, CacheError> {
    Ok(Collection {
        records: read_records(metadata_path)?,
        missing: read_missing(missing_path)?,
    })
}

/// Missing layers first, metadata last: the metadata mtime marks a complete run.
pub fn write_collection(
    collection: &Collection,
    metadata_path: &Path,
    missing_path: &Path,
) -> Result<(), CacheError> {
    write_csv_atomic(missing_path, &MISSING_HEADERS, &collection.missing)?;
    write_csv_atomic(metadata_path, &METADATA_HEADERS, &collection.records)?;
    info!(
        metadata = %metadata_path.display(),
        missing = %missing_path.display(),
        records = collection.records.len(),
        missing_layers = collection.missing.len(),
        "persisted dataset"
    );
    Ok(())
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CacheError> {
    let read_error = |source| CacheError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(read_error)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(read_error)?;
    debug!(path = %path.display(), rows = rows.len(), "read cached csv");
    Ok(rows)
}

fn write_csv_atomic<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<(), CacheError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let tmp = temp_sibling(path);
    let result = write_csv(&tmp, path, headers, rows)
        .and_then(|()| fs::rename(&tmp, path).map_err(|source| io_error(path, source)));
    if result.is_err() {
        if let Err(err) = fs::remove_file(&tmp) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %err, "failed to remove temp file");
            }
        }
    }
    result
}

fn write_csv<T: Serialize>(
    tmp: &Path,
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<(), CacheError> {
    let write_error = |source| CacheError::Write {
        path: path.display().to_string(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(tmp)
        .map_err(write_error)?;
    writer.write_record(headers).map_err(write_error)?;
    for row in rows {
        writer.serialize(row).map_err(write_error)?;
    }
    writer.flush().map_err(|source| io_error(tmp, source))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        source,
    }
}
