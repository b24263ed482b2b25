//! Data registry: source and "data as of" tracking for each persisted dataset.
//! Written after every successful refresh; read by `status` and the JSON API.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetEntry {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub path: String,
}

pub type Registry = BTreeMap<String, DataSetEntry>;

pub const DEFAULT_REGISTRY_PATH: &str = "data/registry.json";
pub const METADATA_DATASET: &str = "boundary_metadata";
pub const MISSING_DATASET: &str = "missing_layers";

/// Returns None if the file is missing or unreadable.
pub fn load_registry(path: impl AsRef<Path>) -> Option<Registry> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

pub fn write_registry(path: impl AsRef<Path>, registry: &Registry) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(registry).map_err(std::io::Error::other)?;
    fs::write(path, serialized)
}

/// Records both outputs of a refresh, keeping entries for any other datasets.
pub fn record_refresh(
    registry_path: impl AsRef<Path>,
    source: &str,
    outputs: &[(&str, &Path, usize)],
    refreshed_at: DateTime<Local>,
) -> std::io::Result<Registry> {
    let registry_path = registry_path.as_ref();
    let mut registry = load_registry(registry_path).unwrap_or_default();
    let stamp = refreshed_at.to_rfc3339();
    for (name, path, rows) in outputs {
        registry.insert(
            (*name).to_string(),
            DataSetEntry {
                source: source.to_string(),
                rows: Some(*rows),
                last_updated: Some(stamp.clone()),
                path: path.display().to_string(),
            },
        );
    }
    write_registry(registry_path, &registry)?;
    Ok(registry)
}
