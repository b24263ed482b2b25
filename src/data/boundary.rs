//! Boundary layer records as collected from the API and persisted to CSV.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::data::adm::AdmLevel;

/// One boundary layer that exists upstream. Column names are the CSV header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryRecord {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "ISO")]
    pub iso: String,
    #[serde(rename = "BoundaryType")]
    pub boundary_type: AdmLevel,
    #[serde(rename = "BoundaryName", default)]
    pub boundary_name: String,
    #[serde(rename = "License", default)]
    pub license: String,
    #[serde(rename = "LicenseSource", alias = "License Source", default)]
    pub license_source: String,
    #[serde(rename = "SourceURL", alias = "Source", default)]
    pub source_url: String,
    #[serde(rename = "Year", default)]
    pub year: String,
    #[serde(rename = "GeoJSON", default)]
    pub geojson_url: String,
}

/// A (country, level) pair the API answered 404 for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingLayer {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "ISO")]
    pub iso: String,
    #[serde(rename = "ADM_Level")]
    pub adm_level: AdmLevel,
}

/// Metadata fields of a single gbOpen API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BoundaryMetadata {
    #[serde(rename = "boundaryName", default, deserialize_with = "lenient_string")]
    pub boundary_name: String,
    #[serde(rename = "boundaryLicense", default, deserialize_with = "lenient_string")]
    pub license: String,
    #[serde(rename = "licenseSource", default, deserialize_with = "lenient_string")]
    pub license_source: String,
    #[serde(rename = "boundarySourceURL", default, deserialize_with = "lenient_string")]
    pub source_url: String,
    #[serde(
        rename = "boundaryYearRepresented",
        default,
        deserialize_with = "lenient_string"
    )]
    pub year: String,
    #[serde(rename = "gjDownloadURL", default, deserialize_with = "lenient_string")]
    pub geojson_url: String,
}

impl BoundaryRecord {
    pub fn from_metadata(
        country: &str,
        iso: &str,
        boundary_type: AdmLevel,
        metadata: BoundaryMetadata,
    ) -> Self {
        Self {
            country: country.to_string(),
            iso: iso.to_string(),
            boundary_type,
            boundary_name: metadata.boundary_name,
            license: metadata.license,
            license_source: metadata.license_source,
            source_url: metadata.source_url,
            year: metadata.year,
            geojson_url: metadata.geojson_url,
        }
    }
}

/// The outcome of one full collection: every (country, level) pair lands in
/// exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub records: Vec<BoundaryRecord>,
    pub missing: Vec<MissingLayer>,
}

impl Collection {
    pub fn pair_count(&self) -> usize {
        self.records.len() + self.missing.len()
    }
}

/// Strings, numbers and booleans become strings; null becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}
