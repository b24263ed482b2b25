//! License classification of collected boundaries against the open-license allow-list.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::data::boundary::BoundaryRecord;
use crate::data::cache::{read_records, CacheError};

/// License names accepted for redistribution.
pub const DEFAULT_ACCEPTABLE_LICENSES: &[&str] = &[
    "CC0 1.0 Universal (CC0 1.0) Public Domain Dedication",
    "Creative Commons Attribution 2.5 India (CC BY 2.5 IN)",
    "Creative Commons Attribution 3.0 License",
    "Public Domain",
    "Other - Direct Permission",
    "Creative Commons Attribution 4.0 International (CC BY 4.0)",
    "Creative Commons Attribution 4.0 (CC BY 4.0)",
    "Creative Commons Attribution 3.0 Intergovernmental Organisations (CC BY 3.0 IGO)",
    "Data license Germany - Attribution - Version 2.0",
    "MIMU Data License (MIMU)",
    "Open Data Commons Attribution License 1.0",
    "Open Government Licence v3.0",
    "Open Government Licence v1.0",
    "Other - Humanitarian",
    "Singapore Open Data License Version 1.0",
    "National Institute of Statistics (INE) Data License)",
    "Korea Open Government License Type 1 (Source Indication)",
    "Open Data Commons Public Domain Dedication and License (PDDL) v1.0",
    "UN SALB Data License",
    "Attribution 2.5 Denmark (CC BY 2.5 DK)",
    "Creative Commons Attribution 2.5 Generic",
    "Pixabay License for Content",
    "Etalab Open License 2.0",
    "Attribuzione 3.0 Italia (CC BY 3.0 IT)",
    "Federal Office of Topography swisstopo License",
    "Open Government Canada 2.0",
    "Sierra Leone Open License Agreement",
];

const UNSET_LICENSE_LABEL: &str = "(unset)";

pub fn default_allow_list() -> Vec<String> {
    DEFAULT_ACCEPTABLE_LICENSES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LicenseClassification {
    pub acceptable: Vec<BoundaryRecord>,
    pub unacceptable: Vec<BoundaryRecord>,
}

/// Exact-string membership; an empty license is never acceptable.
/// Input order is preserved within each bucket.
pub fn classify(records: &[BoundaryRecord], allow_list: &[String]) -> LicenseClassification {
    let allowed: HashSet<&str> = allow_list.iter().map(String::as_str).collect();
    let (acceptable, unacceptable): (Vec<BoundaryRecord>, Vec<BoundaryRecord>) = records
        .iter()
        .cloned()
        .partition(|record| !record.license.is_empty() && allowed.contains(record.license.as_str()));
    LicenseClassification {
        acceptable,
        unacceptable,
    }
}

/// Reads the persisted metadata file and classifies it. A missing file
/// classifies as empty.
pub fn check_license(
    metadata_path: impl AsRef<Path>,
    allow_list: &[String],
) -> Result<LicenseClassification, CacheError> {
    let path = metadata_path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "metadata file not found; nothing to classify");
        return Ok(LicenseClassification::default());
    }
    let records = read_records(path)?;
    Ok(classify(&records, allow_list))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseCount {
    pub license: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseReport {
    pub total: usize,
    pub acceptable: usize,
    pub unacceptable: usize,
    /// Unacceptable licenses by frequency, most common first.
    pub unacceptable_by_license: Vec<LicenseCount>,
}

pub fn license_report(classification: &LicenseClassification) -> LicenseReport {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in &classification.unacceptable {
        let label = if record.license.is_empty() {
            UNSET_LICENSE_LABEL
        } else {
            record.license.as_str()
        };
        *counts.entry(label).or_default() += 1;
    }
    let mut unacceptable_by_license: Vec<LicenseCount> = counts
        .into_iter()
        .map(|(license, count)| LicenseCount {
            license: license.to_string(),
            count,
        })
        .collect();
    unacceptable_by_license
        .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.license.cmp(&b.license)));

    LicenseReport {
        total: classification.acceptable.len() + classification.unacceptable.len(),
        acceptable: classification.acceptable.len(),
        unacceptable: classification.unacceptable.len(),
        unacceptable_by_license,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::adm::AdmLevel;

    fn record(iso: &str, license: &str) -> BoundaryRecord {
        BoundaryRecord {
            country: format!("{iso} land"),
            iso: iso.to_string(),
            boundary_type: AdmLevel::Adm0,
            boundary_name: String::new(),
            license: license.to_string(),
            license_source: String::new(),
            source_url: String::new(),
            year: String::new(),
            geojson_url: String::new(),
        }
    }

    #[test]
    fn partition_is_total_and_order_preserving() {
        let records = vec![
            record("AAA", "Public Domain"),
            record("BBB", "All rights reserved"),
            record("CCC", ""),
            record("DDD", "Open Government Licence v3.0"),
            record("EEE", "public domain"),
        ];
        let result = classify(&records, &default_allow_list());

        assert_eq!(
            result.acceptable.len() + result.unacceptable.len(),
            records.len()
        );
        let ok: Vec<_> = result.acceptable.iter().map(|r| r.iso.as_str()).collect();
        let bad: Vec<_> = result.unacceptable.iter().map(|r| r.iso.as_str()).collect();
        assert_eq!(ok, vec!["AAA", "DDD"]);
        assert_eq!(bad, vec!["BBB", "CCC", "EEE"]);
    }

    #[test]
    fn empty_license_fails_closed_even_if_allow_listed() {
        let allow = vec![String::new(), "Public Domain".to_string()];
        let result = classify(&[record("AAA", "")], &allow);
        assert!(result.acceptable.is_empty());
        assert_eq!(result.unacceptable.len(), 1);
    }

    #[test]
    fn report_groups_unacceptable_by_frequency() {
        let records = vec![
            record("AAA", "Proprietary"),
            record("BBB", ""),
            record("CCC", "Proprietary"),
            record("DDD", "Public Domain"),
        ];
        let report = license_report(&classify(&records, &default_allow_list()));
        assert_eq!(report.total, 4);
        assert_eq!(report.acceptable, 1);
        assert_eq!(report.unacceptable, 3);
        assert_eq!(
            report.unacceptable_by_license,
            vec![
                LicenseCount {
                    license: "Proprietary".to_string(),
                    count: 2
                },
                LicenseCount {
                    license: UNSET_LICENSE_LABEL.to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn missing_metadata_file_classifies_as_empty() {
        let result = check_license("no/such/metadata.csv", &default_allow_list()).unwrap();
        assert_eq!(result, LicenseClassification::default());
    }
}
