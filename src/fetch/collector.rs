//! Full collection run over every country and ADM level, behind the cache
//! freshness gate.

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DatasetPaths;
use crate::data::adm::AdmLevel;
use crate::data::boundary::{Collection, MissingLayer};
use crate::data::cache::{self, CacheDecision, CacheError, RefreshPolicy, RefreshReason};
use crate::data::country::{CountryIndex, CountryIndexError};
use crate::data::registry::{self, METADATA_DATASET, MISSING_DATASET};
use crate::fetch::boundary::{BoundaryFetcher, BoundaryLookup};
use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    CountryIndex(#[from] CountryIndexError),
    #[error("collection aborted at {country} ({iso}) {adm}: {source}")]
    Fetch {
        country: String,
        iso: String,
        adm: AdmLevel,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub struct Collector {
    fetcher: BoundaryFetcher,
}

impl Collector {
    pub fn new(fetcher: BoundaryFetcher) -> Self {
        Self { fetcher }
    }

    pub fn source(&self) -> &str {
        self.fetcher.base_url()
    }

    /// Sequential sweep in index order × ADM0..ADM4. Any fetch error aborts
    /// the whole run; nothing partial is returned.
    pub async fn collect(&self, index: &CountryIndex) -> Result<Collection, CollectError> {
        info!(countries = index.len(), "starting analysis on all country administrative levels");
        let mut collection = Collection::default();

        for entry in index.iter() {
            for adm in AdmLevel::ALL {
                let lookup = self
                    .fetcher
                    .fetch_boundary(&entry.name, &entry.iso, adm)
                    .await
                    .map_err(|source| CollectError::Fetch {
                        country: entry.name.clone(),
                        iso: entry.iso.clone(),
                        adm,
                        source,
                    })?;
                match lookup {
                    BoundaryLookup::Found(record) => collection.records.push(record),
                    BoundaryLookup::NotFound => collection.missing.push(MissingLayer {
                        country: entry.name.clone(),
                        iso: entry.iso.clone(),
                        adm_level: adm,
                    }),
                }
            }
            debug!(
                country = %entry.name,
                iso = %entry.iso,
                records = collection.records.len(),
                missing = collection.missing.len(),
                "country done"
            );
        }

        info!(
            records = collection.records.len(),
            missing = collection.missing.len(),
            "collection finished"
        );
        Ok(collection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum DatasetOrigin {
    Cached { age_days: i64 },
    Refreshed { reason: RefreshReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub collection: Collection,
    pub origin: DatasetOrigin,
}

/// Returns the cached dataset when the gate allows it; otherwise rebuilds it
/// from scratch and overwrites both files. A failed rebuild leaves the
/// previous files untouched.
pub async fn run_full_analysis(
    paths: &DatasetPaths,
    policy: RefreshPolicy,
    collector: &Collector,
) -> Result<AnalysisOutcome, CollectError> {
    let decision = cache::evaluate(policy, &paths.metadata, &paths.missing, Local::now())?;
    let reason = match decision {
        CacheDecision::UseCached { age_days } => {
            let collection = cache::read_collection(&paths.metadata, &paths.missing)?;
            info!(
                records = collection.records.len(),
                missing = collection.missing.len(),
                "loaded cached dataset"
            );
            return Ok(AnalysisOutcome {
                collection,
                origin: DatasetOrigin::Cached { age_days },
            });
        }
        CacheDecision::Refresh { reason } => reason,
    };

    let index = CountryIndex::load(&paths.iso)?;
    let collection = collector.collect(&index).await?;
    cache::write_collection(&collection, &paths.metadata, &paths.missing)?;

    if let Err(err) = registry::record_refresh(
        &paths.registry,
        collector.source(),
        &[
            (METADATA_DATASET, paths.metadata.as_path(), collection.records.len()),
            (MISSING_DATASET, paths.missing.as_path(), collection.missing.len()),
        ],
        Local::now(),
    ) {
        warn!(path = %paths.registry.display(), error = %err, "failed to update dataset registry");
    }

    Ok(AnalysisOutcome {
        collection,
        origin: DatasetOrigin::Refreshed { reason },
    })
}
