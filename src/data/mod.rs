pub mod adm;
pub mod boundary;
pub mod cache;
pub mod country;
pub mod license;
pub mod registry;

pub use adm::{normalize_adm_level, AdmLevel, AdmLevelError};
pub use boundary::{BoundaryMetadata, BoundaryRecord, Collection, MissingLayer};
pub use cache::{CacheDecision, CacheError, RefreshPolicy, RefreshReason};
pub use country::{CountryEntry, CountryIndex, CountryIndexError, ResolveError};
pub use license::{classify, LicenseClassification, LicenseReport};
