//! Country name → ISO-alpha3 reference table and lookup.
//! Loaded from the UN "Country or Area" / "ISO-alpha3 code" CSV.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

const COUNTRY_COLUMN: &str = "Country or Area";
const ISO_COLUMN: &str = "ISO-alpha3 code";

#[derive(Debug, Error)]
pub enum CountryIndexError {
    #[error("ISO country codes file not found at: {path}")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no '{column}' column")]
    MissingColumn { path: String, column: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("country '{input}' not found{}", format_suggestions(.suggestions))]
    NotFound {
        input: String,
        suggestions: Vec<String>,
    },
    #[error("invalid country input: {0}")]
    InvalidInput(String),
}

impl ResolveError {
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::NotFound { suggestions, .. } => suggestions,
            Self::InvalidInput(_) => &[],
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}?", suggestions.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryEntry {
    pub name: String,
    pub iso: String,
}

/// Immutable after load. Iteration follows file order and keeps every
/// distinct (name, ISO) row; name lookups resolve to the first such row.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    entries: Vec<CountryEntry>,
    seen: HashSet<(String, String)>,
    by_name: HashMap<String, usize>,
    by_iso: HashMap<String, usize>,
}

impl CountryIndex {
    pub fn from_pairs<N, I>(pairs: impl IntoIterator<Item = (N, I)>) -> Self
    where
        N: Into<String>,
        I: Into<String>,
    {
        let mut index = Self::default();
        for (name, iso) in pairs {
            index.insert(name.into(), iso.into());
        }
        index
    }

    fn insert(&mut self, name: String, iso: String) {
        let name = name.trim().to_string();
        let iso = iso.trim().to_ascii_uppercase();
        if name.is_empty() || iso.is_empty() {
            debug!(name = %name, iso = %iso, "skipping blank country row");
            return;
        }
        let key = name.to_lowercase();
        if !self.seen.insert((key.clone(), iso.clone())) {
            debug!(name = %name, iso = %iso, "skipping repeated country row");
            return;
        }
        let position = self.entries.len();
        if self.by_name.contains_key(&key) {
            warn!(name = %name, iso = %iso, "duplicate country name; lookups keep the first entry");
        } else {
            self.by_name.insert(key, position);
        }
        self.by_iso.entry(iso.clone()).or_insert(position);
        self.entries.push(CountryEntry { name, iso });
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CountryIndexError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CountryIndexError::NotFound {
                    path: display.clone(),
                }
            } else {
                CountryIndexError::Read {
                    path: display.clone(),
                    source,
                }
            }
        })?;
        Self::from_csv_str(&raw, &display)
    }

    fn from_csv_str(raw: &str, path: &str) -> Result<Self, CountryIndexError> {
        let csv_error = |source| CountryIndexError::Csv {
            path: path.to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(raw.as_bytes());
        let headers = reader.headers().map_err(csv_error)?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}').trim() == name)
                .ok_or(CountryIndexError::MissingColumn {
                    path: path.to_string(),
                    column: name,
                })
        };
        let country_col = column(COUNTRY_COLUMN)?;
        let iso_col = column(ISO_COLUMN)?;

        let mut index = Self::default();
        for row in reader.records() {
            let row = row.map_err(csv_error)?;
            let name = row.get(country_col).unwrap_or("");
            let iso = row.get(iso_col).unwrap_or("");
            index.insert(name.to_string(), iso.to_string());
        }
        debug!(path, countries = index.len(), "loaded country index");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountryEntry> {
        self.entries.iter()
    }

    pub fn country_for_iso(&self, iso: &str) -> Option<&str> {
        let position = *self.by_iso.get(&iso.trim().to_ascii_uppercase())?;
        Some(self.entries[position].name.as_str())
    }

    /// Exact case-insensitive name match, then ISO code match. On a miss,
    /// suggests every country whose name contains the input.
    pub fn resolve(&self, input: &str) -> Result<String, ResolveError> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ResolveError::InvalidInput(
                "country name or ISO code is blank".to_string(),
            ));
        }

        if let Some(&position) = self.by_name.get(&needle) {
            return Ok(self.entries[position].iso.clone());
        }
        if let Some(&position) = self.by_iso.get(&needle.to_ascii_uppercase()) {
            return Ok(self.entries[position].iso.clone());
        }

        let suggestions = self
            .entries
            .iter()
            .filter(|entry| entry.name.to_lowercase().contains(&needle))
            .map(|entry| entry.name.clone())
            .collect();
        Err(ResolveError::NotFound {
            input: input.trim().to_string(),
            suggestions,
        })
    }
}
