//! Single (ISO, ADM level) lookup against the geoBoundaries gbOpen API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::data::adm::{normalize_adm_level, AdmLevel, AdmLevelError};
use crate::data::boundary::{BoundaryMetadata, BoundaryRecord};
use crate::data::country::{CountryIndex, ResolveError};
use crate::fetch::retry::{get_with_retry, RetryPolicy};
use crate::fetch::transport::{HttpRequest, HttpTransport};
use crate::fetch::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://www.geoboundaries.org/api/current/gbOpen";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryLookup {
    Found(BoundaryRecord),
    /// HTTP 404: the layer does not exist upstream.
    NotFound,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Adm(#[from] AdmLevelError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Clone)]
pub struct BoundaryFetcher {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    retry: RetryPolicy,
    request_delay: Duration,
}

impl BoundaryFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn layer_url(&self, iso: &str, adm: AdmLevel) -> String {
        format!("{}/{}/{}/", self.base_url, iso, adm)
    }

    /// One lookup, then the fixed inter-request delay whatever the outcome.
    pub async fn fetch_boundary(
        &self,
        country: &str,
        iso: &str,
        adm: AdmLevel,
    ) -> Result<BoundaryLookup, FetchError> {
        let result = self.fetch_once(country, iso, adm).await;
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        result
    }

    async fn fetch_once(
        &self,
        country: &str,
        iso: &str,
        adm: AdmLevel,
    ) -> Result<BoundaryLookup, FetchError> {
        let url = self.layer_url(iso, adm);
        let request = HttpRequest::get(&url);
        let response = get_with_retry(self.transport.as_ref(), &request, &self.retry).await?;

        match response.status {
            200 => {
                let metadata = parse_metadata(&url, &response.body)?;
                debug!(%url, boundary = %metadata.boundary_name, "boundary found");
                Ok(BoundaryLookup::Found(BoundaryRecord::from_metadata(
                    country, iso, adm, metadata,
                )))
            }
            404 => {
                debug!(%url, "boundary not found");
                Ok(BoundaryLookup::NotFound)
            }
            status => Err(FetchError::Status { url, status }),
        }
    }
}

/// Ad-hoc lookup of one layer from user input. `country` may be a name or
/// an ISO code; both inputs are validated before anything is requested.
pub async fn lookup_boundary(
    index: &CountryIndex,
    fetcher: &BoundaryFetcher,
    country: &str,
    adm: &str,
) -> Result<BoundaryLookup, LookupError> {
    let adm = normalize_adm_level(adm)?;
    let iso = index.resolve(country)?;
    let name = index.country_for_iso(&iso).unwrap_or(country.trim());
    Ok(fetcher.fetch_boundary(name, &iso, adm).await?)
}

/// The API answers with an object, or with a one-element array for some paths.
fn parse_metadata(url: &str, body: &str) -> Result<BoundaryMetadata, FetchError> {
    let decode_error = |message: String| FetchError::Decode {
        url: url.to_string(),
        message,
    };
    let value: Value = serde_json::from_str(body).map_err(|err| decode_error(err.to_string()))?;
    let object = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| decode_error("empty array".to_string()))?,
        other => other,
    };
    if !object.is_object() {
        return Err(decode_error("expected a JSON object".to_string()));
    }
    serde_json::from_value(object).map_err(|err| decode_error(err.to_string()))
}
