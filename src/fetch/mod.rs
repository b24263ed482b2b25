//! Network side of the pipeline: transport, retry policy, per-layer fetcher
//! and the full collection run.

pub mod boundary;
pub mod collector;
pub mod retry;
pub mod transport;

use thiserror::Error;

pub use boundary::{lookup_boundary, BoundaryFetcher, BoundaryLookup, LookupError, DEFAULT_BASE_URL};
pub use collector::{run_full_analysis, AnalysisOutcome, CollectError, Collector, DatasetOrigin};
pub use retry::{get_with_retry, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Non-retryable status such as 400, 401 or 403.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    /// 5xx or connection failures outlived the retry budget.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    FetchFailed {
        url: String,
        attempts: u32,
        last: String,
    },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}
