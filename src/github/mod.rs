//! GitHub issue / pull-request access and tracking-issue cross-reference.

pub mod client;
pub mod summary;

use thiserror::Error;

use crate::fetch::FetchError;

pub use client::{GithubClient, Issue, Label, PullRequest, PullRequestFile, User};
pub use summary::{
    find_keyword, find_matching_issue, summarize_pull_request, PullRequestSummary, TrackingIssue,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GithubError {
    #[error("GitHub rate limit exceeded for {url}")]
    RateLimited {
        url: String,
        /// Unix epoch seconds from `x-ratelimit-reset`.
        reset_at: Option<i64>,
        authenticated: bool,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to decode GitHub response from {url}: {message}")]
    Decode { url: String, message: String },
}
