//! GitHub REST client for the boundary repository's issues and pull requests.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fetch::retry::{get_with_retry, RetryPolicy};
use crate::fetch::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::github::GithubError;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Present when the issues endpoint is actually returning a pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    #[serde(default)]
    pub raw_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

pub struct GithubClient {
    transport: Arc<dyn HttpTransport>,
    repo_url: String,
    token: Option<String>,
    per_page: u32,
    retry: RetryPolicy,
}

impl GithubClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: &str, owner: &str, repo: &str) -> Self {
        Self {
            transport,
            repo_url: format!("{}/repos/{}/{}", api_base.trim_end_matches('/'), owner, repo),
            token: None,
            per_page: DEFAULT_PER_PAGE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Issues only; pull requests returned by the issues endpoint are dropped.
    pub async fn list_issues(&self) -> Result<Vec<Issue>, GithubError> {
        let items: Vec<Issue> = self.paginate("issues").await?;
        let total = items.len();
        let issues: Vec<Issue> = items
            .into_iter()
            .filter(|item| !item.is_pull_request())
            .collect();
        info!(issues = issues.len(), skipped_pull_requests = total - issues.len(), "fetched GitHub issues");
        Ok(issues)
    }

    pub async fn list_pull_requests(&self) -> Result<Vec<PullRequest>, GithubError> {
        let pulls: Vec<PullRequest> = self.paginate("pulls").await?;
        info!(pull_requests = pulls.len(), "fetched GitHub pull requests");
        Ok(pulls)
    }

    pub async fn pull_request(&self, number: u64) -> Result<Option<PullRequest>, GithubError> {
        self.get_one(&format!("pulls/{number}")).await
    }

    pub async fn pull_request_files(&self, number: u64) -> Result<Vec<PullRequestFile>, GithubError> {
        self.paginate(&format!("pulls/{number}/files")).await
    }

    /// `None` when the issue does not exist.
    pub async fn issue(&self, number: u64) -> Result<Option<Issue>, GithubError> {
        self.get_one(&format!("issues/{number}")).await
    }

    /// Pages from 1 until the first empty page, concatenated in order.
    async fn paginate<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, GithubError> {
        let url = format!("{}/{}", self.repo_url, path);
        let mut all = Vec::new();
        let mut page: u32 = 1;
        loop {
            let request = self
                .request(&url)
                .query("page", page)
                .query("per_page", self.per_page);
            let response = self.send(&request).await?;
            let batch: Vec<T> = decode(&request, &response)?;
            debug!(url = %url, page, items = batch.len(), "fetched page");
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
            page += 1;
        }
        Ok(all)
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, GithubError> {
        let request = self.request(&format!("{}/{}", self.repo_url, path));
        match self.send(&request).await {
            Ok(response) => decode(&request, &response).map(Some),
            Err(GithubError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn request(&self, url: &str) -> HttpRequest {
        let request = HttpRequest::get(url).header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, GithubError> {
        let response = get_with_retry(self.transport.as_ref(), request, &self.retry).await?;
        if response.is_success() {
            return Ok(response);
        }
        if is_rate_limited(&response) {
            return Err(GithubError::RateLimited {
                url: request.display_url(),
                reset_at: response
                    .header("x-ratelimit-reset")
                    .and_then(|v| v.trim().parse().ok()),
                authenticated: self.is_authenticated(),
            });
        }
        Err(GithubError::Status {
            url: request.display_url(),
            status: response.status,
        })
    }
}

fn is_rate_limited(response: &HttpResponse) -> bool {
    match response.status {
        429 => true,
        403 => response.header("x-ratelimit-remaining").map(str::trim) == Some("0"),
        _ => false,
    }
}

fn decode<T: DeserializeOwned>(request: &HttpRequest, response: &HttpResponse) -> Result<T, GithubError> {
    serde_json::from_str(&response.body).map_err(|err| GithubError::Decode {
        url: request.display_url(),
        message: err.to_string(),
    })
}
