//! Pull-request summary with its tracking issue.
//!
//! Boundary submissions are titled `<ISO>_<ADM> ...`; the same token appears in
//! the title of the issue that tracks the submission.

use serde::Serialize;
use tracing::warn;

use crate::github::client::{GithubClient, Issue, PullRequest};
use crate::github::GithubError;

const NO_DESCRIPTION: &str = "(no description)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingIssue {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub author: Option<String>,
    pub state: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub labels: Vec<String>,
    pub description: String,
    pub keyword: Option<String>,
    pub boundary_filenames: Vec<String>,
    pub boundary_download_urls: Vec<String>,
    pub tracking_issue: Option<TrackingIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_error: Option<String>,
}

/// First whitespace-delimited token of the title, e.g. `TST_ADM1`.
pub fn find_keyword(title: &str) -> Option<&str> {
    title.split_whitespace().next()
}

/// First issue (in listing order) whose title contains `keyword`,
/// ignoring case.
pub fn find_matching_issue<'a>(issues: &'a [Issue], keyword: &str) -> Option<&'a Issue> {
    let needle = keyword.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    issues
        .iter()
        .find(|issue| issue.title.to_lowercase().contains(&needle))
}

/// Builds the summary for `pull`, cross-referencing `issues`. A failure to
/// list the changed files is kept on the summary; rate limiting is not.
pub async fn summarize_pull_request(
    client: &GithubClient,
    pull: &PullRequest,
    issues: &[Issue],
) -> Result<PullRequestSummary, GithubError> {
    let keyword = find_keyword(&pull.title);
    let tracking_issue = keyword
        .and_then(|kw| find_matching_issue(issues, kw))
        .map(|issue| TrackingIssue {
            number: issue.number,
            title: issue.title.clone(),
        });

    let description = match pull.body.as_deref().map(str::trim) {
        Some(body) if !body.is_empty() => body.to_string(),
        _ => NO_DESCRIPTION.to_string(),
    };

    let mut summary = PullRequestSummary {
        number: pull.number,
        title: pull.title.clone(),
        author: pull.user.as_ref().map(|u| u.login.clone()),
        state: pull.state.clone(),
        created_at: pull.created_at.clone(),
        updated_at: pull.updated_at.clone(),
        labels: pull.labels.iter().map(|l| l.name.clone()).collect(),
        description,
        keyword: keyword.map(str::to_string),
        boundary_filenames: Vec::new(),
        boundary_download_urls: Vec::new(),
        tracking_issue,
        files_error: None,
    };

    match client.pull_request_files(pull.number).await {
        Ok(files) => {
            for file in files {
                if let Some(raw_url) = file.raw_url {
                    summary.boundary_download_urls.push(raw_url);
                }
                summary.boundary_filenames.push(file.filename);
            }
        }
        Err(err @ GithubError::RateLimited { .. }) => return Err(err),
        Err(err) => {
            warn!(pr = pull.number, error = %err, "could not list pull request files");
            summary.files_error = Some(err.to_string());
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fetch::test_support::ScriptedTransport;
    use crate::fetch::{HttpResponse, RetryPolicy};
    use crate::github::client::{Label, User};

    fn issue(number: u64, title: &str) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            state: "open".to_string(),
            labels: Vec::new(),
            body: None,
            html_url: None,
            pull_request: None,
        }
    }

    fn pull(title: &str, body: Option<&str>) -> PullRequest {
        PullRequest {
            number: 42,
            title: title.to_string(),
            state: "open".to_string(),
            user: Some(User {
                login: "mapper".to_string(),
            }),
            labels: vec![Label {
                name: "boundary".to_string(),
            }],
            body: body.map(str::to_string),
            created_at: Some("2024-05-01T10:00:00Z".to_string()),
            updated_at: None,
            html_url: None,
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> GithubClient {
        GithubClient::new(transport, "https://gh.example", "wmgeolab", "geoBoundaries")
            .with_retry(RetryPolicy::no_delay(0))
    }

    #[test]
    fn keyword_is_first_title_token() {
        assert_eq!(find_keyword("TST_ADM1 new boundary"), Some("TST_ADM1"));
        assert_eq!(find_keyword("   "), None);
    }

    #[test]
    fn matching_issue_is_first_case_insensitive_hit() {
        let issues = vec![
            issue(1, "Update for FRA_ADM2"),
            issue(2, "tst_adm1 source request"),
            issue(3, "TST_ADM1 duplicate"),
        ];
        assert_eq!(find_matching_issue(&issues, "TST_ADM1").map(|i| i.number), Some(2));
        assert!(find_matching_issue(&issues, "ZZZ_ADM0").is_none());
    }

    #[tokio::test]
    async fn summary_collects_files_and_tracking_issue() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(HttpResponse::new(
                200,
                r#"[{"filename":"sourceData/gbOpen/TST_ADM1.zip","raw_url":"https://raw.example/TST_ADM1.zip"}]"#,
            )),
            Ok(HttpResponse::new(200, "[]")),
        ]));
        let issues = vec![issue(7, "TST_ADM1 submission")];

        let summary = summarize_pull_request(&client(transport), &pull("TST_ADM1 upload", Some("")), &issues)
            .await
            .unwrap();

        assert_eq!(summary.description, NO_DESCRIPTION);
        assert_eq!(summary.author.as_deref(), Some("mapper"));
        assert_eq!(summary.labels, vec!["boundary".to_string()]);
        assert_eq!(summary.boundary_filenames, vec!["sourceData/gbOpen/TST_ADM1.zip".to_string()]);
        assert_eq!(summary.boundary_download_urls.len(), 1);
        assert_eq!(summary.tracking_issue.map(|i| i.number), Some(7));
        assert!(summary.files_error.is_none());
    }

    #[tokio::test]
    async fn file_listing_failure_is_recorded() {
        let transport = Arc::new(ScriptedTransport::statuses(&[500], ""));
        let summary = summarize_pull_request(&client(transport), &pull("TST_ADM1", None), &[])
            .await
            .unwrap();
        assert!(summary.boundary_filenames.is_empty());
        assert!(summary.files_error.is_some());
        assert!(summary.tracking_issue.is_none());
    }

    #[tokio::test]
    async fn rate_limit_while_listing_files_propagates() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse::new(429, ""))]));
        let err = summarize_pull_request(&client(transport), &pull("TST_ADM1", None), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::RateLimited { .. }));
    }
}
