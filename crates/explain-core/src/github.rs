//! GitHub REST client for the host API surface the pipeline consumes.
//!
//! The core only needs a narrow slice of the Actions and repos contracts:
//! job listing, log download, commit comparison, and the comment endpoints
//! the renderers post through. [`WorkflowHost`] is the seam the collector
//! and git-context code depend on; tests substitute an in-memory fake.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ExplainConfig;
use crate::domain::error::{ExplainError, Result};
use crate::domain::excerpt::JobConclusion;

/// One job in a workflow run, as listed by the host API.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

impl WorkflowJob {
    pub fn is_completed_failure(&self) -> bool {
        self.status == "completed" && self.conclusion.as_deref() == Some("failure")
    }

    pub fn conclusion_kind(&self) -> JobConclusion {
        self.conclusion
            .as_deref()
            .map(JobConclusion::from)
            .unwrap_or(JobConclusion::Unknown)
    }
}

/// Two-commit comparison from the host API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub files: Vec<ComparisonFile>,
    #[serde(default)]
    pub commits: Vec<ComparisonCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub message: String,
}

/// A single commit with its changed files.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub commit: CommitDetail,
    #[serde(default)]
    pub files: Vec<ComparisonFile>,
}

/// An issue or PR comment, as much of it as the tool needs.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
}

/// One inline comment in a pull-request review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewDraftComment {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub body: String,
}

/// Host API operations the core pipeline depends on.
#[async_trait]
pub trait WorkflowHost: Send + Sync {
    /// List all jobs in a workflow run, in the host's listing order.
    async fn list_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>>;

    /// Download the raw log text for one job.
    async fn download_job_log(&self, job_id: u64) -> Result<String>;

    /// Compare two commits: changed files, patches, commit list.
    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison>;

    /// Fetch a single commit's metadata and changed files.
    async fn get_commit(&self, sha: &str) -> Result<CommitInfo>;
}

/// reqwest-backed implementation against the GitHub REST API.
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    repository: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &ExplainConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ci-explain/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        GithubClient {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            token: config.github_token.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/repos/{}/{}", self.api_url, self.repository, path);
        let mut req = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("x-github-api-version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = crate::truncate::truncate_to_bytes(&body, 512);
            return Err(ExplainError::Github(format!("status {status}: {body}")));
        }
        Ok(response)
    }

    /// Find the tool's own comment (identified by `marker` in the body) on
    /// an issue/PR and replace it, or create a fresh one.
    pub async fn upsert_issue_comment(
        &self,
        issue_number: u64,
        marker: &str,
        body: &str,
    ) -> Result<()> {
        for comment in self.list_issue_comments(issue_number).await? {
            if comment.body.contains(marker) {
                debug!(comment_id = comment.id, "replacing previous comment");
                self.delete_issue_comment(comment.id).await?;
            }
        }
        self.create_issue_comment(issue_number, body).await
    }

    pub async fn list_issue_comments(&self, issue_number: u64) -> Result<Vec<IssueComment>> {
        let req = self
            .request(Method::GET, &format!("issues/{issue_number}/comments"))
            .query(&[("per_page", "100")]);
        Ok(self.send(req).await?.json().await?)
    }

    pub async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("issues/{issue_number}/comments"))
            .json(&json!({ "body": body }));
        self.send(req).await?;
        Ok(())
    }

    pub async fn delete_issue_comment(&self, comment_id: u64) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("issues/comments/{comment_id}"));
        self.send(req).await?;
        Ok(())
    }

    /// Create a pull-request review whose inline comments carry the
    /// analyzer's structured fix suggestions.
    pub async fn create_review_with_comments(
        &self,
        pr_number: u64,
        commit_sha: &str,
        body: &str,
        comments: &[ReviewDraftComment],
    ) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("pulls/{pr_number}/reviews"))
            .json(&json!({
                "commit_id": commit_sha,
                "event": "COMMENT",
                "body": body,
                "comments": comments,
            }));
        self.send(req).await?;
        Ok(())
    }

    pub async fn list_review_comments(&self, pr_number: u64) -> Result<Vec<IssueComment>> {
        let req = self
            .request(Method::GET, &format!("pulls/{pr_number}/comments"))
            .query(&[("per_page", "100")]);
        Ok(self.send(req).await?.json().await?)
    }

    pub async fn delete_review_comment(&self, comment_id: u64) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("pulls/comments/{comment_id}"));
        self.send(req).await?;
        Ok(())
    }

    pub async fn create_commit_comment(&self, sha: &str, body: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("commits/{sha}/comments"))
            .json(&json!({ "body": body }));
        self.send(req).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct JobListing {
    #[serde(default)]
    jobs: Vec<WorkflowJob>,
}

#[async_trait]
impl WorkflowHost for GithubClient {
    async fn list_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let mut jobs = Vec::new();
        let mut page = 1u32;
        loop {
            let req = self
                .request(Method::GET, &format!("actions/runs/{run_id}/jobs"))
                .query(&[("per_page", "100"), ("page", &page.to_string())]);
            let listing: JobListing = self.send(req).await?.json().await?;
            let count = listing.jobs.len();
            jobs.extend(listing.jobs);
            if count < 100 {
                break;
            }
            page += 1;
        }
        debug!(run_id, jobs = jobs.len(), "listed workflow jobs");
        Ok(jobs)
    }

    async fn download_job_log(&self, job_id: u64) -> Result<String> {
        // The logs endpoint redirects to blob storage; reqwest follows it.
        let req = self.request(Method::GET, &format!("actions/jobs/{job_id}/logs"));
        Ok(self.send(req).await?.text().await?)
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        let req = self.request(Method::GET, &format!("compare/{base}...{head}"));
        Ok(self.send(req).await?.json().await?)
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitInfo> {
        let req = self.request(Method::GET, &format!("commits/{sha}"));
        Ok(self.send(req).await?.json().await?)
    }
}
