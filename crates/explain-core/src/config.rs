//! Pipeline configuration.
//!
//! All environment and event-payload lookups happen here, once, at process
//! start. The resulting [`ExplainConfig`] is passed into each component
//! constructor; algorithmic code never reads the environment itself.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::client::RetryPolicy;
use crate::domain::error::{ExplainError, Result};

pub const DEFAULT_SERVICE_URL: &str = "https://api.ci-explain.dev";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Per-job excerpt byte budget.
pub const DEFAULT_MAX_LOG_BYTES: usize = 64 * 1024;

/// Maximum number of other failed jobs collected per run.
pub const DEFAULT_MAX_JOBS: usize = 10;

/// Hard ceiling on the serialized request body.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 512 * 1024;

/// Configuration for one explanation run, constructed once at startup.
#[derive(Debug, Clone)]
pub struct ExplainConfig {
    /// Analyzer service base URL.
    pub service_url: String,

    /// Bearer credential for the analyzer, when available.
    pub service_token: Option<String>,

    /// Host API credential.
    pub github_token: Option<String>,

    /// Host API base URL (overridable for tests).
    pub api_url: String,

    /// `owner/repo` under analysis.
    pub repository: String,

    /// Workflow run the failure occurred in.
    pub run_id: u64,

    /// Name of the failed job to analyze.
    pub job_name: String,

    /// Name of the job this tool itself runs in, excluded from matching so
    /// the fetcher never downloads its own in-progress log.
    pub current_job: String,

    /// Workflow name, for display.
    pub workflow_name: String,

    /// Head commit SHA of the run.
    pub sha: String,

    /// Base of the commit range from the triggering event (PR base SHA, or
    /// the push `before` SHA).
    pub base_sha: Option<String>,

    /// Head of the commit range from the triggering event.
    pub head_sha: Option<String>,

    /// Pull request number on PR events.
    pub pr_number: Option<u64>,

    /// Per-job excerpt byte budget.
    pub max_log_bytes: usize,

    /// Cap on other failed jobs collected.
    pub max_jobs: usize,

    /// Hard ceiling on the serialized request body.
    pub max_request_bytes: usize,

    /// Local log file override for offline/test runs.
    pub log_file: Option<PathBuf>,

    /// Retry behavior for the analyzer client.
    pub retry: RetryPolicy,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            service_token: None,
            github_token: None,
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            repository: String::new(),
            run_id: 0,
            job_name: String::new(),
            current_job: String::new(),
            workflow_name: String::new(),
            sha: String::new(),
            base_sha: None,
            head_sha: None,
            pr_number: None,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            max_jobs: DEFAULT_MAX_JOBS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            log_file: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExplainConfig {
    /// Build a config from the ambient GitHub Actions environment.
    ///
    /// Run identity comes from the standard `GITHUB_*` variables; the commit
    /// range and PR number come from the event payload file when present.
    /// Budgets keep their defaults; the CLI layers its flag/env overrides on
    /// top of this.
    pub fn from_env() -> Self {
        let mut config = ExplainConfig {
            repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            run_id: std::env::var("GITHUB_RUN_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            current_job: std::env::var("GITHUB_JOB").unwrap_or_default(),
            workflow_name: std::env::var("GITHUB_WORKFLOW").unwrap_or_default(),
            sha: std::env::var("GITHUB_SHA").unwrap_or_default(),
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string()),
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            ..ExplainConfig::default()
        };

        if let Ok(path) = std::env::var("GITHUB_EVENT_PATH") {
            config.apply_event_context(Path::new(&path));
        }
        config
    }

    /// Pull the commit range and PR number out of the event payload file.
    ///
    /// Unreadable or unexpected payloads leave the fields as they were; the
    /// git context is enrichment, never a requirement.
    pub fn apply_event_context(&mut self, event_path: &Path) {
        let event: Value = match std::fs::read_to_string(event_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
        {
            Some(v) => v,
            None => {
                debug!(path = %event_path.display(), "event payload unavailable");
                return;
            }
        };

        if let Some(pr) = event.get("pull_request") {
            self.base_sha = string_at(pr, &["base", "sha"]);
            self.head_sha = string_at(pr, &["head", "sha"]);
            self.pr_number = pr.get("number").and_then(Value::as_u64);
        } else {
            self.base_sha = event.get("before").and_then(Value::as_str).map(str::to_string);
            self.head_sha = event.get("after").and_then(Value::as_str).map(str::to_string);
        }

        // A push that creates the branch reports an all-zero "before" SHA;
        // there is no comparable base in that case.
        if self
            .base_sha
            .as_deref()
            .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c == '0'))
        {
            self.base_sha = None;
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        match self.repository.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {}
            _ => {
                return Err(ExplainError::Config(format!(
                    "repository must be owner/repo, got '{}'",
                    self.repository
                )))
            }
        }
        if self.job_name.is_empty() {
            return Err(ExplainError::Config("job name must not be empty".to_string()));
        }
        if self.max_log_bytes == 0 || self.max_jobs == 0 || self.max_request_bytes == 0 {
            return Err(ExplainError::Config(
                "byte and job budgets must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> ExplainConfig {
        ExplainConfig {
            repository: "acme/widgets".to_string(),
            job_name: "test".to_string(),
            ..ExplainConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ExplainConfig::default();
        assert_eq!(config.max_log_bytes, 64 * 1024);
        assert_eq!(config.max_jobs, 10);
        assert_eq!(config.max_request_bytes, 512 * 1024);
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
    }

    #[test]
    fn test_validate_accepts_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_repository() {
        for repo in ["", "acme", "/widgets", "acme/"] {
            let config = ExplainConfig {
                repository: repo.to_string(),
                ..valid()
            };
            assert!(config.validate().is_err(), "accepted '{repo}'");
        }
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let config = ExplainConfig {
            max_request_bytes: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_event_context_pull_request() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pull_request": {{"number": 17, "base": {{"sha": "base123"}}, "head": {{"sha": "head456"}}}}}}"#
        )
        .unwrap();

        let mut config = valid();
        config.apply_event_context(file.path());
        assert_eq!(config.base_sha.as_deref(), Some("base123"));
        assert_eq!(config.head_sha.as_deref(), Some("head456"));
        assert_eq!(config.pr_number, Some(17));
    }

    #[test]
    fn test_event_context_push() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"before": "aaa111", "after": "bbb222"}}"#).unwrap();

        let mut config = valid();
        config.apply_event_context(file.path());
        assert_eq!(config.base_sha.as_deref(), Some("aaa111"));
        assert_eq!(config.head_sha.as_deref(), Some("bbb222"));
        assert_eq!(config.pr_number, None);
    }

    #[test]
    fn test_event_context_zero_before_sha_dropped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"before": "0000000000000000000000000000000000000000", "after": "bbb222"}}"#
        )
        .unwrap();

        let mut config = valid();
        config.apply_event_context(file.path());
        assert_eq!(config.base_sha, None);
    }

    #[test]
    fn test_event_context_missing_file_is_harmless() {
        let mut config = valid();
        config.apply_event_context(Path::new("/nonexistent/event.json"));
        assert_eq!(config.base_sha, None);
        assert_eq!(config.pr_number, None);
    }
}
