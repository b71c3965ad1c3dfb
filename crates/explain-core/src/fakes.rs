//! In-memory host fakes for exercising the pipeline without GitHub.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::error::{ExplainError, Result};
use crate::github::{Comparison, CommitInfo, WorkflowHost, WorkflowJob};

/// A [`WorkflowHost`] backed by fixed data.
///
/// Jobs are returned in insertion order; downloading a job id with no
/// registered log fails, which is how tests simulate an inaccessible job.
#[derive(Default)]
pub struct StaticHost {
    jobs: Vec<WorkflowJob>,
    logs: HashMap<u64, String>,
    comparison: Option<Comparison>,
    commit: Option<CommitInfo>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(mut self, id: u64, name: &str, status: &str, conclusion: Option<&str>) -> Self {
        self.jobs.push(WorkflowJob {
            id,
            name: name.to_string(),
            status: status.to_string(),
            conclusion: conclusion.map(str::to_string),
        });
        self
    }

    /// Register a completed, failed job in one call.
    pub fn failed_job(self, id: u64, name: &str) -> Self {
        self.job(id, name, "completed", Some("failure"))
    }

    pub fn log(mut self, job_id: u64, text: &str) -> Self {
        self.logs.insert(job_id, text.to_string());
        self
    }

    pub fn comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = Some(comparison);
        self
    }

    pub fn commit(mut self, commit: CommitInfo) -> Self {
        self.commit = Some(commit);
        self
    }
}

#[async_trait]
impl WorkflowHost for StaticHost {
    async fn list_jobs(&self, _run_id: u64) -> Result<Vec<WorkflowJob>> {
        Ok(self.jobs.clone())
    }

    async fn download_job_log(&self, job_id: u64) -> Result<String> {
        self.logs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| ExplainError::Github(format!("no log available for job {job_id}")))
    }

    async fn compare_commits(&self, _base: &str, _head: &str) -> Result<Comparison> {
        self.comparison
            .clone()
            .ok_or_else(|| ExplainError::Github("comparison unavailable".to_string()))
    }

    async fn get_commit(&self, _sha: &str) -> Result<CommitInfo> {
        self.commit
            .clone()
            .ok_or_else(|| ExplainError::Github("commit unavailable".to_string()))
    }
}
