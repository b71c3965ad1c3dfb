//! The outbound request body sent to the analyzer service.

use serde::{Deserialize, Serialize};

use crate::domain::excerpt::LogExcerpt;
use crate::git_context::GitContext;

/// The full JSON body of one `POST /v1/explain` request.
///
/// Combines run identity, the target job's log excerpt, any other failed
/// jobs' excerpts, and optional git context. Its serialized byte size must
/// stay under the configured request ceiling; the size governor checks this
/// before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// `owner/repo` of the repository under analysis.
    pub repository: String,

    /// Workflow run id the failure occurred in.
    pub run_id: u64,

    /// Workflow name, for display in the diagnosis.
    pub workflow_name: String,

    /// Name of the failed job being analyzed.
    pub job_name: String,

    /// Head commit SHA of the run.
    pub sha: String,

    /// Extracted log excerpt for the target job.
    pub log: String,

    /// Other failed jobs in the same run, each with its own bounded excerpt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_jobs: Vec<LogExcerpt>,

    /// Pull request number when the run was triggered by a PR event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,

    /// Diff and commit context for the failing change, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_context: Option<GitContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnalysisPayload {
        AnalysisPayload {
            repository: "acme/widgets".to_string(),
            run_id: 42,
            workflow_name: "ci".to_string(),
            job_name: "test".to_string(),
            sha: "deadbeef".to_string(),
            log: "error: boom".to_string(),
            failed_jobs: Vec::new(),
            pr_number: None,
            git_context: None,
        }
    }

    #[test]
    fn test_empty_optionals_are_omitted_from_wire_body() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("failed_jobs"));
        assert!(!json.contains("pr_number"));
        assert!(!json.contains("git_context"));
    }

    #[test]
    fn test_failed_jobs_serialized_when_present() {
        let mut payload = sample();
        payload.failed_jobs = vec![crate::domain::excerpt::LogExcerpt::failed(
            "lint",
            "error: unused import",
        )];
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("failed_jobs"));
        assert!(json.contains("unused import"));
    }
}
