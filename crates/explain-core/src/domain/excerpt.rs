//! Log excerpt records handed from collection to payload assembly.

use serde::{Deserialize, Serialize};

/// Terminal conclusion of a workflow job, as reported by the host API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Unknown,
}

impl From<&str> for JobConclusion {
    /// Map the host API's conclusion string; unrecognized values (new ones
    /// GitHub may add) fold into `Unknown` instead of failing the listing.
    fn from(s: &str) -> Self {
        match s {
            "success" => JobConclusion::Success,
            "failure" => JobConclusion::Failure,
            "cancelled" => JobConclusion::Cancelled,
            "skipped" => JobConclusion::Skipped,
            "timed_out" => JobConclusion::TimedOut,
            "action_required" => JobConclusion::ActionRequired,
            "neutral" => JobConclusion::Neutral,
            _ => JobConclusion::Unknown,
        }
    }
}

/// A bounded slice of one job's log, selected for analysis.
///
/// Produced by the per-job fetcher and owned by the multi-job collector until
/// it is handed to payload assembly. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogExcerpt {
    /// Job name as listed by the host API.
    pub job_name: String,

    /// Extracted, budget-bounded log text.
    pub log_text: String,

    /// The job's terminal conclusion.
    pub conclusion: JobConclusion,
}

impl LogExcerpt {
    pub fn failed(job_name: impl Into<String>, log_text: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            log_text: log_text.into(),
            conclusion: JobConclusion::Failure,
        }
    }
}
