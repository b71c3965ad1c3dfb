//! Per-job log fetching and multi-job fan-out collection.
//!
//! One failed job's log is the payload's centerpiece; the other failed jobs
//! in the same run are collected alongside it, each independently fetched,
//! extracted, and truncated so one inaccessible job never blocks the rest.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ExplainConfig;
use crate::domain::error::Result;
use crate::domain::excerpt::LogExcerpt;
use crate::extract::RelevanceExtractor;
use crate::github::{WorkflowHost, WorkflowJob};
use crate::truncate::truncate_to_bytes;

/// Returned when no completed job matches the requested name.
pub const NO_MATCHING_JOB_PLACEHOLDER: &str =
    "No log available: no completed job matched the requested job name.";

/// Fetch, extract, and truncate the log for one named job.
///
/// Prefers the local log-file override when configured (offline and test
/// runs). Otherwise the job is matched by exact name against the run's job
/// listing, excluding the job this tool itself runs in; re-run duplicates
/// resolve to the highest job id. Every failure path yields a descriptive
/// string rather than an error, so the pipeline always has a payload.
pub async fn fetch_job_log(
    host: &dyn WorkflowHost,
    config: &ExplainConfig,
    extractor: &RelevanceExtractor,
    job_name: &str,
) -> String {
    if let Some(path) = &config.log_file {
        return match tokio::fs::read_to_string(path).await {
            Ok(raw) => reduce(extractor, &raw, config.max_log_bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read log override");
                format!("Failed to read log file {}: {e}", path.display())
            }
        };
    }

    let jobs = match host.list_jobs(config.run_id).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(error = %e, "failed to list workflow jobs");
            return format!("Failed to list jobs for run {}: {e}", config.run_id);
        }
    };

    let job = jobs
        .iter()
        .filter(|j| j.status == "completed" && j.name == job_name && j.name != config.current_job)
        .max_by_key(|j| j.id);
    let Some(job) = job else {
        debug!(job_name, "no matching completed job in listing");
        return NO_MATCHING_JOB_PLACEHOLDER.to_string();
    };

    match host.download_job_log(job.id).await {
        Ok(raw) => reduce(extractor, &raw, config.max_log_bytes),
        Err(e) => {
            warn!(job = %job.name, job_id = job.id, error = %e, "failed to download job log");
            format!("Failed to download log for job '{}': {e}", job.name)
        }
    }
}

/// Collect bounded log excerpts for every other failed job in the run.
///
/// Candidates are `completed`/`failure` jobs other than the current one,
/// capped at `max_jobs`. Downloads run as interleaved tasks; results come
/// back in listing order. A job whose download fails is logged and skipped.
/// An empty list is a valid outcome.
pub async fn collect_failed_job_logs(
    host: Arc<dyn WorkflowHost>,
    config: &ExplainConfig,
    extractor: Arc<RelevanceExtractor>,
) -> Result<Vec<LogExcerpt>> {
    let jobs = host.list_jobs(config.run_id).await?;
    let mut candidates: Vec<WorkflowJob> = jobs
        .into_iter()
        .filter(|j| j.is_completed_failure() && j.name != config.current_job)
        .collect();

    if candidates.len() > config.max_jobs {
        warn!(
            candidates = candidates.len(),
            kept = config.max_jobs,
            "too many failed jobs; analyzing the first max-jobs of them"
        );
        candidates.truncate(config.max_jobs);
    }

    let mut handles = Vec::with_capacity(candidates.len());
    for job in candidates {
        let host = Arc::clone(&host);
        let extractor = Arc::clone(&extractor);
        let budget = config.max_log_bytes;
        handles.push(tokio::spawn(async move {
            let conclusion = job.conclusion_kind();
            match host.download_job_log(job.id).await {
                Ok(raw) => Some(LogExcerpt {
                    job_name: job.name,
                    log_text: reduce(&extractor, &raw, budget),
                    conclusion,
                }),
                Err(e) => {
                    warn!(job = %job.name, job_id = job.id, error = %e, "skipping job with unavailable log");
                    None
                }
            }
        }));
    }

    // Awaiting in spawn order keeps the result list in listing order even
    // though the downloads interleave.
    let mut excerpts = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Some(excerpt)) => excerpts.push(excerpt),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "log collection task failed"),
        }
    }

    info!(excerpts = excerpts.len(), "collected failed-job logs");
    Ok(excerpts)
}

fn reduce(extractor: &RelevanceExtractor, raw: &str, budget: usize) -> String {
    truncate_to_bytes(&extractor.extract(raw), budget).to_string()
}
