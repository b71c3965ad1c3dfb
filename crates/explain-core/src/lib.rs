//! CI Explain Core Library
//!
//! Re-exports the components of the failure-explanation pipeline: log
//! relevance extraction, byte-safe truncation, multi-job log collection,
//! payload size governance, the resilient analyzer client, and git context.

pub mod client;
pub mod collect;
pub mod config;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod git_context;
pub mod github;
pub mod governor;
pub mod render;
pub mod telemetry;
pub mod truncate;

pub use client::{backoff_delay, AnalyzerClient, RetryPolicy, REQUEST_DEADLINE_SECS};

pub use collect::{collect_failed_job_logs, fetch_job_log, NO_MATCHING_JOB_PLACEHOLDER};

pub use config::{
    ExplainConfig, DEFAULT_MAX_JOBS, DEFAULT_MAX_LOG_BYTES, DEFAULT_MAX_REQUEST_BYTES,
    DEFAULT_SERVICE_URL,
};

pub use domain::{
    AnalysisPayload, AnalysisResult, ExplainError, Explanation, FixSuggestion, JobConclusion,
    LogExcerpt, RateLimitInfo, RateLimitUsage, Result, StructuredFix,
};

pub use extract::RelevanceExtractor;

pub use git_context::{collect_git_context, head_commit_context, GitContext};

pub use github::{
    Comparison, ComparisonCommit, ComparisonFile, CommitDetail, CommitInfo, GithubClient,
    IssueComment, ReviewDraftComment, WorkflowHost, WorkflowJob,
};

pub use governor::serialize_within_limit;

pub use render::{render_summary, review_comments, COMMENT_MARKER};

pub use telemetry::init_tracing;

pub use truncate::truncate_to_bytes;

/// CI Explain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
