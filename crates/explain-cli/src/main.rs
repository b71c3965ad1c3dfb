//! CI Explain - failure explanation for CI runs
//!
//! The `ci-explain` command gathers log evidence for a failed workflow job,
//! submits it to the analyzer service, and renders the diagnosis.
//!
//! ## Commands
//!
//! - `run`: analyze a failed job and render/post the diagnosis
//! - `extract`: reduce a local log file with the relevance extractor

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use explain_core::{
    collect_failed_job_logs, collect_git_context, fetch_job_log, head_commit_context,
    init_tracing, render_summary, review_comments, serialize_within_limit, truncate_to_bytes,
    AnalysisPayload, AnalysisResult, AnalyzerClient, ExplainConfig, GitContext, GithubClient,
    RelevanceExtractor, WorkflowHost, COMMENT_MARKER,
};

#[derive(Parser)]
#[command(name = "ci-explain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Explain failed CI jobs with the analyzer service", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a failed job in the current workflow run
    Run {
        /// Name of the failed job to analyze
        #[arg(long)]
        job: Option<String>,

        /// Analyzer service base URL
        #[arg(long, env = "CI_EXPLAIN_SERVICE_URL")]
        service_url: Option<String>,

        /// Analyzer service credential
        #[arg(long, env = "CI_EXPLAIN_TOKEN", hide_env_values = true)]
        service_token: Option<String>,

        /// Per-job log excerpt budget in bytes
        #[arg(long, env = "CI_EXPLAIN_MAX_LOG_BYTES")]
        max_log_bytes: Option<usize>,

        /// Maximum number of other failed jobs to collect
        #[arg(long, env = "CI_EXPLAIN_MAX_JOBS")]
        max_jobs: Option<usize>,

        /// Hard ceiling on the serialized request body in bytes
        #[arg(long, env = "CI_EXPLAIN_MAX_REQUEST_BYTES")]
        max_request_bytes: Option<usize>,

        /// Local log file to analyze instead of downloading from the API
        #[arg(long, env = "CI_EXPLAIN_LOG_FILE")]
        log_file: Option<PathBuf>,

        /// Also collect the other failed jobs in the run
        #[arg(long)]
        all_jobs: bool,

        /// Post or replace the pull-request comment with the diagnosis
        #[arg(long)]
        comment: bool,

        /// Post structured fix suggestions as inline review comments
        #[arg(long)]
        review: bool,

        /// Repository checkout to inspect for git context
        #[arg(long, default_value = ".")]
        repo_dir: PathBuf,
    },

    /// Reduce a local log file with the relevance extractor
    Extract {
        /// Log file to reduce
        file: PathBuf,

        /// Byte budget for the excerpt
        #[arg(long, default_value_t = explain_core::DEFAULT_MAX_LOG_BYTES)]
        max_bytes: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            job,
            service_url,
            service_token,
            max_log_bytes,
            max_jobs,
            max_request_bytes,
            log_file,
            all_jobs,
            comment,
            review,
            repo_dir,
        } => {
            let config = build_config(
                job,
                service_url,
                service_token,
                max_log_bytes,
                max_jobs,
                max_request_bytes,
                log_file,
            )?;
            run(config, all_jobs, comment, review, &repo_dir).await
        }
        Commands::Extract { file, max_bytes } => extract(&file, max_bytes),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    job: Option<String>,
    service_url: Option<String>,
    service_token: Option<String>,
    max_log_bytes: Option<usize>,
    max_jobs: Option<usize>,
    max_request_bytes: Option<usize>,
    log_file: Option<PathBuf>,
) -> Result<ExplainConfig> {
    let mut config = ExplainConfig::from_env();

    if let Some(url) = service_url {
        config.service_url = url;
    }
    if let Some(token) = service_token {
        config.service_token = Some(token);
    }
    if let Some(bytes) = max_log_bytes {
        config.max_log_bytes = bytes;
    }
    if let Some(jobs) = max_jobs {
        config.max_jobs = jobs;
    }
    if let Some(bytes) = max_request_bytes {
        config.max_request_bytes = bytes;
    }
    if let Some(path) = log_file {
        config.log_file = Some(path);
    }

    match job {
        Some(name) => config.job_name = name,
        None if config.log_file.is_some() => {
            // Offline analysis of a local file; the job name is only a label.
            if config.job_name.is_empty() {
                config.job_name = if config.current_job.is_empty() {
                    "local-log".to_string()
                } else {
                    config.current_job.clone()
                };
            }
        }
        None => bail!("--job is required unless --log-file is provided"),
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(
    config: ExplainConfig,
    all_jobs: bool,
    comment: bool,
    review: bool,
    repo_dir: &std::path::Path,
) -> Result<()> {
    let extractor = Arc::new(RelevanceExtractor::new());
    let host = Arc::new(GithubClient::new(&config));

    let log = fetch_job_log(host.as_ref(), &config, &extractor, &config.job_name).await;

    let failed_jobs = if all_jobs {
        collect_failed_job_logs(
            Arc::clone(&host) as Arc<dyn WorkflowHost>,
            &config,
            Arc::clone(&extractor),
        )
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not collect other failed jobs");
                Vec::new()
            })
    } else {
        Vec::new()
    };

    let git_context = match (&config.base_sha, &config.head_sha) {
        (Some(base), Some(head)) => {
            Some(collect_git_context(repo_dir, base, head, host.as_ref()).await)
        }
        (None, Some(head)) => Some(head_commit_context(head, host.as_ref()).await),
        _ => None,
    };
    let git_context = git_context.filter(|c| *c != GitContext::default());

    let payload = AnalysisPayload {
        repository: config.repository.clone(),
        run_id: config.run_id,
        workflow_name: config.workflow_name.clone(),
        job_name: config.job_name.clone(),
        sha: config.sha.clone(),
        log,
        failed_jobs,
        pr_number: config.pr_number,
        git_context,
    };
    let body = serialize_within_limit(&payload, config.max_request_bytes)?;

    info!(
        bytes = body.len(),
        job = %config.job_name,
        "submitting failure for analysis"
    );
    let result = AnalyzerClient::new(&config).explain(body).await?;

    let summary = render_summary(&result, &config.job_name);
    write_summary(&summary)?;

    if comment {
        match config.pr_number {
            Some(pr) => {
                host.upsert_issue_comment(pr, COMMENT_MARKER, &summary)
                    .await
                    .context("posting pull-request comment")?;
            }
            // No PR in the event (push build): attach to the commit instead.
            None => {
                host.create_commit_comment(&config.sha, &summary)
                    .await
                    .context("posting commit comment")?;
            }
        }
    }

    if review {
        if let (Some(pr), AnalysisResult::Explanation(explanation)) = (config.pr_number, &result) {
            let comments = review_comments(explanation);
            if comments.is_empty() {
                info!("no structured fix suggestions to post as a review");
            } else {
                clear_stale_review_comments(&host, pr).await;
                host.create_review_with_comments(
                    pr,
                    &config.sha,
                    &format!("Automated failure analysis.\n\n{COMMENT_MARKER}"),
                    &comments,
                )
                .await
                .context("posting review comments")?;
            }
        }
    }

    match &result {
        AnalysisResult::Explanation(_) => info!("analysis complete"),
        AnalysisResult::Skipped { reason } => {
            info!(reason = reason.as_deref().unwrap_or("unspecified"), "analysis skipped by the service")
        }
        AnalysisResult::RateLimited(rate) => {
            warn!(limit = rate.limit, remaining = rate.remaining, "analysis rate limited")
        }
    }
    Ok(())
}

/// Delete review comments from previous runs so suggestions don't pile up.
/// Cleanup failures are logged and ignored; posting fresh comments matters
/// more than removing stale ones.
async fn clear_stale_review_comments(host: &GithubClient, pr: u64) {
    match host.list_review_comments(pr).await {
        Ok(comments) => {
            for comment in comments {
                if comment.body.contains(COMMENT_MARKER) {
                    if let Err(e) = host.delete_review_comment(comment.id).await {
                        warn!(comment_id = comment.id, error = %e, "failed to delete stale review comment");
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "failed to list review comments"),
    }
}

/// Append to the job summary file when running under Actions, else stdout.
fn write_summary(summary: &str) -> Result<()> {
    if let Ok(path) = std::env::var("GITHUB_STEP_SUMMARY") {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening step summary file {path}"))?;
        writeln!(file, "{summary}")?;
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn extract(file: &std::path::Path, max_bytes: usize) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading log file {}", file.display()))?;
    let reduced = RelevanceExtractor::new().extract(&raw);
    println!("{}", truncate_to_bytes(&reduced, max_bytes));
    Ok(())
}
