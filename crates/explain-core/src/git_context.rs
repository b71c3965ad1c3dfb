//! Diff and commit context for the failing change.
//!
//! Local git inspection is preferred (fast, no network); the host API's
//! compare endpoint is the fallback. Either way the context is enrichment:
//! when both paths fail the pipeline continues with an empty context.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::error::{ExplainError, Result};
use crate::github::WorkflowHost;

/// Bound on each git subprocess, so a hung hook or pager never stalls the run.
const GIT_TIMEOUT_SECS: u64 = 5;

const MAX_DIFF_CHARS: usize = 20_000;
const MAX_COMMIT_MESSAGE_CHARS: usize = 4_000;
const DIFF_TRUNCATION_MARKER: &str = "... [diff truncated]";

/// Change context attached to the analysis payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitContext {
    /// Paths modified between base and head.
    pub changed_files: Vec<String>,

    /// Unified diff, capped and tail-truncated with a marker.
    pub diff: String,

    /// Commit subject lines between base and head, newest first.
    pub commit_messages: String,

    /// Every changed path looks like test code.
    pub only_test_changes: bool,

    /// Some changed path is a dependency lockfile.
    pub touches_lockfile: bool,

    /// Some changed path is CI configuration.
    pub touches_ci_config: bool,
}

/// Gather change context for the `base..head` range.
///
/// Never fails: local git first, host API second, empty context last.
pub async fn collect_git_context(
    repo_dir: &Path,
    base: &str,
    head: &str,
    host: &dyn WorkflowHost,
) -> GitContext {
    match local_git_context(repo_dir, base, head).await {
        Ok(context) => context,
        Err(e) => {
            debug!(error = %e, "local git inspection failed; trying host API");
            match api_git_context(base, head, host).await {
                Ok(context) => context,
                Err(e) => {
                    warn!(error = %e, "git context unavailable; continuing without it");
                    GitContext::default()
                }
            }
        }
    }
}

/// Head-only context for events with no comparable base (e.g. a push that
/// created the branch): one commit's files and message via the host API.
pub async fn head_commit_context(head: &str, host: &dyn WorkflowHost) -> GitContext {
    match host.get_commit(head).await {
        Ok(info) => {
            let changed_files: Vec<String> =
                info.files.iter().map(|f| f.filename.clone()).collect();
            let diff = patches_to_diff(&info.files);
            build_context(changed_files, &diff, &info.commit.message)
        }
        Err(e) => {
            warn!(error = %e, "head commit context unavailable");
            GitContext::default()
        }
    }
}

async fn local_git_context(repo_dir: &Path, base: &str, head: &str) -> Result<GitContext> {
    let range = format!("{base}...{head}");
    let files_raw = run_git(repo_dir, &["diff", "--name-only", &range]).await?;
    let diff = run_git(repo_dir, &["diff", &range]).await?;
    let messages = run_git(repo_dir, &["log", "--format=%s", &format!("{base}..{head}")]).await?;

    let changed_files: Vec<String> = files_raw
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    Ok(build_context(changed_files, &diff, &messages))
}

async fn api_git_context(base: &str, head: &str, host: &dyn WorkflowHost) -> Result<GitContext> {
    let comparison = host.compare_commits(base, head).await?;
    let changed_files: Vec<String> = comparison
        .files
        .iter()
        .map(|f| f.filename.clone())
        .collect();
    let diff = patches_to_diff(&comparison.files);
    let messages = comparison
        .commits
        .iter()
        .map(|c| c.commit.message.lines().next().unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(build_context(changed_files, &diff, &messages))
}

fn patches_to_diff(files: &[crate::github::ComparisonFile]) -> String {
    files
        .iter()
        .filter_map(|f| f.patch.as_ref().map(|p| format!("--- {}\n{p}", f.filename)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_context(changed_files: Vec<String>, diff: &str, messages: &str) -> GitContext {
    let only_test_changes =
        !changed_files.is_empty() && changed_files.iter().all(|p| is_test_path(p));
    let touches_lockfile = changed_files.iter().any(|p| is_lockfile(p));
    let touches_ci_config = changed_files.iter().any(|p| is_ci_config(p));

    GitContext {
        diff: cap_chars(diff.trim_end(), MAX_DIFF_CHARS, DIFF_TRUNCATION_MARKER),
        commit_messages: cap_chars(messages.trim_end(), MAX_COMMIT_MESSAGE_CHARS, "..."),
        changed_files,
        only_test_changes,
        touches_lockfile,
        touches_ci_config,
    }
}

async fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = tokio::time::timeout(
        Duration::from_secs(GIT_TIMEOUT_SECS),
        tokio::process::Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output(),
    )
    .await
    .map_err(|_| {
        ExplainError::Git(format!(
            "git {} timed out after {GIT_TIMEOUT_SECS}s",
            args.join(" ")
        ))
    })?
    .map_err(|e| ExplainError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExplainError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Keep the head of `s` up to `max_chars` characters, marking the cut.
fn cap_chars(s: &str, max_chars: usize, marker: &str) -> String {
    let mut chars = s.chars();
    let kept: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_none() {
        return kept;
    }
    format!("{kept}\n{marker}")
}

fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("tests/")
        || lower.starts_with("test/")
        || lower.starts_with("spec/")
        || lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.contains("/spec/")
        || lower.contains("_test.")
        || lower.contains(".test.")
        || lower.contains(".spec.")
}

fn is_lockfile(path: &str) -> bool {
    const LOCKFILES: &[&str] = &[
        "Cargo.lock",
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "poetry.lock",
        "uv.lock",
        "Gemfile.lock",
        "go.sum",
        "composer.lock",
    ];
    let name = path.rsplit('/').next().unwrap_or(path);
    LOCKFILES.contains(&name)
}

fn is_ci_config(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    path.starts_with(".github/workflows/")
        || path.starts_with(".circleci/")
        || path.starts_with(".gitlab-ci")
        || path.starts_with("azure-pipelines")
        || name.starts_with("Jenkinsfile")
}
