//! Markdown renderings of an analysis result.
//!
//! Pure builders: the CLI decides where the output goes (step summary file,
//! stdout, PR comment, review).

use crate::domain::analysis::{
    AnalysisResult, Explanation, FixSuggestion, RateLimitInfo, StructuredFix,
};
use crate::github::ReviewDraftComment;

/// Hidden marker identifying comments authored by this tool, so reruns
/// replace the previous comment instead of piling up.
pub const COMMENT_MARKER: &str = "<!-- ci-explain -->";

/// Render the job-summary markdown for any analysis outcome.
pub fn render_summary(result: &AnalysisResult, job_name: &str) -> String {
    match result {
        AnalysisResult::Explanation(explanation) => render_explanation(explanation, job_name),
        AnalysisResult::RateLimited(info) => render_rate_limited(info),
        AnalysisResult::Skipped { reason } => render_skipped(reason.as_deref()),
    }
}

fn render_explanation(explanation: &Explanation, job_name: &str) -> String {
    let mut out = format!("## Why `{job_name}` failed\n\n{}\n", explanation.summary);

    if let Some(root_cause) = &explanation.root_cause {
        out.push_str(&format!("\n**Root cause:** {root_cause}\n"));
    }

    if !explanation.fix_suggestions.is_empty() {
        out.push_str("\n### Suggested fixes\n\n");
        for suggestion in &explanation.fix_suggestions {
            match suggestion {
                FixSuggestion::Text(text) => out.push_str(&format!("- {text}\n")),
                FixSuggestion::Structured(fix) => out.push_str(&render_structured_fix(fix)),
            }
        }
    }

    if let Some(usage) = &explanation.usage {
        if let (Some(limit), Some(remaining)) = (usage.limit, usage.remaining) {
            out.push_str(&format!("\n_Analyses remaining: {remaining}/{limit}"));
            if let Some(grace) = usage.grace_remaining {
                out.push_str(&format!(" (+{grace} grace)"));
            }
            out.push_str("_\n");
        }
    }

    out.push_str(&format!("\n{COMMENT_MARKER}\n"));
    out
}

fn render_structured_fix(fix: &StructuredFix) -> String {
    let location = match (&fix.path, fix.line) {
        (Some(path), Some(line)) => format!("`{path}:{line}` — "),
        (Some(path), None) => format!("`{path}` — "),
        _ => String::new(),
    };
    let mut out = format!("- {location}{}\n", fix.description);
    if let Some(code) = &fix.suggested_code {
        out.push_str(&format!("\n  ```\n  {}\n  ```\n", code.replace('\n', "\n  ")));
    }
    out
}

fn render_rate_limited(info: &RateLimitInfo) -> String {
    let mut out = format!(
        "## Analysis rate limit reached\n\nThis repository has used all {} analyses in the current window.\n",
        info.limit
    );
    if let Some(reset_at) = info.reset_at {
        out.push_str(&format!("Quota resets at {}.\n", reset_at.to_rfc3339()));
    }
    out.push_str(&format!("\n{COMMENT_MARKER}\n"));
    out
}

fn render_skipped(reason: Option<&str>) -> String {
    format!(
        "## Analysis skipped\n\n{}\n\n{COMMENT_MARKER}\n",
        reason.unwrap_or("The analyzer found nothing actionable in this failure.")
    )
}

/// Map structured fix suggestions with a known path to inline review
/// comments; free-form text suggestions stay in the summary only.
pub fn review_comments(explanation: &Explanation) -> Vec<ReviewDraftComment> {
    explanation
        .fix_suggestions
        .iter()
        .filter_map(|suggestion| match suggestion {
            FixSuggestion::Structured(fix) => fix.path.as_ref().map(|path| ReviewDraftComment {
                path: path.clone(),
                line: fix.line,
                body: review_comment_body(fix),
            }),
            FixSuggestion::Text(_) => None,
        })
        .collect()
}

fn review_comment_body(fix: &StructuredFix) -> String {
    let mut body = fix.description.clone();
    if let Some(code) = &fix.suggested_code {
        body.push_str(&format!("\n\n```suggestion\n{code}\n```"));
    }
    // The marker lets a later run find and remove stale suggestions.
    body.push_str(&format!("\n\n{COMMENT_MARKER}"));
    body
}
