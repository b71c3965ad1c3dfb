//! Error-anchored log relevance extraction.
//!
//! Reduces an arbitrarily large CI log to the lines worth sending to the
//! analyzer: lines near error indicators, scoped to failed steps where step
//! markers allow it, deduplicated, in first-seen order. Falls back to the
//! log tail when nothing matches, so the analyzer always receives something
//! representative of how the job ended.

use std::collections::HashSet;

use regex::RegexSet;
use tracing::debug;

/// Lines of leading context pulled in before an error indicator.
const LEADING_CONTEXT_LINES: usize = 10;

/// Lines of trailing context kept after an error indicator.
const TRAILING_CONTEXT_LINES: usize = 30;

/// Tail size returned when no indicator matches at all.
const FALLBACK_TAIL_LINES: usize = 100;

/// Lines that mark the start or end of a CI step.
const STEP_BOUNDARY_PATTERNS: &[&str] = &[
    r"^##\[group\]",
    r"^##\[endgroup\]",
    r"^Run ",
    r"^Post ",
    r"^Set up job",
    r"^Complete job",
];

/// Lines that signal a failure.
const ERROR_INDICATOR_PATTERNS: &[&str] = &[
    r"(?i)\berror\b",
    r"(?i)\bfail(ed|ure)?\b",
    r"(?i)\bexception\b",
    r"(?i)\bfatal\b",
    r"panicked at",
    r"npm ERR!",
    r"(?i)traceback \(most recent call last\)",
    r"(?i)exit(ed)?( with)? code [1-9]",
    r"(?i)command not found",
    r"(?i)no such file or directory",
    r"\b(ENOENT|EACCES|ECONNREFUSED|ECONNRESET|ETIMEDOUT|EPIPE)\b",
    r"(?i)\btimed? ?out\b",
    r"\b(SIGKILL|SIGSEGV|SIGTERM|SIGABRT|SIGBUS)\b",
    r"(?i)\bkilled\b",
    r"[✗✖×]",
];

/// Scan-local state threaded through one extraction pass.
///
/// Recreated per job so concurrent extractions never share anything.
struct ExtractionState<'a> {
    in_failed_step: bool,
    error_context: usize,
    seen: HashSet<&'a str>,
}

impl<'a> ExtractionState<'a> {
    fn new() -> Self {
        Self {
            in_failed_step: false,
            error_context: 0,
            seen: HashSet::new(),
        }
    }

    /// Emit a line unless its exact text was already selected in this pass.
    fn emit(&mut self, out: &mut Vec<&'a str>, line: &'a str) {
        if self.seen.insert(line) {
            out.push(line);
        }
    }

    /// Emit up to [`LEADING_CONTEXT_LINES`] lines preceding `idx`.
    fn emit_preceding(&mut self, out: &mut Vec<&'a str>, lines: &[&'a str], idx: usize) {
        let from = idx.saturating_sub(LEADING_CONTEXT_LINES);
        for line in &lines[from..idx] {
            self.emit(out, line);
        }
    }
}

/// Relevance extractor with pattern sets compiled once at construction.
///
/// Immutable after construction; safe to share across concurrent per-job
/// extraction tasks. Each call to [`extract`](Self::extract) runs with a
/// fresh [`ExtractionState`].
pub struct RelevanceExtractor {
    step_boundaries: RegexSet,
    error_indicators: RegexSet,
}

impl RelevanceExtractor {
    pub fn new() -> Self {
        Self {
            step_boundaries: RegexSet::new(STEP_BOUNDARY_PATTERNS)
                .expect("step boundary patterns must compile"),
            error_indicators: RegexSet::new(ERROR_INDICATOR_PATTERNS)
                .expect("error indicator patterns must compile"),
        }
    }

    /// Reduce a raw log to its relevant lines.
    ///
    /// - A step marker that itself matches an error indicator anchors a
    ///   failed step: leading context is pulled in, then the whole step is
    ///   streamed until the next clean step marker.
    /// - An error indicator outside a failed step selects a local window of
    ///   [`LEADING_CONTEXT_LINES`] before through [`TRAILING_CONTEXT_LINES`]
    ///   after; a further indicator resets the trailing countdown rather
    ///   than stacking it.
    /// - No line is ever emitted twice, whichever rule selects it.
    /// - Zero matches: the last [`FALLBACK_TAIL_LINES`] lines verbatim.
    pub fn extract(&self, log: &str) -> String {
        let lines: Vec<&str> = log.lines().collect();
        let mut state = ExtractionState::new();
        let mut selected: Vec<&str> = Vec::new();

        for (idx, &line) in lines.iter().enumerate() {
            let boundary = self.step_boundaries.is_match(line);
            let indicator = self.error_indicators.is_match(line);

            if boundary {
                if indicator {
                    state.in_failed_step = true;
                    state.emit_preceding(&mut selected, &lines, idx);
                    state.emit(&mut selected, line);
                    state.error_context = TRAILING_CONTEXT_LINES;
                    continue;
                }
                // A clean step marker closes any failed step in progress.
                state.in_failed_step = false;
            }

            if state.in_failed_step {
                state.emit(&mut selected, line);
                if indicator {
                    state.error_context = TRAILING_CONTEXT_LINES;
                }
                continue;
            }

            if indicator {
                state.emit_preceding(&mut selected, &lines, idx);
                state.emit(&mut selected, line);
                state.error_context = TRAILING_CONTEXT_LINES;
                continue;
            }

            if state.error_context > 0 {
                state.emit(&mut selected, line);
                state.error_context -= 1;
            }
        }

        if selected.is_empty() {
            let from = lines.len().saturating_sub(FALLBACK_TAIL_LINES);
            debug!(
                total_lines = lines.len(),
                "no error indicators matched; returning log tail"
            );
            return lines[from..].join("\n");
        }

        debug!(
            total_lines = lines.len(),
            selected_lines = selected.len(),
            "selected relevant log lines"
        );
        selected.join("\n")
    }
}

impl Default for RelevanceExtractor {
    fn default() -> Self {
        Self::new()
    }
}
