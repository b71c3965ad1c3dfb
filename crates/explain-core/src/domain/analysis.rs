//! Parsed analyzer responses.
//!
//! The service's response body is polymorphic: a normal explanation, a
//! rate-limit notice, or a deliberate skip. The shapes are resolved once
//! here, at the parsing boundary, into an explicit [`AnalysisResult`] union
//! so render sites never probe optional fields ad hoc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::Result;

/// Outcome of one analysis request.
///
/// Created from one HTTP response and handed once to rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// A normal diagnosis was produced.
    Explanation(Explanation),

    /// The repository's analysis quota is exhausted.
    RateLimited(RateLimitInfo),

    /// The service deliberately declined to analyze (nothing actionable).
    Skipped { reason: Option<String> },
}

/// A normal diagnosis returned by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    /// Human-readable summary of why the job failed.
    pub summary: String,

    /// Root cause, when the analyzer could isolate one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,

    /// Analyzer confidence in the diagnosis, 0.0 - 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Suggested fixes, free-form or structured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_suggestions: Vec<FixSuggestion>,

    /// Quota usage merged in from response headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<RateLimitUsage>,
}

/// One suggested fix.
///
/// The service emits either a plain string or a structured object; both
/// arms are resolved here rather than checked at every render site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FixSuggestion {
    Text(String),
    Structured(StructuredFix),
}

/// A structured fix pointing at a concrete location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredFix {
    /// Repository-relative path the fix applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// 1-based line the fix anchors to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    /// What to change and why.
    pub description: String,

    /// Replacement code, when the analyzer produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_code: Option<String>,
}

/// Structured rate-limit notice from a 429 body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitInfo {
    /// Analyses allowed in the rolling window.
    #[serde(default)]
    pub limit: u32,

    /// Analyses remaining in the window.
    #[serde(default)]
    pub remaining: u32,

    /// When the window resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// Quota usage reported via `x-ratelimit-*` response headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_remaining: Option<u32>,
}

impl RateLimitUsage {
    /// Extract quota headers from an analyzer response.
    ///
    /// Returns `None` when no `x-ratelimit-*` header is present at all, so
    /// responses without quota metadata stay lean.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Option<Self> {
        fn header_num<T: std::str::FromStr>(
            headers: &reqwest::header::HeaderMap,
            name: &str,
        ) -> Option<T> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        let usage = RateLimitUsage {
            limit: header_num(headers, "x-ratelimit-limit"),
            remaining: header_num(headers, "x-ratelimit-remaining"),
            reset: header_num(headers, "x-ratelimit-reset"),
            grace_period: header_num(headers, "x-ratelimit-grace-period"),
            grace_remaining: header_num(headers, "x-ratelimit-grace-remaining"),
        };
        (usage != RateLimitUsage::default()).then_some(usage)
    }
}

impl AnalysisResult {
    /// Resolve a 2xx response body into the result union.
    ///
    /// A body declaring `skipped: true` or `rate_limited: true` is mapped to
    /// the corresponding variant; anything else must deserialize as an
    /// [`Explanation`], with header usage merged in.
    pub fn parse_success(body: &str, usage: Option<RateLimitUsage>) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;

        if value.get("skipped").and_then(Value::as_bool) == Some(true) {
            let reason = value
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(AnalysisResult::Skipped { reason });
        }

        if value.get("rate_limited").and_then(Value::as_bool) == Some(true) {
            let info: RateLimitInfo = serde_json::from_value(value)?;
            return Ok(AnalysisResult::RateLimited(info));
        }

        let mut explanation: Explanation = serde_json::from_value(value)?;
        explanation.usage = usage;
        Ok(AnalysisResult::Explanation(explanation))
    }

    /// Parse a 429 body into structured rate-limit info, falling back to
    /// header values when the body is not the documented shape.
    pub fn parse_rate_limit(body: &str, usage: Option<&RateLimitUsage>) -> Option<RateLimitInfo> {
        if let Ok(info) = serde_json::from_str::<RateLimitInfo>(body) {
            return Some(info);
        }
        usage.map(|u| RateLimitInfo {
            limit: u.limit.unwrap_or_default(),
            remaining: u.remaining.unwrap_or_default(),
            reset_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_explanation() {
        let body = r#"{
            "summary": "The test suite failed because of a missing fixture.",
            "root_cause": "tests/fixtures/data.json was deleted",
            "fix_suggestions": [
                "Restore the fixture file",
                {"path": "tests/common.rs", "line": 12, "description": "guard the fixture load", "suggested_code": "let data = load_fixture()?;"}
            ]
        }"#;
        let result = AnalysisResult::parse_success(body, None).unwrap();
        match result {
            AnalysisResult::Explanation(e) => {
                assert!(e.summary.contains("missing fixture"));
                assert_eq!(e.fix_suggestions.len(), 2);
                assert!(matches!(e.fix_suggestions[0], FixSuggestion::Text(_)));
                match &e.fix_suggestions[1] {
                    FixSuggestion::Structured(fix) => {
                        assert_eq!(fix.path.as_deref(), Some("tests/common.rs"));
                        assert_eq!(fix.line, Some(12));
                    }
                    other => panic!("expected structured fix, got {other:?}"),
                }
            }
            other => panic!("expected explanation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_skipped() {
        let body = r#"{"skipped": true, "reason": "log contains no failure signal"}"#;
        let result = AnalysisResult::parse_success(body, None).unwrap();
        assert_eq!(
            result,
            AnalysisResult::Skipped {
                reason: Some("log contains no failure signal".to_string())
            }
        );
    }

    #[test]
    fn test_parse_success_rate_limited_in_body() {
        let body = r#"{"rate_limited": true, "limit": 35, "remaining": 0}"#;
        let result = AnalysisResult::parse_success(body, None).unwrap();
        match result {
            AnalysisResult::RateLimited(info) => {
                assert_eq!(info.limit, 35);
                assert_eq!(info.remaining, 0);
            }
            other => panic!("expected rate-limited, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_merges_header_usage() {
        let usage = RateLimitUsage {
            limit: Some(35),
            remaining: Some(12),
            ..Default::default()
        };
        let result =
            AnalysisResult::parse_success(r#"{"summary": "it broke"}"#, Some(usage.clone()))
                .unwrap();
        match result {
            AnalysisResult::Explanation(e) => assert_eq!(e.usage, Some(usage)),
            other => panic!("expected explanation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rate_limit_body_shape() {
        let body = r#"{"limit":35,"remaining":0,"reset_at":"2026-02-01T00:00:00Z"}"#;
        let info = AnalysisResult::parse_rate_limit(body, None).unwrap();
        assert_eq!(info.limit, 35);
        assert_eq!(info.remaining, 0);
        assert!(info.reset_at.is_some());
    }

    #[test]
    fn test_parse_rate_limit_falls_back_to_headers() {
        let usage = RateLimitUsage {
            limit: Some(10),
            remaining: Some(0),
            ..Default::default()
        };
        let info = AnalysisResult::parse_rate_limit("not json", Some(&usage)).unwrap();
        assert_eq!(info.limit, 10);
        assert_eq!(info.remaining, 0);
    }

    #[test]
    fn test_fix_suggestion_untagged_roundtrip() {
        let suggestions = vec![
            FixSuggestion::Text("pin the dependency".to_string()),
            FixSuggestion::Structured(StructuredFix {
                path: Some("Cargo.toml".to_string()),
                line: None,
                description: "pin serde to 1.0".to_string(),
                suggested_code: None,
            }),
        ];
        let json = serde_json::to_string(&suggestions).unwrap();
        let parsed: Vec<FixSuggestion> = serde_json::from_str(&json).unwrap();
        assert_eq!(suggestions, parsed);
    }
}
