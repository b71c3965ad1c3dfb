//! Last-mile request size governance.
//!
//! Individual log excerpts respect their own budgets, but aggregate
//! metadata (diff, commit messages, many jobs) can still push the request
//! over the transport limit. The governor serializes the payload exactly
//! once and refuses to let an oversized body reach the network layer.

use tracing::debug;

use crate::domain::error::{ExplainError, Result};
use crate::domain::payload::AnalysisPayload;

/// Serialize `payload` and enforce the request ceiling.
///
/// Returns the serialized body for the client to send, so the payload is
/// measured and transmitted from the same bytes. Oversized payloads fail
/// fast with the remedy in the error message; nothing is silently trimmed.
pub fn serialize_within_limit(
    payload: &AnalysisPayload,
    max_request_bytes: usize,
) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(payload)?;
    if body.len() > max_request_bytes {
        return Err(ExplainError::PayloadTooLarge {
            bytes: body.len(),
            limit: max_request_bytes,
        });
    }
    debug!(
        bytes = body.len(),
        limit = max_request_bytes,
        "payload within request ceiling"
    );
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with_log(log: &str) -> AnalysisPayload {
        AnalysisPayload {
            repository: "acme/widgets".to_string(),
            run_id: 1,
            workflow_name: "ci".to_string(),
            job_name: "test".to_string(),
            sha: "deadbeef".to_string(),
            log: log.to_string(),
            failed_jobs: Vec::new(),
            pr_number: None,
            git_context: None,
        }
    }

    #[test]
    fn test_accepts_payload_under_ceiling() {
        let payload = payload_with_log("short");
        let body = serialize_within_limit(&payload, 4096).unwrap();
        assert!(body.len() <= 4096);
    }

    #[test]
    fn test_accepts_payload_exactly_at_ceiling() {
        let payload = payload_with_log("x");
        let exact = serde_json::to_vec(&payload).unwrap().len();
        assert!(serialize_within_limit(&payload, exact).is_ok());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let payload = payload_with_log(&"x".repeat(10_000));
        let err = serialize_within_limit(&payload, 1024).unwrap_err();
        match err {
            ExplainError::PayloadTooLarge { bytes, limit } => {
                assert!(bytes > 1024);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_rejection_message_names_remedy() {
        let payload = payload_with_log(&"x".repeat(10_000));
        let err = serialize_within_limit(&payload, 1024).unwrap_err();
        assert!(err.to_string().contains("--max-log-bytes"));
    }
}
