//! Analyzer client scenarios against mock HTTP servers.
//!
//! Static responses use httpmock; sequenced responses (fail, fail, recover)
//! use a small scripted TCP responder since the mock servers answer every
//! request identically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use explain_core::{AnalysisResult, AnalyzerClient, ExplainConfig, ExplainError, RetryPolicy};

fn config_for(url: &str) -> ExplainConfig {
    ExplainConfig {
        service_url: url.to_string(),
        service_token: Some("secret-token".to_string()),
        retry: RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 50,
        },
        ..ExplainConfig::default()
    }
}

type ScriptedResponse = (u16, Vec<(&'static str, &'static str)>, &'static str);

/// Serve each scripted response to one connection, in order, then stop.
async fn serve_script(responses: Vec<ScriptedResponse>) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let hit_counter = Arc::clone(&hits);

    tokio::spawn(async move {
        for (status, headers, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            read_request(&mut socket).await;
            hit_counter.fetch_add(1, Ordering::SeqCst);

            let mut response = format!(
                "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                body.len()
            );
            for (name, value) in &headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(body);
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, hits)
}

/// Drain one HTTP request (headers plus content-length body) from a socket.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() - (header_end + 4) >= content_length {
                return;
            }
        }
    }
}

#[tokio::test]
async fn test_two_transient_failures_then_success_means_three_attempts() {
    let (url, hits) = serve_script(vec![
        (503, vec![], "service unavailable"),
        (503, vec![], "service unavailable"),
        (200, vec![], r#"{"summary": "flaky infrastructure"}"#),
    ])
    .await;

    let client = AnalyzerClient::new(&config_for(&url));
    let result = client.explain(b"{}".to_vec()).await.unwrap();

    match result {
        AnalysisResult::Explanation(e) => assert_eq!(e.summary, "flaky infrastructure"),
        other => panic!("expected explanation, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_terminal_status_fails_after_single_attempt() {
    let (url, hits) = serve_script(vec![(400, vec![], r#"{"error": "malformed payload"}"#)]).await;

    let client = AnalyzerClient::new(&config_for(&url));
    let err = client.explain(b"{}".to_vec()).await.unwrap_err();

    match err {
        ExplainError::Service { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("malformed payload"));
        }
        other => panic!("expected service error, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_after_header_overrides_backoff() {
    let (url, hits) = serve_script(vec![
        (
            429,
            vec![("retry-after", "2")],
            r#"{"limit": 35, "remaining": 0}"#,
        ),
        (200, vec![], r#"{"summary": "recovered"}"#),
    ])
    .await;

    let client = AnalyzerClient::new(&config_for(&url));
    let started = Instant::now();
    let result = client.explain(b"{}".to_vec()).await.unwrap();
    let elapsed = started.elapsed();

    // The configured backoff is tens of milliseconds; a ~2s wait proves the
    // header value was used verbatim.
    assert!(elapsed >= Duration::from_secs(2), "waited only {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10));
    assert!(matches!(result, AnalysisResult::Explanation(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_rate_limit_returns_structured_result() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/explain");
            then.status(429)
                .json_body(json!({"limit": 35, "remaining": 0, "reset_at": "2026-02-01T00:00:00Z"}));
        })
        .await;

    let mut config = config_for(&server.base_url());
    config.retry.max_retries = 1;
    let client = AnalyzerClient::new(&config);
    let result = client.explain(b"{}".to_vec()).await.unwrap();

    match result {
        AnalysisResult::RateLimited(info) => {
            assert_eq!(info.limit, 35);
            assert_eq!(info.remaining, 0);
            assert!(info.reset_at.is_some());
        }
        other => panic!("expected rate-limited result, got {other:?}"),
    }
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn test_413_is_a_distinct_error_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/explain");
            then.status(413).body("payload too large");
        })
        .await;

    let client = AnalyzerClient::new(&config_for(&server.base_url()));
    let err = client.explain(b"{}".to_vec()).await.unwrap_err();

    assert!(matches!(err, ExplainError::PayloadRejected));
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_skipped_body_is_a_value_not_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/explain")
                .header("authorization", "Bearer secret-token");
            then.status(200)
                .json_body(json!({"skipped": true, "reason": "draft pull request"}));
        })
        .await;

    let client = AnalyzerClient::new(&config_for(&server.base_url()));
    let result = client.explain(b"{}".to_vec()).await.unwrap();

    assert_eq!(
        result,
        AnalysisResult::Skipped {
            reason: Some("draft pull request".to_string())
        }
    );
}

#[tokio::test]
async fn test_rate_limit_headers_merged_into_explanation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/explain");
            then.status(200)
                .header("x-ratelimit-limit", "35")
                .header("x-ratelimit-remaining", "12")
                .header("x-ratelimit-grace-period", "5")
                .header("x-ratelimit-grace-remaining", "2")
                .json_body(json!({"summary": "dependency conflict"}));
        })
        .await;

    let client = AnalyzerClient::new(&config_for(&server.base_url()));
    let result = client.explain(b"{}".to_vec()).await.unwrap();

    match result {
        AnalysisResult::Explanation(e) => {
            let usage = e.usage.expect("usage headers should be merged");
            assert_eq!(usage.limit, Some(35));
            assert_eq!(usage.remaining, Some(12));
            assert_eq!(usage.grace_period, Some(5));
            assert_eq!(usage.grace_remaining, Some(2));
        }
        other => panic!("expected explanation, got {other:?}"),
    }
}
