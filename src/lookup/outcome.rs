// src/lookup/outcome.rs

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum number of characters of a rejected response body kept in a diagnostic.
const REJECTED_BODY_PREVIEW_CHARS: usize = 200;

/// Why a single attempt against the registry failed.
///
/// `Display` strings are the exact diagnostics surfaced in the aggregated
/// exhaustion summary, so they stay short and stable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("429 rate limited")]
    RateLimited,
    #[error("{0} unauthorized/forbidden")]
    Unauthorized(u16),
    #[error("server error {0}")]
    ServerError(u16),
    #[error("{status} response: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid JSON in response")]
    InvalidJson,
    #[error("empty JSON response")]
    EmptyBody,
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Decision for the rotation loop after one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptDisposition {
    /// Non-empty JSON payload received. The loop returns it immediately.
    Success(Value),
    /// Transient failure. Sleep with backoff and retry the same key.
    Retry(FailureReason),
    /// The key is saturated (rejected, rate limited, or answering with no
    /// data). Stop retrying it and advance to the next key.
    Saturated(FailureReason),
}

/// One recorded failure, kept in chronological order across all keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub key_label: String,
    pub attempt: u32,
    pub reason: FailureReason,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: attempt {}: {}", self.key_label, self.attempt, self.reason)
    }
}

/// Aggregated diagnostic raised once every key has been exhausted.
///
/// Attempts are structured records rather than pre-joined text so tests and
/// callers can inspect individual entries; `Display` renders the multi-line
/// summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExhaustionReport {
    pub attempts: Vec<AttemptFailure>,
}

impl std::error::Error for ExhaustionReport {}

impl ExhaustionReport {
    pub fn record(&mut self, key_label: &str, attempt: u32, reason: FailureReason) {
        self.attempts.push(AttemptFailure {
            key_label: key_label.to_string(),
            attempt,
            reason,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl std::fmt::Display for ExhaustionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "All API keys exhausted or failed. Summary:")?;
        for failure in &self.attempts {
            write!(f, "\n{failure}")?;
        }
        Ok(())
    }
}

/// Classifies one registry reply into the next action for the rotation loop.
///
/// The mapping mirrors the registry's observed behavior: 5xx and malformed
/// 200-bodies are transient, 429/401/403/400/404 saturate the key, and an
/// empty JSON body on 200 saturates the key as well (the registry answers
/// that way both for unknown GSTINs and for rejected credentials).
pub fn classify(status: StatusCode, body: &str) -> AttemptDisposition {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AttemptDisposition::Saturated(FailureReason::RateLimited)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AttemptDisposition::Saturated(FailureReason::Unauthorized(status.as_u16()))
        }
        s if s.is_server_error() => {
            AttemptDisposition::Retry(FailureReason::ServerError(s.as_u16()))
        }
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            AttemptDisposition::Saturated(FailureReason::Rejected {
                status: status.as_u16(),
                body: truncate_body(body),
            })
        }
        StatusCode::OK => match serde_json::from_str::<Value>(body) {
            Err(_) => AttemptDisposition::Retry(FailureReason::InvalidJson),
            Ok(data) if is_empty_payload(&data) => {
                AttemptDisposition::Saturated(FailureReason::EmptyBody)
            }
            Ok(data) => AttemptDisposition::Success(data),
        },
        s => AttemptDisposition::Saturated(FailureReason::UnexpectedStatus(s.as_u16())),
    }
}

/// A payload that carries no data: null, empty object/array/string, false, 0.
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn truncate_body(body: &str) -> String {
    body.trim().chars().take(REJECTED_BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_saturates_key() {
        let disposition = classify(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(
            disposition,
            AttemptDisposition::Saturated(FailureReason::RateLimited)
        );
    }

    #[test]
    fn auth_failures_saturate_key() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let disposition = classify(status, "denied");
            assert_eq!(
                disposition,
                AttemptDisposition::Saturated(FailureReason::Unauthorized(status.as_u16()))
            );
        }
    }

    #[test]
    fn server_errors_are_retryable() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let disposition = classify(status, "oops");
            assert_eq!(
                disposition,
                AttemptDisposition::Retry(FailureReason::ServerError(status.as_u16()))
            );
        }
    }

    #[test]
    fn rejection_embeds_truncated_body() {
        let long_body = "x".repeat(500);
        let disposition = classify(StatusCode::BAD_REQUEST, &long_body);
        match disposition {
            AttemptDisposition::Saturated(FailureReason::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body.chars().count(), 200);
            }
            other => panic!("unexpected disposition: {other:?}"),
        }
    }

    #[test]
    fn rejection_body_is_trimmed_before_truncation() {
        let disposition = classify(StatusCode::NOT_FOUND, "  no such gstin  \n");
        assert_eq!(
            disposition,
            AttemptDisposition::Saturated(FailureReason::Rejected {
                status: 404,
                body: "no such gstin".to_string(),
            })
        );
    }

    #[test]
    fn malformed_json_on_200_is_retryable() {
        let disposition = classify(StatusCode::OK, "<html>not json</html>");
        assert_eq!(disposition, AttemptDisposition::Retry(FailureReason::InvalidJson));
    }

    #[test]
    fn empty_payloads_saturate_key() {
        for body in ["null", "{}", "[]", "\"\"", "false", "0"] {
            let disposition = classify(StatusCode::OK, body);
            assert_eq!(
                disposition,
                AttemptDisposition::Saturated(FailureReason::EmptyBody),
                "body {body:?} should be treated as empty"
            );
        }
    }

    #[test]
    fn non_empty_payload_is_success() {
        let disposition = classify(StatusCode::OK, r#"{"lgnm":"Acme"}"#);
        assert_eq!(
            disposition,
            AttemptDisposition::Success(json!({"lgnm": "Acme"}))
        );
    }

    #[test]
    fn unrecognized_status_saturates_key() {
        let disposition = classify(StatusCode::NO_CONTENT, "");
        assert_eq!(
            disposition,
            AttemptDisposition::Saturated(FailureReason::UnexpectedStatus(204))
        );
    }

    #[test]
    fn report_renders_multi_line_summary() {
        let mut report = ExhaustionReport::default();
        report.record("key[0]", 1, FailureReason::Timeout);
        report.record("key[0]", 2, FailureReason::Timeout);
        report.record("key[1]", 1, FailureReason::RateLimited);

        let rendered = report.to_string();
        assert_eq!(
            rendered,
            "All API keys exhausted or failed. Summary:\n\
             key[0]: attempt 1: timeout\n\
             key[0]: attempt 2: timeout\n\
             key[1]: attempt 1: 429 rate limited"
        );
    }

    #[test]
    fn empty_report_renders_header_only() {
        let report = ExhaustionReport::default();
        assert_eq!(report.to_string(), "All API keys exhausted or failed. Summary:");
    }
}
