// src/lookup/client.rs

use crate::lookup::{
    outcome::{classify, AttemptDisposition, ExhaustionReport, FailureReason},
    transport::{GstinTransport, TransportError},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry/backoff policy applied to every key in a lookup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per key before moving on; at least 1.
    pub max_retries_per_key: u32,
    /// First backoff sleep; doubled after every retryable failure and reset
    /// for each new key.
    pub initial_backoff: Duration,
    /// Per-attempt network timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries_per_key: 2,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Successful lookup: which key slot answered, and the registry payload
/// exactly as returned.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSuccess {
    pub used_key_index: usize,
    pub used_key_label: String,
    pub result: Value,
}

/// Tries each key in list order, retrying transient failures with exponential
/// backoff, until one attempt yields a non-empty JSON payload.
///
/// Keys are strictly sequential; attempts and backoff sleeps happen inline in
/// the calling task. No state survives a call, so concurrent lookups from
/// different callers are independent.
#[derive(Debug, Clone)]
pub struct LookupClient<T> {
    transport: T,
    policy: RetryPolicy,
}

/// Label for a key slot, used in diagnostics instead of the key value.
pub fn key_label(index: usize) -> String {
    format!("key[{index}]")
}

fn preview_key(key: &SecretString) -> String {
    let exposed = key.expose_secret();
    if exposed.is_empty() {
        "<unset>".to_string()
    } else {
        format!("{}...", exposed.chars().take(4).collect::<String>())
    }
}

impl<T: GstinTransport> LookupClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Looks up `gstin` with each key in order. Returns the first successful
    /// payload, or the full chronological failure report once every key is
    /// exhausted. An empty key list fails immediately with an empty report.
    pub async fn lookup(
        &self,
        keys: &[SecretString],
        gstin: &str,
    ) -> Result<LookupSuccess, ExhaustionReport> {
        let mut report = ExhaustionReport::default();

        for (index, key) in keys.iter().enumerate() {
            let label = key_label(index);
            let mut backoff = self.policy.initial_backoff;

            info!(key.label = %label, key.preview = %preview_key(key), "Trying key");

            for attempt in 1..=self.policy.max_retries_per_key {
                let disposition = match self
                    .transport
                    .fetch(key, gstin, self.policy.timeout)
                    .await
                {
                    Ok(reply) => classify(reply.status, &reply.body),
                    Err(TransportError::Timeout) => {
                        AttemptDisposition::Retry(FailureReason::Timeout)
                    }
                    Err(TransportError::Network(detail)) => {
                        AttemptDisposition::Retry(FailureReason::Network(detail))
                    }
                };

                match disposition {
                    AttemptDisposition::Success(result) => {
                        info!(key.label = %label, attempt, "Lookup succeeded");
                        return Ok(LookupSuccess {
                            used_key_index: index,
                            used_key_label: label,
                            result,
                        });
                    }
                    AttemptDisposition::Retry(reason) => {
                        warn!(
                            key.label = %label,
                            attempt,
                            reason = %reason,
                            backoff = ?backoff,
                            "Transient failure, backing off"
                        );
                        report.record(&label, attempt, reason);
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                    AttemptDisposition::Saturated(reason) => {
                        warn!(key.label = %label, attempt, reason = %reason, "Key saturated");
                        report.record(&label, attempt, reason);
                        break;
                    }
                }
            }

            debug!(key.label = %label, "Key exhausted, advancing");
        }

        warn!(
            attempts = report.attempts.len(),
            "All keys exhausted without a successful lookup"
        );
        Err(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::transport::RawReply;
    use async_trait::async_trait;
    use http::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FixedTransport {
        replies: Mutex<VecDeque<Result<RawReply, TransportError>>>,
    }

    impl FixedTransport {
        fn new(replies: Vec<Result<RawReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl GstinTransport for FixedTransport {
        async fn fetch(
            &self,
            _api_key: &SecretString,
            _gstin: &str,
            _timeout: Duration,
        ) -> Result<RawReply, TransportError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn key_labels_are_indexed() {
        assert_eq!(key_label(0), "key[0]");
        assert_eq!(key_label(5), "key[5]");
    }

    #[test]
    fn key_preview_never_exposes_full_value() {
        assert_eq!(preview_key(&secret("supersecretkey")), "supe...");
        assert_eq!(preview_key(&secret("")), "<unset>");
    }

    #[test]
    fn default_policy_matches_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries_per_key, 2);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn empty_key_list_fails_immediately_with_empty_report() {
        let client = LookupClient::new(FixedTransport::new(vec![]), RetryPolicy::default());

        let report = client.lookup(&[], "22AAAAA0000A1Z5").await.unwrap_err();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn first_successful_reply_wins() {
        let client = LookupClient::new(
            FixedTransport::new(vec![Ok(RawReply {
                status: StatusCode::OK,
                body: r#"{"lgnm":"Acme"}"#.to_string(),
            })]),
            RetryPolicy::default(),
        );

        let success = client
            .lookup(&[secret("key-a")], "22AAAAA0000A1Z5")
            .await
            .unwrap();
        assert_eq!(success.used_key_index, 0);
        assert_eq!(success.used_key_label, "key[0]");
        assert_eq!(success.result["lgnm"], "Acme");
    }
}
