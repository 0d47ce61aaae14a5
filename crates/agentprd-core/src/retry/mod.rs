//! Retrying transient failures of outbound HTTP calls.

mod policy;

pub use policy::RetryPolicy;

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use strum::{AsRefStr, Display};

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RetryReason {
    Connect,
    Timeout,
    RateLimited,
    ServerError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        reason: RetryReason,
        retry_after: Option<Duration>,
    },
    DoNotRetry,
}

/// Parse a `Retry-After` header as delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let when = httpdate::parse_http_date(raw).ok()?;
    Some(
        when.duration_since(std::time::SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

/// Classify a reqwest send result.
pub fn classify_response(
    result: &std::result::Result<reqwest::Response, reqwest::Error>,
) -> RetryDecision {
    match result {
        Ok(resp) => {
            let status = resp.status();
            let reason = if status == StatusCode::TOO_MANY_REQUESTS {
                RetryReason::RateLimited
            } else if status == StatusCode::REQUEST_TIMEOUT {
                RetryReason::Timeout
            } else if status.is_server_error() {
                RetryReason::ServerError
            } else {
                return RetryDecision::DoNotRetry;
            };
            RetryDecision::Retry {
                reason,
                retry_after: parse_retry_after(resp.headers()),
            }
        }
        Err(err) if err.is_timeout() => RetryDecision::Retry {
            reason: RetryReason::Timeout,
            retry_after: None,
        },
        Err(err) if err.is_connect() => RetryDecision::Retry {
            reason: RetryReason::Connect,
            retry_after: None,
        },
        Err(_) => RetryDecision::DoNotRetry,
    }
}

/// Run `operation` until `classify` stops asking for a retry or the policy
/// runs out of attempts. The last result is returned as-is.
pub async fn retry_with_backoff<T, E, Op, Fut, Classify>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: Op,
    mut classify: Classify,
) -> std::result::Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    Classify: FnMut(&std::result::Result<T, E>) -> RetryDecision,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = operation(attempt).await;
        if attempt >= max_attempts {
            return result;
        }
        let RetryDecision::Retry {
            reason,
            retry_after,
        } = classify(&result)
        else {
            return result;
        };

        let delay = policy.with_jitter(retry_after.unwrap_or_else(|| policy.backoff_delay(attempt)));
        tracing::warn!(
            operation = label,
            attempt,
            reason = %reason,
            delay_ms = delay.as_millis() as u64,
            "Retrying outbound request"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
