use std::time::Duration;

const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Retry budget applied to every Slack Web API call.
pub(crate) struct RetryPolicy {
    max_attempts: usize,
    base_delay_ms: u64,
}

impl RetryPolicy {
    pub(crate) fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }

    pub(crate) fn allows_another_attempt(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Prefers the server's `Retry-After` hint, else backs off exponentially.
    pub(crate) fn delay(&self, attempt: usize, retry_after_seconds: Option<u64>) -> Duration {
        if let Some(retry_after_seconds) = retry_after_seconds {
            return Duration::from_secs(retry_after_seconds);
        }
        let exponent = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(self.base_delay_ms.saturating_mul(2_u64.pow(exponent)))
    }
}

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

pub(crate) fn is_retryable_slack_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
