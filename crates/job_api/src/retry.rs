use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;

/// Backoff policy for job submission.
///
/// Only `POST jobs` is retried. Status polls and the event stream report
/// their first failure to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further one.
    pub base_delay: Duration,
}

impl Default for SubmitRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl SubmitRetryPolicy {
    /// Policy that gives up after the first failure.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a failed attempt (0-based) may be followed by another.
    pub fn has_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(30)))
    }

    /// A rejected submission is worth repeating on 429, any 5xx, or an error
    /// body that names a transient condition.
    pub fn retries_status(&self, status: StatusCode, body: &str) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
            || is_transient_message(body)
    }

    /// A submission that never got a response is worth repeating when the
    /// connection failed or timed out, or its message names a transient
    /// condition.
    pub fn retries_request_error(&self, error: &reqwest::Error) -> bool {
        error.is_connect() || error.is_timeout() || is_transient_message(&error.to_string())
    }
}

fn transient_message_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?(refused|reset)")
            .expect("transient message regex must compile")
    })
}

/// Matches error text describing overload or a dropped connection.
pub fn is_transient_message(text: &str) -> bool {
    transient_message_regex().is_match(text)
}
