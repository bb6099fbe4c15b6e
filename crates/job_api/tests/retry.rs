use std::time::Duration;

use job_api::retry::is_transient_message;
use job_api::{StatusCode, SubmitRetryPolicy};

#[test]
fn rate_limit_and_server_errors_are_retried() {
    let policy = SubmitRetryPolicy::default();

    assert!(policy.retries_status(StatusCode::TOO_MANY_REQUESTS, ""));
    assert!(policy.retries_status(StatusCode::INTERNAL_SERVER_ERROR, ""));
    assert!(policy.retries_status(StatusCode::BAD_GATEWAY, ""));
    assert!(policy.retries_status(StatusCode::SERVICE_UNAVAILABLE, ""));
    assert!(policy.retries_status(StatusCode::GATEWAY_TIMEOUT, ""));
    assert!(!policy.retries_status(StatusCode::BAD_REQUEST, "invalid request"));
    assert!(!policy.retries_status(StatusCode::UNPROCESSABLE_ENTITY, ""));
}

#[test]
fn transient_body_text_overrides_client_status() {
    let policy = SubmitRetryPolicy::default();

    assert!(policy.retries_status(StatusCode::BAD_REQUEST, "rate limit exceeded"));
    assert!(is_transient_message("connection refused"));
    assert!(is_transient_message("Connection reset by peer"));
    assert!(!is_transient_message("content required"));
}

#[test]
fn default_policy_backs_off_exponentially_from_one_second() {
    let policy = SubmitRetryPolicy::default();

    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.delay_after(0), Duration::from_secs(1));
    assert_eq!(policy.delay_after(1), Duration::from_secs(2));
    assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    assert!(policy.has_retry_after(2));
    assert!(!policy.has_retry_after(3));
}

#[test]
fn never_policy_has_no_retries() {
    assert!(!SubmitRetryPolicy::never().has_retry_after(0));
}
