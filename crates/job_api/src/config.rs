use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::SubmitRetryPolicy;
use crate::url::DEFAULT_BASE_URL;

/// Transport configuration for job API requests.
#[derive(Debug, Clone)]
pub struct JobApiConfig {
    /// Base URL the job endpoints are resolved against.
    pub base_url: String,
    /// Optional bearer token passed as `Authorization`.
    pub access_token: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Per-request timeout for submit and status calls. The event stream is
    /// long-lived and only bound by `connect_timeout`.
    pub timeout: Option<Duration>,
    /// Optional TCP connect timeout applied to every request.
    pub connect_timeout: Option<Duration>,
    /// Backoff applied to job submission only.
    pub submit_retry: SubmitRetryPolicy,
}

impl Default for JobApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            connect_timeout: None,
            submit_retry: SubmitRetryPolicy::default(),
        }
    }
}

impl JobApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_submit_retry(mut self, policy: SubmitRetryPolicy) -> Self {
        self.submit_retry = policy;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
