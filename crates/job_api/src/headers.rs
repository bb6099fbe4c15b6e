use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::JobApiConfig;
use crate::error::JobApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";

/// Build a deterministic header map for a job request.
///
/// `accept` selects the response flavour; event-stream requests also disable
/// intermediary caching.
pub fn build_headers(config: &JobApiConfig, accept: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    if let Some(token) = config
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    }

    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());
    if accept == ACCEPT_EVENT_STREAM {
        headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-cache".to_owned());
    }

    let user_agent = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

/// Convert a header map into reqwest's typed representation.
pub fn to_header_map(headers: BTreeMap<String, String>) -> Result<HeaderMap, JobApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| JobApiError::InvalidHeader(format!("invalid header key: {key}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|_| JobApiError::InvalidHeader(format!("invalid header value for {key}")))?;
        out.insert(name, value);
    }
    Ok(out)
}

fn default_user_agent() -> String {
    format!(
        "job-relay/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" => "x64".to_owned(),
        "x86" | "i386" | "i686" => "ia32".to_owned(),
        "aarch64" => "arm64".to_owned(),
        normalized => normalized.to_owned(),
    }
}
