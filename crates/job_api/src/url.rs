use job_protocol::JobId;
use url::Url;

use crate::error::JobApiError;

/// Default base URL for job transport requests.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Normalize a base URL: trim whitespace and trailing slashes, fall back to
/// [`DEFAULT_BASE_URL`] when empty.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// `{base}/jobs`
pub fn jobs_url(base: &str) -> Result<Url, JobApiError> {
    endpoint(base, &["jobs"])
}

/// `{base}/jobs/{job_id}`
pub fn job_status_url(base: &str, job_id: &JobId) -> Result<Url, JobApiError> {
    endpoint(base, &["jobs", job_id.as_str()])
}

/// `{base}/jobs/{job_id}/events`
pub fn job_events_url(base: &str, job_id: &JobId) -> Result<Url, JobApiError> {
    endpoint(base, &["jobs", job_id.as_str(), "events"])
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, JobApiError> {
    let normalized = normalize_base_url(base);
    let mut url = Url::parse(&normalized)
        .map_err(|error| JobApiError::InvalidBaseUrl(format!("{normalized}: {error}")))?;

    url.path_segments_mut()
        .map_err(|_| JobApiError::InvalidBaseUrl(format!("{normalized}: cannot be a base")))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// Rewrite an output-artifact reference to an absolute URL.
///
/// Resolution rules:
/// 1) references carrying a scheme are returned unchanged
/// 2) scheme-relative references (`//host/path`) take the base scheme
/// 3) anything else is appended to the base path, with or without a leading `/`
pub fn absolutize_artifact_url(base: &str, reference: &str) -> Result<String, JobApiError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(JobApiError::UrlNormalization(
            "artifact reference is empty".to_string(),
        ));
    }

    if let Ok(absolute) = Url::parse(reference) {
        if absolute.has_host() {
            return Ok(absolute.into());
        }
    }

    let normalized = normalize_base_url(base);
    let directory = Url::parse(&format!("{normalized}/"))
        .map_err(|error| JobApiError::InvalidBaseUrl(format!("{normalized}: {error}")))?;

    let resolved = if reference.starts_with("//") {
        directory.join(reference)
    } else {
        directory.join(reference.trim_start_matches('/'))
    };

    resolved
        .map(Into::into)
        .map_err(|error| JobApiError::UrlNormalization(format!("{reference}: {error}")))
}
