use std::fmt;

use job_protocol::TransportError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Error as JsonError, Value};

#[derive(Debug)]
pub enum JobApiError {
    InvalidBaseUrl(String),
    InvalidHeader(String),
    UrlNormalization(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    MalformedFrame(String),
    MalformedBody(String),
    Serde(JsonError),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamEnded,
    Unknown(String),
}

impl JobApiError {
    /// True for failures that only affect one SSE frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::MalformedFrame(_))
    }

    /// Classifies this error for the transport-neutral contract.
    pub fn into_transport_error(self) -> TransportError {
        match self {
            Self::Status(status, message) => TransportError::rejected(status.as_u16(), message),
            Self::MalformedFrame(_) | Self::MalformedBody(_) | Self::Serde(_) => {
                TransportError::protocol(self.to_string())
            }
            Self::Request(ref error) if error.is_decode() => {
                TransportError::protocol(self.to_string())
            }
            other => TransportError::transport(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
}

impl ErrorPayload {
    fn message(&self) -> Option<String> {
        let from_error = match self.error.as_ref() {
            Some(Value::String(text)) => non_empty_string(text).map(ToString::to_string),
            Some(Value::Object(fields)) => fields
                .get("message")
                .and_then(Value::as_str)
                .and_then(non_empty_string)
                .map(ToString::to_string),
            _ => None,
        };

        from_error
            .or_else(|| {
                self.message
                    .as_deref()
                    .and_then(non_empty_string)
                    .map(ToString::to_string)
            })
            .or_else(|| match self.detail.as_ref() {
                Some(Value::String(text)) => non_empty_string(text).map(ToString::to_string),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
    }
}

impl fmt::Display for JobApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::UrlNormalization(message) => write!(f, "URL normalization failed: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::MalformedFrame(message) => write!(f, "malformed SSE frame: {message}"),
            Self::MalformedBody(message) => write!(f, "malformed response body: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(f, "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})")
            }
            Self::StreamEnded => write!(f, "event stream ended before a terminal frame"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for JobApiError {}

impl From<reqwest::Error> for JobApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for JobApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from an error response body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"message": "..."}` and `{"detail": ...}`; otherwise falls back to the raw
/// body or the canonical status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message() {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
