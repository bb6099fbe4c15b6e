//! Transport-only job API client primitives.
//!
//! This crate owns request building, response parsing and SSE framing for the
//! job endpoints. It contains no coordination logic: callers decide what a
//! failed poll or a broken stream means.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST jobs` creates a job
//! - `GET jobs/{id}` returns its status
//! - `GET jobs/{id}/events` streams fragment and terminal frames as SSE

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::JobApiClient;
pub use config::JobApiConfig;
pub use error::JobApiError;
pub use reqwest::StatusCode;
pub use retry::SubmitRetryPolicy;
pub use sse::SseStreamParser;
pub use url::{absolutize_artifact_url, normalize_base_url};
