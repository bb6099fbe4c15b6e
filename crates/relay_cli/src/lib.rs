//! Line-oriented host for the job relay coordinator.
//!
//! ## Transport bootstrap
//!
//! - `JOB_RELAY_TRANSPORT=mock` (default) answers every prompt with a local
//!   streamed echo.
//! - `JOB_RELAY_TRANSPORT=http` talks to a job server. Set
//!   `JOB_RELAY_CONFIG_PATH` to a JSON file with this shape:
//!
//! ```json
//! {
//!   "base_url": "https://jobs.example.com/api",
//!   "access_token": "<bearer token>",
//!   "poll_interval_ms": 1000,
//!   "max_poll_attempts": 86400,
//!   "timeout_sec": 30
//! }
//! ```
//!
//! Only `base_url` is required. `artifact_base_url` overrides the base used for
//! relative download links, and `state_dir` moves the session snapshot.
//! Unknown fields are rejected.
//!
//! `JOB_RELAY_STATE_DIR` takes precedence over `state_dir`; without either the
//! snapshot lives under `.job-relay/state` in the working directory.
//! `JOB_RELAY_DEBUG=1` raises the default log filter to `debug`.

pub mod app;
pub mod commands;
pub mod render;
pub mod transports;
