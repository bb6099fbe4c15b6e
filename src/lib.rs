//! Client-side job delivery coordinator.
//!
//! Submits a long-running backend job for one conversation turn, follows it
//! over a push event stream with a single fallback to status polling, and
//! folds whatever arrives into exactly one transcript mutation per job.
//!
//! # Public API Overview
//! - [`Coordinator`] drives jobs: `submit`, `cancel`, and the event handlers
//!   fed from [`Coordinator::next_event`].
//! - [`StateStore`] holds conversations and job flags; readers subscribe to it.
//! - [`machine::transition`] is the pure phase table behind every lifecycle step.
//! - [`transcript`] holds the append / replace-last mutations.
//! - [`delivery`] contains the push and pull channel tasks.

pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod machine;
mod persist;
pub mod state;
pub mod transcript;

pub use crate::config::{DeliveryConfig, EnvConfig, RelayConfig, TransportChoice};
pub use crate::coordinator::Coordinator;
pub use crate::delivery::{ChannelKind, DeliveryEvent, DeliveryEventKind, TerminalOutcome};
pub use crate::error::{ConfigError, CoordinatorError, DeliveryError};
pub use crate::machine::{transition, JobPhase, PhaseInput, TransitionError};
pub use crate::state::{ActiveJobSummary, SessionState, StateStore};
