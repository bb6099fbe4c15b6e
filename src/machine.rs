//! Pure job phase machine.
//!
//! The coordinator feeds every lifecycle input through [`transition`] before it
//! applies any effect, so an input that is not in the table changes nothing.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    Queued,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl JobPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle input applied to a [`JobPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseInput {
    Submitted,
    Increment,
    Completed,
    Failed,
    Cancelled,
}

impl PhaseInput {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Increment => "increment",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PhaseInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid transition: input '{input}' in phase '{phase}'")]
    InvalidTransition { phase: JobPhase, input: PhaseInput },
}

/// Computes the next phase, or rejects an input the table does not list.
pub fn transition(phase: JobPhase, input: PhaseInput) -> Result<JobPhase, TransitionError> {
    use JobPhase as P;
    use PhaseInput as I;

    let next = match (phase, input) {
        (P::Idle | P::Completed | P::Failed | P::Cancelled, I::Submitted) => P::Queued,
        (P::Queued | P::Streaming, I::Increment) => P::Streaming,
        (P::Queued | P::Streaming, I::Completed) => P::Completed,
        (P::Queued | P::Streaming, I::Failed) => P::Failed,
        (P::Queued | P::Streaming, I::Cancelled) => P::Cancelled,
        _ => return Err(TransitionError::InvalidTransition { phase, input }),
    };

    Ok(next)
}
