use std::path::PathBuf;

use job_protocol::{ConversationId, TransportError, TransportErrorKind};
use thiserror::Error;

use crate::machine::TransitionError;

/// Failure observed while delivering one job.
///
/// `Transport` and `Protocol` describe channel trouble; `JobFailure` and
/// `Timeout` are terminal outcomes of the job itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    JobFailure(String),
    #[error("job timed out after {attempts} status checks")]
    Timeout { attempts: u32 },
}

impl DeliveryError {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::JobFailure(_) | Self::Timeout { .. })
    }
}

impl From<TransportError> for DeliveryError {
    fn from(error: TransportError) -> Self {
        match error.kind() {
            TransportErrorKind::Protocol => Self::Protocol(error.message().to_owned()),
            TransportErrorKind::Transport => Self::Transport(error.message().to_owned()),
            TransportErrorKind::Rejected { .. } => Self::Transport(error.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown conversation '{0}'")]
    UnknownConversation(ConversationId),

    #[error("message content is empty")]
    EmptyContent,

    #[error("job submission failed: {0}")]
    Submit(#[source] DeliveryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("unknown transport '{0}'; expected 'mock' or 'http'")]
    UnknownTransport(String),

    #[error("{0} must be set when using the http transport")]
    MissingConfigPath(&'static str),
}
