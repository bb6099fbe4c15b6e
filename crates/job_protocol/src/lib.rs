//! Minimal transport-agnostic contract for delivering one backend job.
//!
//! This crate defines the shared conversation/message model, the job status
//! wire shapes, and the async [`JobTransport`] seam. It excludes HTTP details,
//! SSE framing, and all coordination concerns.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Server-issued identifier for one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client-side identifier for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Server-reported job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "in_progress")]
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "queued" | "pending" => Self::Queued,
            "running" | "in_progress" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status payload shared by the poll endpoint and terminal stream frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        alias = "output_artifact_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_artifact_url: Option<String>,
}

impl StatusReport {
    #[must_use]
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            result: None,
            error: None,
            output_artifact_url: None,
        }
    }

    #[must_use]
    pub fn completed(result: impl Into<Value>) -> Self {
        Self {
            result: Some(result.into()),
            ..Self::new(JobStatus::Completed)
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobStatus::Failed)
        }
    }

    #[must_use]
    pub fn with_artifact(mut self, url: impl Into<String>) -> Self {
        self.output_artifact_url = Some(url.into());
        self
    }

    /// Returns the result payload rendered as transcript text.
    ///
    /// Strings are used verbatim, objects contribute their `text`/`content`
    /// field, anything else is serialized as JSON.
    #[must_use]
    pub fn result_text(&self) -> Option<String> {
        let value = self.result.as_ref()?;
        match value {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Object(fields) => fields
                .get("text")
                .or_else(|| fields.get("content"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| Some(value.to_string())),
            other => Some(other.to_string()),
        }
    }
}

/// One decoded frame from a job event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Fragment { text: String },
    Terminal(StatusReport),
}

/// Job creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub conversation_id: ConversationId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SubmitRequest {
    #[must_use]
    pub fn new(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            agent: None,
            provider: None,
            model: None,
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: &Selection) -> Self {
        self.agent = selection.agent.clone();
        self.provider = selection.provider.clone();
        self.model = selection.model.clone();
        self
    }
}

/// Job creation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    #[serde(rename = "jobId", alias = "job_id", alias = "id")]
    pub job_id: JobId,
}

/// Transcript author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Prefix marking terminal error messages in a transcript.
pub const ERROR_MESSAGE_PREFIX: &str = "❌ Error: ";

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Builds a distinctly marked assistant error message.
    #[must_use]
    pub fn error(detail: impl fmt::Display) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(format!("{ERROR_MESSAGE_PREFIX}{detail}"))
        }
    }
}

/// Conversation owned by the session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Arc<[Message]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Conversation {
    #[must_use]
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            title: None,
            messages: Arc::from(Vec::new()),
            agent: None,
            provider: None,
            model: None,
        }
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Last provider/model/agent/mode picked by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Failure class reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection or network failure.
    Transport,
    /// Malformed frame or status payload.
    Protocol,
    /// Server answered with a non-success status.
    Rejected { status: u16 },
}

/// Error crossing the [`JobTransport`] seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Transport,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Protocol,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Rejected { status },
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_protocol(&self) -> bool {
        self.kind == TransportErrorKind::Protocol
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Transport => write!(f, "transport error: {}", self.message),
            TransportErrorKind::Protocol => write!(f, "protocol error: {}", self.message),
            TransportErrorKind::Rejected { status } => write!(f, "HTTP {status} {}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Stream of decoded frames for one job. Dropping it closes the connection.
pub type FrameStream = BoxStream<'static, Result<StreamFrame, TransportError>>;

/// Transport interface for submitting jobs and observing their progress.
#[async_trait]
pub trait JobTransport: Send + Sync + 'static {
    /// Creates a job and returns its identifier.
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, TransportError>;

    /// Fetches the current status of a job.
    async fn status(&self, job_id: &JobId) -> Result<StatusReport, TransportError>;

    /// Opens the job event stream.
    ///
    /// Items that fail with [`TransportErrorKind::Protocol`] are per-frame and
    /// leave the stream usable; any other error ends it.
    async fn open_events(&self, job_id: &JobId) -> Result<FrameStream, TransportError>;
}
