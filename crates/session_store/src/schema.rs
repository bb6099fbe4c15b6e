use job_protocol::{Conversation, ConversationId, Selection};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted portion of the session state.
///
/// Transient delivery flags are never part of a snapshot; restoring one always
/// starts with no active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSnapshot {
    pub version: u32,
    pub saved_at: String,
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub selection: Selection,
}

impl SessionSnapshot {
    #[must_use]
    pub fn v1(
        saved_at: impl Into<String>,
        conversations: Vec<Conversation>,
        current_conversation_id: Option<ConversationId>,
        selection: Selection,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: saved_at.into(),
            conversations,
            current_conversation_id,
            selection,
        }
    }
}
