//! Session state container.
//!
//! The coordinator is the only writer. Readers either take a cloned
//! [`SessionState`] or subscribe to changes; every write goes through one
//! [`StateStore::update`] call, so a reader never sees half of a multi-field
//! change.

use job_protocol::{Conversation, ConversationId, JobId, Selection};
use session_store::{now_rfc3339, SessionSnapshot, SnapshotStoreError};
use tokio::sync::watch;

use crate::delivery::ChannelKind;
use crate::error::CoordinatorError;
use crate::machine::JobPhase;

/// What readers may know about the job in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJobSummary {
    pub job_id: JobId,
    pub conversation_id: ConversationId,
    pub phase: JobPhase,
    pub channel: ChannelKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<ConversationId>,
    /// Present once the server has assigned a job id. While a submission is
    /// in flight `loading` is already set and this is still `None`.
    pub active_job: Option<ActiveJobSummary>,
    pub loading: bool,
    pub streaming: bool,
    pub selection: Selection,
}

impl SessionState {
    #[must_use]
    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|conversation| &conversation.id == id)
    }

    pub fn conversation_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conversation| &conversation.id == id)
    }

    #[must_use]
    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current_conversation_id
            .as_ref()
            .and_then(|id| self.conversation(id))
    }

    /// Persistent subset of this state.
    pub fn to_snapshot(&self) -> Result<SessionSnapshot, SnapshotStoreError> {
        Ok(SessionSnapshot::v1(
            now_rfc3339()?,
            self.conversations.clone(),
            self.current_conversation_id.clone(),
            self.selection.clone(),
        ))
    }

    /// Rebuilds state from a snapshot with every transient flag cleared.
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            conversations: snapshot.conversations,
            current_conversation_id: snapshot.current_conversation_id,
            active_job: None,
            loading: false,
            streaming: false,
            selection: snapshot.selection,
        }
    }

    pub(crate) fn clear_job_flags(&mut self) {
        self.active_job = None;
        self.loading = false;
        self.streaming = false;
    }
}

#[derive(Debug)]
pub struct StateStore {
    sender: watch::Sender<SessionState>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl StateStore {
    #[must_use]
    pub fn new(initial: SessionState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    #[must_use]
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self::new(SessionState::from_snapshot(snapshot))
    }

    /// Clone of the current state.
    #[must_use]
    pub fn get(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    /// Runs `read` against the current state without cloning it.
    pub fn read<R>(&self, read: impl FnOnce(&SessionState) -> R) -> R {
        read(&self.sender.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SnapshotStoreError> {
        self.read(SessionState::to_snapshot)
    }

    /// Applies one atomic multi-field change and notifies subscribers.
    pub(crate) fn update<R>(&self, change: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut output = None;
        self.sender.send_modify(|state| output = Some(change(state)));
        match output {
            Some(output) => output,
            None => unreachable!("send_modify always runs the closure"),
        }
    }

    /// Adds an empty conversation and makes it current.
    pub(crate) fn create_conversation(&self) -> ConversationId {
        let id = ConversationId::generate();
        self.update(|state| {
            let mut conversation = Conversation::new(id.clone());
            conversation.agent = state.selection.agent.clone();
            conversation.provider = state.selection.provider.clone();
            conversation.model = state.selection.model.clone();
            state.conversations.push(conversation);
            state.current_conversation_id = Some(id.clone());
        });
        id
    }

    pub(crate) fn select_conversation(&self, id: &ConversationId) -> Result<(), CoordinatorError> {
        self.update(|state| {
            if state.conversation(id).is_none() {
                return Err(CoordinatorError::UnknownConversation(id.clone()));
            }
            state.current_conversation_id = Some(id.clone());
            Ok(())
        })
    }

    pub(crate) fn set_selection(&self, selection: Selection) {
        self.update(|state| state.selection = selection);
    }
}
