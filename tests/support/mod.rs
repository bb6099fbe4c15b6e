#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use job_protocol::{ConversationId, Message, Role};
use job_relay::{Coordinator, DeliveryConfig, SessionState, StateStore};
use job_transport_mock::ScriptedTransport;

pub const ARTIFACT_BASE: &str = "https://jobs.example.com/api";

pub fn test_config() -> DeliveryConfig {
    DeliveryConfig::new(ARTIFACT_BASE)
        .with_poll_interval(Duration::from_secs(1))
        .with_max_poll_attempts(5)
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub coordinator: Coordinator,
    pub conversation: ConversationId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: DeliveryConfig) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let mut coordinator =
            Coordinator::new(transport.clone(), StateStore::default(), config);
        let conversation = coordinator.create_conversation();

        Self {
            transport,
            coordinator,
            conversation,
        }
    }

    pub fn state(&self) -> SessionState {
        self.coordinator.state().get()
    }

    pub fn messages(&self) -> Arc<[Message]> {
        self.coordinator.state().read(|state| {
            state
                .conversation(&self.conversation)
                .map(|conversation| Arc::clone(&conversation.messages))
                .unwrap_or_else(|| Arc::from(Vec::new()))
        })
    }

    pub fn transcript(&self) -> Vec<(Role, String)> {
        self.messages()
            .iter()
            .map(|message| (message.role, message.content.clone()))
            .collect()
    }

    pub fn last_content(&self) -> Option<String> {
        self.messages().last().map(|message| message.content.clone())
    }

    /// Waits for one event and routes it; returns whether it was applied.
    pub async fn step(&mut self) -> bool {
        let event = self
            .coordinator
            .next_event()
            .await
            .expect("coordinator keeps its own sender alive");
        self.coordinator.handle_event(event)
    }

    pub fn assert_idle_flags(&self) {
        let state = self.state();
        assert!(!state.loading, "loading flag should be cleared");
        assert!(!state.streaming, "streaming flag should be cleared");
        assert!(state.active_job.is_none(), "active job should be cleared");
    }
}

pub fn user(content: &str) -> (Role, String) {
    (Role::User, content.to_string())
}

pub fn assistant(content: &str) -> (Role, String) {
    (Role::Assistant, content.to_string())
}
