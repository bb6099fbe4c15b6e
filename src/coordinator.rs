//! Job lifecycle coordinator.
//!
//! Owns the single active job, keeps exactly one delivery channel open for it,
//! falls back from push to pull once, and applies exactly one terminal
//! transcript mutation per job. All channel output arrives through one queue
//! of tagged [`DeliveryEvent`]s; handlers run to completion one at a time.

use std::sync::Arc;

use job_api::absolutize_artifact_url;
use job_protocol::{ConversationId, JobId, JobTransport, Message, Selection, SubmitRequest};
use session_store::SnapshotStore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::DeliveryConfig;
use crate::delivery::pull::{self, PollSchedule};
use crate::delivery::{
    push, ChannelKind, DeliveryEvent, DeliveryEventKind, Subscription, TerminalOutcome,
};
use crate::error::{CoordinatorError, DeliveryError};
use crate::machine::{transition, JobPhase, PhaseInput};
use crate::persist::SnapshotWriter;
use crate::state::{ActiveJobSummary, StateStore};
use crate::transcript;

/// Per-job context, released on terminal or cancel.
#[derive(Debug)]
struct JobContext {
    job_id: JobId,
    conversation_id: ConversationId,
    channel: ChannelKind,
    fallback_used: bool,
    buffer: String,
    assistant_appended: bool,
    subscription: Option<Subscription>,
}

impl JobContext {
    fn summary(&self, phase: JobPhase) -> ActiveJobSummary {
        ActiveJobSummary {
            job_id: self.job_id.clone(),
            conversation_id: self.conversation_id.clone(),
            phase,
            channel: self.channel,
        }
    }
}

pub struct Coordinator {
    transport: Arc<dyn JobTransport>,
    state: StateStore,
    config: DeliveryConfig,
    snapshots: Option<SnapshotWriter>,
    events_tx: UnboundedSender<DeliveryEvent>,
    events_rx: UnboundedReceiver<DeliveryEvent>,
    phase: JobPhase,
    active: Option<JobContext>,
}

impl Coordinator {
    #[must_use]
    pub fn new(transport: Arc<dyn JobTransport>, state: StateStore, config: DeliveryConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            state,
            config,
            snapshots: None,
            events_tx,
            events_rx,
            phase: JobPhase::Idle,
            active: None,
        }
    }

    /// Persists a snapshot after every transcript or selection change. Writes
    /// happen in the background; see [`Self::flush_snapshots`].
    #[must_use]
    pub fn with_snapshot_store(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(SnapshotWriter::new(store));
        self
    }

    #[must_use]
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    #[must_use]
    pub fn active_job_id(&self) -> Option<&JobId> {
        self.active.as_ref().map(|context| &context.job_id)
    }

    #[must_use]
    pub fn active_channel(&self) -> Option<ChannelKind> {
        self.active.as_ref().map(|context| context.channel)
    }

    pub fn create_conversation(&mut self) -> ConversationId {
        let id = self.state.create_conversation();
        self.persist();
        id
    }

    pub fn select_conversation(&mut self, id: &ConversationId) -> Result<(), CoordinatorError> {
        self.state.select_conversation(id)?;
        self.persist();
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.state.set_selection(selection);
        self.persist();
    }

    /// Submits `content` as the next turn of `conversation_id`.
    ///
    /// Any job in flight is cancelled first. Returns once the server assigned
    /// a job id; progress is then delivered through [`Self::next_event`].
    pub async fn submit(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<JobId, CoordinatorError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoordinatorError::EmptyContent);
        }

        let request = self.state.read(|state| {
            state.conversation(conversation_id).map(|conversation| {
                let mut request = SubmitRequest::new(conversation_id.clone(), content)
                    .with_selection(&state.selection);
                request.agent = conversation.agent.clone().or(request.agent);
                request.provider = conversation.provider.clone().or(request.provider);
                request.model = conversation.model.clone().or(request.model);
                request
            })
        });
        let Some(request) = request else {
            return Err(CoordinatorError::UnknownConversation(
                conversation_id.clone(),
            ));
        };

        if let Some(superseded) = self.release_active(PhaseInput::Cancelled)? {
            tracing::info!(job_id = %superseded, "job superseded by new submission");
        }
        self.phase = transition(self.phase, PhaseInput::Submitted)?;

        self.state.update(|state| {
            if let Some(conversation) = state.conversation_mut(conversation_id) {
                transcript::append(conversation, Message::user(content));
            }
            state.loading = true;
            state.streaming = false;
        });
        self.persist();

        let job_id = match self.transport.submit(&request).await {
            Ok(job_id) => job_id,
            Err(error) => {
                let error = DeliveryError::from(error);
                tracing::warn!(conversation_id = %conversation_id, %error, "job submission failed");
                self.phase = transition(self.phase, PhaseInput::Failed)?;
                self.state.update(|state| {
                    if let Some(conversation) = state.conversation_mut(conversation_id) {
                        transcript::append(conversation, Message::error(&error));
                    }
                    state.clear_job_flags();
                });
                self.persist();
                return Err(CoordinatorError::Submit(error));
            }
        };

        let subscription = push::open(
            Arc::clone(&self.transport),
            job_id.clone(),
            self.events_tx.clone(),
        );
        let context = JobContext {
            job_id: job_id.clone(),
            conversation_id: conversation_id.clone(),
            channel: ChannelKind::Push,
            fallback_used: false,
            buffer: String::new(),
            assistant_appended: false,
            subscription: Some(subscription),
        };
        let summary = context.summary(self.phase);
        self.active = Some(context);
        self.state.update(|state| state.active_job = Some(summary));

        tracing::info!(job_id = %job_id, conversation_id = %conversation_id, "job submitted");
        Ok(job_id)
    }

    /// Drops the active subscription and forgets the job. The transcript is
    /// left exactly as it is.
    pub fn cancel(&mut self) -> Result<Option<JobId>, CoordinatorError> {
        let cancelled = self.release_active(PhaseInput::Cancelled)?;
        if let Some(job_id) = &cancelled {
            tracing::info!(job_id = %job_id, "job cancelled");
        }
        Ok(cancelled)
    }

    /// Waits for the next channel event.
    pub async fn next_event(&mut self) -> Option<DeliveryEvent> {
        self.events_rx.recv().await
    }

    /// Routes one channel event. Returns `true` when it changed anything.
    ///
    /// Events for a job that is not active, or from a channel the job no
    /// longer listens on, are dropped.
    pub fn handle_event(&mut self, event: DeliveryEvent) -> bool {
        let Some(context) = self.active.as_ref() else {
            tracing::debug!(job_id = %event.job_id, "dropping event with no active job");
            return false;
        };
        if context.job_id != event.job_id || context.channel != event.channel {
            tracing::debug!(
                job_id = %event.job_id,
                channel = %event.channel,
                "dropping stale event"
            );
            return false;
        }

        match event.kind {
            DeliveryEventKind::Increment(text) => self.on_increment(&event.job_id, &text),
            DeliveryEventKind::Terminal(outcome) => self.on_terminal(&event.job_id, outcome),
            DeliveryEventKind::ChannelFailure(error) => {
                self.on_channel_failure(&event.job_id, event.channel, error)
            }
        }
    }

    /// Processes events until the active job settles, returning the final phase.
    pub async fn run_until_settled(&mut self) -> JobPhase {
        while self.active.is_some() {
            match self.events_rx.recv().await {
                Some(event) => {
                    self.handle_event(event);
                }
                None => break,
            }
        }
        self.phase
    }

    /// Handles queued events without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event) {
                handled += 1;
            }
        }
        handled
    }

    pub fn on_increment(&mut self, job_id: &JobId, text: &str) -> bool {
        if !self.is_active_job(job_id) {
            return false;
        }
        let next = match transition(self.phase, PhaseInput::Increment) {
            Ok(next) => next,
            Err(error) => {
                tracing::warn!(job_id = %job_id, %error, "increment rejected");
                return false;
            }
        };
        let Some(context) = self.active.as_mut() else {
            return false;
        };

        context.buffer.push_str(text);
        let append = !context.assistant_appended;
        context.assistant_appended = true;
        let content = context.buffer.clone();
        let conversation_id = context.conversation_id.clone();
        let summary = context.summary(next);
        self.phase = next;

        self.state.update(|state| {
            if let Some(conversation) = state.conversation_mut(&conversation_id) {
                if append {
                    transcript::append(conversation, Message::assistant(content));
                } else {
                    transcript::replace_last(conversation, &content);
                }
            }
            state.streaming = true;
            state.active_job = Some(summary);
        });
        true
    }

    pub fn on_terminal(&mut self, job_id: &JobId, outcome: TerminalOutcome) -> bool {
        if !self.is_active_job(job_id) || self.phase.is_terminal() {
            return false;
        }
        let input = match outcome {
            TerminalOutcome::Completed { .. } => PhaseInput::Completed,
            TerminalOutcome::Failed(_) => PhaseInput::Failed,
        };
        let next = match transition(self.phase, input) {
            Ok(next) => next,
            Err(error) => {
                tracing::warn!(job_id = %job_id, %error, "terminal event rejected");
                return false;
            }
        };
        let Some(context) = self.active.take() else {
            return false;
        };
        self.phase = next;

        match outcome {
            TerminalOutcome::Completed {
                result,
                artifact_url,
            } => {
                let mut content = result.unwrap_or_else(|| context.buffer.clone());
                if let Some(reference) = artifact_url {
                    match absolutize_artifact_url(&self.config.artifact_base_url, &reference) {
                        Ok(url) => {
                            content.push_str(&format!("\n\n[Download output]({url})"));
                        }
                        Err(error) => {
                            tracing::warn!(job_id = %job_id, %error, "artifact link dropped");
                        }
                    }
                }

                let replace = context.assistant_appended;
                self.state.update(|state| {
                    if let Some(conversation) = state.conversation_mut(&context.conversation_id) {
                        if replace {
                            transcript::replace_last(conversation, &content);
                        } else {
                            transcript::append(conversation, Message::assistant(content));
                        }
                    }
                    state.clear_job_flags();
                });
                tracing::info!(job_id = %job_id, channel = %context.channel, "job completed");
            }
            TerminalOutcome::Failed(error) => {
                self.state.update(|state| {
                    if let Some(conversation) = state.conversation_mut(&context.conversation_id) {
                        transcript::append(conversation, Message::error(&error));
                    }
                    state.clear_job_flags();
                });
                tracing::info!(job_id = %job_id, channel = %context.channel, %error, "job failed");
            }
        }

        drop(context);
        self.persist();
        true
    }

    pub fn on_channel_failure(
        &mut self,
        job_id: &JobId,
        channel: ChannelKind,
        error: DeliveryError,
    ) -> bool {
        if !self.is_active_job(job_id) || self.phase.is_terminal() {
            return false;
        }
        let Some(context) = self.active.as_mut() else {
            return false;
        };
        if context.channel != channel {
            return false;
        }

        if channel == ChannelKind::Push && !context.fallback_used {
            tracing::info!(job_id = %job_id, %error, "push channel failed, falling back to polling");
            context.subscription = None;
            context.fallback_used = true;
            context.channel = ChannelKind::Pull;
            context.subscription = Some(pull::open(
                Arc::clone(&self.transport),
                job_id.clone(),
                PollSchedule {
                    interval: self.config.poll_interval,
                    max_attempts: self.config.max_poll_attempts,
                },
                self.events_tx.clone(),
            ));

            let summary = context.summary(self.phase);
            self.state.update(|state| state.active_job = Some(summary));
            return true;
        }

        self.on_terminal(job_id, TerminalOutcome::Failed(error))
    }

    fn is_active_job(&self, job_id: &JobId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|context| &context.job_id == job_id)
    }

    /// Releases the active job's subscription and clears its flags.
    fn release_active(&mut self, input: PhaseInput) -> Result<Option<JobId>, CoordinatorError> {
        let Some(context) = self.active.take() else {
            return Ok(None);
        };
        self.phase = transition(self.phase, input)?;
        drop(context.subscription);

        self.state.update(|state| state.clear_job_flags());
        Ok(Some(context.job_id))
    }

    /// Waits for queued snapshot writes to reach disk.
    pub async fn flush_snapshots(&mut self) {
        if let Some(writer) = self.snapshots.as_mut() {
            writer.flush().await;
        }
    }

    fn persist(&mut self) {
        let Some(writer) = self.snapshots.as_mut() else {
            return;
        };

        match self.state.snapshot() {
            Ok(snapshot) => writer.save(snapshot),
            Err(error) => tracing::warn!(%error, "failed to build session snapshot"),
        }
    }
}
