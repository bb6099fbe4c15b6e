//! Deterministic scripted implementation of the shared `job_protocol` contract.
//!
//! This crate contains no HTTP logic. Tests script per-job push and poll
//! behaviour and inspect recorded calls; local runs use [`ScriptedTransport::demo`],
//! which streams a canned reply for every submitted job.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use job_protocol::{
    FrameStream, JobId, JobStatus, JobTransport, StatusReport, StreamFrame, SubmitRequest,
    TransportError,
};

/// Stable transport identifier used for explicit startup selection.
pub const MOCK_TRANSPORT_ID: &str = "mock";

/// One step of a scripted event stream.
#[derive(Debug, Clone)]
pub enum PushStep {
    Frame(StreamFrame),
    Error(TransportError),
    Delay(Duration),
    /// Never yields again; the stream stays open until dropped.
    Hang,
}

impl PushStep {
    #[must_use]
    pub fn fragment(text: impl Into<String>) -> Self {
        Self::Frame(StreamFrame::Fragment { text: text.into() })
    }

    #[must_use]
    pub fn terminal(report: StatusReport) -> Self {
        Self::Frame(StreamFrame::Terminal(report))
    }
}

/// Scripted behaviour of `open_events` for one job.
#[derive(Debug, Clone)]
pub enum PushScript {
    /// Opening the stream fails immediately.
    Refuse(TransportError),
    /// Opening succeeds and the stream plays these steps, then ends.
    Steps(Vec<PushStep>),
}

/// One scripted poll outcome. The last step repeats once the script runs out.
#[derive(Debug, Clone)]
pub enum PollStep {
    Report(StatusReport),
    Error(TransportError),
}

#[derive(Debug, Default)]
struct ScriptState {
    next_job_ids: VecDeque<JobId>,
    submit_failures: VecDeque<TransportError>,
    push: HashMap<JobId, PushScript>,
    polls: HashMap<JobId, VecDeque<PollStep>>,
    submitted: Vec<SubmitRequest>,
    prompts: HashMap<JobId, String>,
    status_calls: HashMap<JobId, usize>,
    events_opened: HashMap<JobId, usize>,
    submit_delay: Option<Duration>,
    generated: u64,
}

/// Deterministic transport used by coordinator tests and local runs.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
    demo: bool,
}

impl ScriptedTransport {
    const DEMO_TOKEN_DELAY_MS: u64 = 40;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers every job with a streamed echo reply.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            demo: true,
        }
    }

    /// Queues the identifier returned by the next successful submit.
    pub fn queue_job_id(&self, job_id: impl Into<JobId>) -> &Self {
        lock_unpoisoned(&self.state)
            .next_job_ids
            .push_back(job_id.into());
        self
    }

    /// Makes the next submit fail with `error`.
    pub fn fail_next_submit(&self, error: TransportError) -> &Self {
        lock_unpoisoned(&self.state).submit_failures.push_back(error);
        self
    }

    /// Makes every submit wait `delay` before answering.
    pub fn delay_submits(&self, delay: Duration) -> &Self {
        lock_unpoisoned(&self.state).submit_delay = Some(delay);
        self
    }

    pub fn script_push(&self, job_id: impl Into<JobId>, steps: Vec<PushStep>) -> &Self {
        lock_unpoisoned(&self.state)
            .push
            .insert(job_id.into(), PushScript::Steps(steps));
        self
    }

    pub fn refuse_push(&self, job_id: impl Into<JobId>, error: TransportError) -> &Self {
        lock_unpoisoned(&self.state)
            .push
            .insert(job_id.into(), PushScript::Refuse(error));
        self
    }

    pub fn script_polls(&self, job_id: impl Into<JobId>, steps: Vec<PollStep>) -> &Self {
        lock_unpoisoned(&self.state)
            .polls
            .insert(job_id.into(), steps.into());
        self
    }

    /// Requests received by `submit`, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<SubmitRequest> {
        lock_unpoisoned(&self.state).submitted.clone()
    }

    #[must_use]
    pub fn status_calls(&self, job_id: &JobId) -> usize {
        lock_unpoisoned(&self.state)
            .status_calls
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn events_opened(&self, job_id: &JobId) -> usize {
        lock_unpoisoned(&self.state)
            .events_opened
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    fn demo_steps(prompt: &str) -> Vec<PushStep> {
        let reply = format!("Mock job received: {prompt}\nProcessing complete.");
        let mut steps = Vec::new();
        let mut pending_token = String::new();

        for ch in reply.chars() {
            pending_token.push(ch);
            if matches!(ch, ' ' | '\n') {
                steps.push(PushStep::Delay(Duration::from_millis(
                    Self::DEMO_TOKEN_DELAY_MS,
                )));
                steps.push(PushStep::fragment(std::mem::take(&mut pending_token)));
            }
        }
        if !pending_token.is_empty() {
            steps.push(PushStep::fragment(pending_token));
        }

        steps.push(PushStep::terminal(StatusReport::new(JobStatus::Completed)));
        steps
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobId, TransportError> {
        let delay = lock_unpoisoned(&self.state).submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock_unpoisoned(&self.state);
        state.submitted.push(request.clone());

        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }

        let job_id = match state.next_job_ids.pop_front() {
            Some(job_id) => job_id,
            None => {
                state.generated += 1;
                JobId::new(format!("mock-job-{}", state.generated))
            }
        };
        state
            .prompts
            .insert(job_id.clone(), request.content.clone());
        Ok(job_id)
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusReport, TransportError> {
        let mut state = lock_unpoisoned(&self.state);
        *state.status_calls.entry(job_id.clone()).or_default() += 1;

        let Some(steps) = state.polls.get_mut(job_id) else {
            return Ok(StatusReport::new(JobStatus::Running));
        };
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };

        match step {
            Some(PollStep::Report(report)) => Ok(report),
            Some(PollStep::Error(error)) => Err(error),
            None => Ok(StatusReport::new(JobStatus::Running)),
        }
    }

    async fn open_events(&self, job_id: &JobId) -> Result<FrameStream, TransportError> {
        let script = {
            let mut state = lock_unpoisoned(&self.state);
            *state.events_opened.entry(job_id.clone()).or_default() += 1;

            match state.push.get(job_id).cloned() {
                Some(script) => script,
                None if self.demo => {
                    let prompt = state.prompts.get(job_id).cloned().unwrap_or_default();
                    PushScript::Steps(Self::demo_steps(&prompt))
                }
                None => PushScript::Refuse(TransportError::transport(format!(
                    "no event stream scripted for job {job_id}"
                ))),
            }
        };

        let steps = match script {
            PushScript::Refuse(error) => return Err(error),
            PushScript::Steps(steps) => VecDeque::from(steps),
        };

        Ok(stream::unfold(steps, |mut steps| async move {
            loop {
                match steps.pop_front()? {
                    PushStep::Frame(frame) => return Some((Ok(frame), steps)),
                    PushStep::Error(error) => return Some((Err(error), steps)),
                    PushStep::Delay(delay) => tokio::time::sleep(delay).await,
                    PushStep::Hang => futures_util::future::pending::<()>().await,
                }
            }
        })
        .boxed())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
