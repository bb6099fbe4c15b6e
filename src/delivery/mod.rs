//! Push and pull delivery channels.
//!
//! A channel runs as a spawned task that only reports tagged
//! [`DeliveryEvent`]s to the coordinator's queue. The coordinator owns the
//! [`Subscription`] handle; dropping it aborts the task and with it any open
//! connection or pending timer.

use std::fmt;
use std::future::Future;

use job_protocol::{JobId, JobStatus, StatusReport};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::DeliveryError;

pub mod pull;
pub mod push;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Push,
    Pull,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a job as reported by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed {
        result: Option<String>,
        artifact_url: Option<String>,
    },
    Failed(DeliveryError),
}

impl TerminalOutcome {
    /// Maps a terminal status report; non-terminal reports yield `None`.
    #[must_use]
    pub fn from_report(report: &StatusReport) -> Option<Self> {
        match report.status {
            JobStatus::Completed => Some(Self::Completed {
                result: report.result_text(),
                artifact_url: report
                    .output_artifact_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(ToString::to_string),
            }),
            JobStatus::Failed => Some(Self::Failed(DeliveryError::JobFailure(
                report
                    .error
                    .as_deref()
                    .map(str::trim)
                    .filter(|error| !error.is_empty())
                    .unwrap_or("job failed")
                    .to_string(),
            ))),
            JobStatus::Queued | JobStatus::Running => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEventKind {
    Increment(String),
    Terminal(TerminalOutcome),
    ChannelFailure(DeliveryError),
}

/// Event reported by a channel, tagged with its job and origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub job_id: JobId,
    pub channel: ChannelKind,
    pub kind: DeliveryEventKind,
}

pub type EventSender = UnboundedSender<DeliveryEvent>;

/// Sends events for one job and channel. `false` means nobody listens anymore.
#[derive(Debug, Clone)]
pub(crate) struct EventReporter {
    job_id: JobId,
    channel: ChannelKind,
    events: EventSender,
}

impl EventReporter {
    pub(crate) fn new(job_id: JobId, channel: ChannelKind, events: EventSender) -> Self {
        Self {
            job_id,
            channel,
            events,
        }
    }

    pub(crate) fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub(crate) fn report(&self, kind: DeliveryEventKind) -> bool {
        self.events
            .send(DeliveryEvent {
                job_id: self.job_id.clone(),
                channel: self.channel,
                kind,
            })
            .is_ok()
    }
}

/// Live handle to one open delivery channel.
///
/// Dropping the handle aborts the channel task unconditionally.
#[derive(Debug)]
pub struct Subscription {
    job_id: JobId,
    channel: ChannelKind,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn<F>(job_id: JobId, channel: ChannelKind, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            job_id,
            channel,
            task: tokio::spawn(task),
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[must_use]
    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn completed_report_keeps_result_and_artifact() {
        let report = StatusReport::completed(json!({"text": "done"})).with_artifact(" /a.zip ");

        assert_eq!(
            TerminalOutcome::from_report(&report),
            Some(TerminalOutcome::Completed {
                result: Some("done".to_string()),
                artifact_url: Some("/a.zip".to_string()),
            })
        );
    }

    #[test]
    fn failed_report_without_error_gets_generic_message() {
        let report = StatusReport::new(JobStatus::Failed);

        assert_eq!(
            TerminalOutcome::from_report(&report),
            Some(TerminalOutcome::Failed(DeliveryError::JobFailure(
                "job failed".to_string()
            )))
        );
        assert_eq!(
            TerminalOutcome::from_report(&StatusReport::new(JobStatus::Running)),
            None
        );
    }

    #[tokio::test]
    async fn dropping_subscription_aborts_task() {
        let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = EventReporter::new(JobId::new("j"), ChannelKind::Pull, events);

        let subscription = Subscription::spawn(JobId::new("j"), ChannelKind::Pull, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            reporter.report(DeliveryEventKind::Increment("late".to_string()));
        });
        drop(subscription);

        assert_eq!(rx.recv().await, None);
    }
}
