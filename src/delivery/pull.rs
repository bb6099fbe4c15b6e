//! Pull channel: fixed-interval status polling with an attempt ceiling.

use std::sync::Arc;
use std::time::Duration;

use job_protocol::{JobId, JobTransport, StatusReport, TransportError};

use super::{
    ChannelKind, DeliveryEventKind, EventReporter, EventSender, Subscription, TerminalOutcome,
};
use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// What the channel does after one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    Continue,
    Finish(DeliveryEventKind),
}

/// Classifies the result of poll number `attempt` (1-based).
///
/// A malformed status payload costs one attempt and keeps the channel open;
/// request failures end it.
pub fn classify_poll(
    result: Result<StatusReport, TransportError>,
    attempt: u32,
    max_attempts: u32,
) -> PollStep {
    match result {
        Ok(report) => match TerminalOutcome::from_report(&report) {
            Some(outcome) => PollStep::Finish(DeliveryEventKind::Terminal(outcome)),
            None if attempt >= max_attempts => PollStep::Finish(DeliveryEventKind::Terminal(
                TerminalOutcome::Failed(DeliveryError::Timeout { attempts: attempt }),
            )),
            None => PollStep::Continue,
        },
        Err(error) if error.is_protocol() => {
            if attempt >= max_attempts {
                PollStep::Finish(DeliveryEventKind::Terminal(TerminalOutcome::Failed(
                    DeliveryError::Timeout { attempts: attempt },
                )))
            } else {
                PollStep::Continue
            }
        }
        Err(error) => PollStep::Finish(DeliveryEventKind::ChannelFailure(error.into())),
    }
}

/// Opens the pull channel for `job_id`. The first poll happens one interval
/// after opening.
pub fn open(
    transport: Arc<dyn JobTransport>,
    job_id: JobId,
    schedule: PollSchedule,
    events: EventSender,
) -> Subscription {
    let reporter = EventReporter::new(job_id.clone(), ChannelKind::Pull, events);
    Subscription::spawn(job_id, ChannelKind::Pull, run(transport, schedule, reporter))
}

async fn run(transport: Arc<dyn JobTransport>, schedule: PollSchedule, reporter: EventReporter) {
    let job_id = reporter.job_id().clone();
    let max_attempts = schedule.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        tokio::time::sleep(schedule.interval).await;

        let result = transport.status(&job_id).await;
        tracing::debug!(
            job_id = %job_id,
            attempt,
            status = result.as_ref().map(|report| report.status.as_str()).unwrap_or("error"),
            "status poll"
        );

        if let Err(error) = &result {
            if error.is_protocol() {
                tracing::warn!(job_id = %job_id, attempt, %error, "dropping malformed status payload");
            }
        }

        match classify_poll(result, attempt, max_attempts) {
            PollStep::Continue => continue,
            PollStep::Finish(kind) => {
                reporter.report(kind);
                return;
            }
        }
    }
}
