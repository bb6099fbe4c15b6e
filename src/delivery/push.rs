//! Push channel: one long-lived event stream per job.

use std::sync::Arc;

use futures_util::StreamExt;
use job_protocol::{JobId, JobTransport, StreamFrame};

use super::{
    ChannelKind, DeliveryEventKind, EventReporter, EventSender, Subscription, TerminalOutcome,
};
use crate::error::DeliveryError;

/// Opens the push channel for `job_id`.
pub fn open(transport: Arc<dyn JobTransport>, job_id: JobId, events: EventSender) -> Subscription {
    let reporter = EventReporter::new(job_id.clone(), ChannelKind::Push, events);
    Subscription::spawn(job_id, ChannelKind::Push, run(transport, reporter))
}

async fn run(transport: Arc<dyn JobTransport>, reporter: EventReporter) {
    let job_id = reporter.job_id().clone();

    let mut frames = match transport.open_events(&job_id).await {
        Ok(frames) => frames,
        Err(error) => {
            tracing::debug!(job_id = %job_id, %error, "event stream could not be opened");
            reporter.report(DeliveryEventKind::ChannelFailure(error.into()));
            return;
        }
    };
    tracing::debug!(job_id = %job_id, "event stream opened");

    while let Some(item) = frames.next().await {
        match item {
            Ok(StreamFrame::Fragment { text }) => {
                if text.is_empty() {
                    continue;
                }
                if !reporter.report(DeliveryEventKind::Increment(text)) {
                    return;
                }
            }
            Ok(StreamFrame::Terminal(report)) => match TerminalOutcome::from_report(&report) {
                Some(outcome) => {
                    reporter.report(DeliveryEventKind::Terminal(outcome));
                    return;
                }
                None => {
                    tracing::warn!(
                        job_id = %job_id,
                        status = report.status.as_str(),
                        "dropping non-terminal status frame"
                    );
                }
            },
            Err(error) if error.is_protocol() => {
                tracing::warn!(job_id = %job_id, %error, "dropping malformed frame");
            }
            Err(error) => {
                reporter.report(DeliveryEventKind::ChannelFailure(error.into()));
                return;
            }
        }
    }

    reporter.report(DeliveryEventKind::ChannelFailure(DeliveryError::Transport(
        "event stream ended before a terminal frame".to_string(),
    )));
}
