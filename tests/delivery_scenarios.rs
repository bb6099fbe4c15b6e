mod support;

use std::time::Duration;

use job_protocol::{JobId, StatusReport, TransportError};
use job_relay::{ChannelKind, DeliveryEvent, DeliveryEventKind, JobPhase, TerminalOutcome};
use job_transport_mock::{PollStep, PushStep};
use support::{assistant, user, Harness};

#[tokio::test(start_paused = true)]
async fn streamed_increments_then_completion_replace_the_same_message() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J1");
    harness.transport.script_push(
        "J1",
        vec![
            PushStep::fragment("Hello"),
            PushStep::Delay(Duration::from_millis(10)),
            PushStep::fragment(" world"),
            PushStep::Delay(Duration::from_millis(10)),
            PushStep::terminal(StatusReport::completed("Hello world!!")),
        ],
    );

    let conversation = harness.conversation.clone();
    let job_id = harness
        .coordinator
        .submit(&conversation, "Say hello")
        .await
        .expect("submit should succeed");
    assert_eq!(job_id.as_str(), "J1");
    assert_eq!(harness.coordinator.phase(), JobPhase::Queued);
    assert!(harness.state().loading);

    assert!(harness.step().await);
    assert_eq!(harness.last_content().as_deref(), Some("Hello"));
    assert!(harness.state().streaming);
    assert_eq!(harness.coordinator.phase(), JobPhase::Streaming);

    assert!(harness.step().await);
    assert_eq!(harness.last_content().as_deref(), Some("Hello world"));

    assert!(harness.step().await);
    assert_eq!(
        harness.transcript(),
        vec![user("Say hello"), assistant("Hello world!!")]
    );
    assert_eq!(harness.coordinator.phase(), JobPhase::Completed);
    harness.assert_idle_flags();
}

#[tokio::test(start_paused = true)]
async fn push_error_falls_back_to_polling_and_reports_failure_once() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J2");
    harness.transport.script_push(
        "J2",
        vec![PushStep::Error(TransportError::transport("connection refused"))],
    );
    harness.transport.script_polls(
        "J2",
        vec![
            PollStep::Report(StatusReport::new(job_protocol::JobStatus::Running)),
            PollStep::Report(StatusReport::failed("boom")),
        ],
    );

    let conversation = harness.conversation.clone();
    harness
        .coordinator
        .submit(&conversation, "Run the job")
        .await
        .expect("submit should succeed");

    assert!(harness.step().await);
    assert_eq!(harness.coordinator.active_channel(), Some(ChannelKind::Pull));
    assert_eq!(
        harness.state().active_job.map(|job| job.channel),
        Some(ChannelKind::Pull)
    );

    let phase = harness.coordinator.run_until_settled().await;

    assert_eq!(phase, JobPhase::Failed);
    assert_eq!(
        harness.transcript(),
        vec![user("Run the job"), assistant("❌ Error: boom")]
    );
    assert!(harness.messages()[1].is_error);
    assert_eq!(harness.transport.status_calls(&JobId::new("J2")), 2);
    assert_eq!(harness.transport.events_opened(&JobId::new("J2")), 1);
    harness.assert_idle_flags();
}

#[tokio::test(start_paused = true)]
async fn resubmitting_supersedes_the_previous_job() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J3").queue_job_id("J4");
    harness.transport.script_push(
        "J3",
        vec![
            PushStep::Delay(Duration::from_millis(5)),
            PushStep::fragment("three"),
            PushStep::terminal(StatusReport::completed("three done")),
        ],
    );
    harness.transport.script_push(
        "J4",
        vec![
            PushStep::Delay(Duration::from_millis(50)),
            PushStep::fragment("four"),
            PushStep::terminal(StatusReport::completed("four done")),
        ],
    );

    let conversation = harness.conversation.clone();
    let j3 = harness
        .coordinator
        .submit(&conversation, "first")
        .await
        .expect("J3 submit");
    let j4 = harness
        .coordinator
        .submit(&conversation, "second")
        .await
        .expect("J4 submit");
    assert_eq!(harness.coordinator.active_job_id(), Some(&j4));

    let stale = DeliveryEvent {
        job_id: j3.clone(),
        channel: ChannelKind::Push,
        kind: DeliveryEventKind::Increment("stale".to_string()),
    };
    assert!(!harness.coordinator.handle_event(stale));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let phase = harness.coordinator.run_until_settled().await;

    assert_eq!(phase, JobPhase::Completed);
    assert_eq!(
        harness.transcript(),
        vec![user("first"), user("second"), assistant("four done")]
    );
    assert!(!harness.coordinator.on_terminal(
        &j3,
        TerminalOutcome::Completed {
            result: Some("late".to_string()),
            artifact_url: None,
        }
    ));
    assert_eq!(harness.transcript().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn completion_without_result_keeps_streamed_text() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J5");
    harness.transport.script_push(
        "J5",
        vec![
            PushStep::fragment("x"),
            PushStep::fragment("y"),
            PushStep::terminal(StatusReport::new(job_protocol::JobStatus::Completed)),
        ],
    );

    let conversation = harness.conversation.clone();
    harness
        .coordinator
        .submit(&conversation, "go")
        .await
        .expect("submit");
    harness.coordinator.run_until_settled().await;

    assert_eq!(harness.transcript(), vec![user("go"), assistant("xy")]);
}

#[tokio::test(start_paused = true)]
async fn completion_appends_absolute_artifact_link() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J6");
    harness.transport.script_push(
        "J6",
        vec![PushStep::terminal(
            StatusReport::completed("Report ready").with_artifact("/files/out.zip"),
        )],
    );

    let conversation = harness.conversation.clone();
    harness
        .coordinator
        .submit(&conversation, "make report")
        .await
        .expect("submit");
    harness.coordinator.run_until_settled().await;

    assert_eq!(
        harness.last_content().as_deref(),
        Some("Report ready\n\n[Download output](https://jobs.example.com/api/files/out.zip)")
    );
    assert_eq!(harness.transcript().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_push_terminal_appends_error_after_partial_output() {
    let mut harness = Harness::new();
    harness.transport.queue_job_id("J7");
    harness.transport.script_push(
        "J7",
        vec![
            PushStep::fragment("partial"),
            PushStep::terminal(StatusReport::failed("worker crashed")),
        ],
    );

    let conversation = harness.conversation.clone();
    harness
        .coordinator
        .submit(&conversation, "go")
        .await
        .expect("submit");
    let phase = harness.coordinator.run_until_settled().await;

    assert_eq!(phase, JobPhase::Failed);
    assert_eq!(
        harness.transcript(),
        vec![
            user("go"),
            assistant("partial"),
            assistant("❌ Error: worker crashed")
        ]
    );
    harness.assert_idle_flags();
}
