use reqwest::StatusCode;

use job_api::error::parse_error_message;
use job_api::JobApiError;
use job_protocol::TransportErrorKind;

#[test]
fn parse_error_message_reads_nested_error_message() {
    let body = r#"{"error":{"code":"bad_request","message":"invalid agent"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "invalid agent");
}

#[test]
fn parse_error_message_reads_flat_error_and_detail_shapes() {
    assert_eq!(
        parse_error_message(StatusCode::NOT_FOUND, r#"{"error":"no such job"}"#),
        "no such job"
    );
    assert_eq!(
        parse_error_message(StatusCode::UNPROCESSABLE_ENTITY, r#"{"detail":"content required"}"#),
        "content required"
    );
    assert_eq!(
        parse_error_message(StatusCode::BAD_REQUEST, r#"{"message":"nope"}"#),
        "nope"
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body_then_reason() {
    assert_eq!(
        parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "raw failure text"),
        "raw failure text"
    );
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}

#[test]
fn status_errors_classify_as_rejected() {
    let error = JobApiError::Status(StatusCode::NOT_FOUND, "gone".to_string());
    let transport = error.into_transport_error();
    assert_eq!(transport.kind(), TransportErrorKind::Rejected { status: 404 });
    assert_eq!(transport.message(), "gone");
}

#[test]
fn stream_end_classifies_as_transport() {
    let transport = JobApiError::StreamEnded.into_transport_error();
    assert_eq!(transport.kind(), TransportErrorKind::Transport);
}
