use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use job_protocol::{JobId, StatusReport, StreamFrame, SubmitReceipt, SubmitRequest};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::JobApiConfig;
use crate::error::{parse_error_message, JobApiError};
use crate::headers::{build_headers, to_header_map, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::sse::SseStreamParser;
use crate::url::{job_events_url, job_status_url, jobs_url, normalize_base_url};

/// Decoded frames from one event-stream response. Dropping it closes the
/// underlying connection.
pub type FrameResultStream = BoxStream<'static, Result<StreamFrame, JobApiError>>;

#[derive(Debug)]
pub struct JobApiClient {
    http: Client,
    config: JobApiConfig,
}

impl JobApiClient {
    pub fn new(config: JobApiConfig) -> Result<Self, JobApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(JobApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &JobApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        normalize_base_url(&self.config.base_url)
    }

    pub fn build_submit_request(
        &self,
        request: &SubmitRequest,
    ) -> Result<RequestBuilder, JobApiError> {
        let headers = to_header_map(build_headers(&self.config, ACCEPT_JSON))?;
        let builder = self
            .http
            .post(jobs_url(&self.config.base_url)?)
            .headers(headers)
            .json(request);
        Ok(self.with_request_timeout(builder))
    }

    pub fn build_status_request(&self, job_id: &JobId) -> Result<RequestBuilder, JobApiError> {
        let headers = to_header_map(build_headers(&self.config, ACCEPT_JSON))?;
        let builder = self
            .http
            .get(job_status_url(&self.config.base_url, job_id)?)
            .headers(headers);
        Ok(self.with_request_timeout(builder))
    }

    pub fn build_events_request(&self, job_id: &JobId) -> Result<RequestBuilder, JobApiError> {
        let headers = to_header_map(build_headers(&self.config, ACCEPT_EVENT_STREAM))?;
        Ok(self
            .http
            .get(job_events_url(&self.config.base_url, job_id)?)
            .headers(headers))
    }

    fn with_request_timeout(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Creates a job, retrying transient failures with exponential backoff.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<JobId, JobApiError> {
        let response = self.send_with_retry(request).await?;
        let body = response.text().await.map_err(JobApiError::from)?;
        let receipt = serde_json::from_str::<SubmitReceipt>(&body)
            .map_err(|error| JobApiError::MalformedBody(format!("submit response: {error}")))?;

        tracing::debug!(job_id = %receipt.job_id, "job submitted");
        Ok(receipt.job_id)
    }

    async fn send_with_retry(&self, request: &SubmitRequest) -> Result<Response, JobApiError> {
        let policy = self.config.submit_retry;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;
        let mut attempt = 0;

        loop {
            match self.build_submit_request(request)?.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);

                    if !(policy.has_retry_after(attempt) && policy.retries_status(status, &body)) {
                        return Err(JobApiError::Status(status, message));
                    }
                    tracing::debug!(attempt, %status, "retrying job submission");
                    last_status = Some(status);
                    last_error = Some(message);
                }
                Err(error) => {
                    let retryable = policy.retries_request_error(&error);
                    if !retryable && attempt == 0 {
                        return Err(JobApiError::Request(error));
                    }
                    last_error = Some(error.to_string());
                    if !(retryable && policy.has_retry_after(attempt)) {
                        return Err(JobApiError::RetryExhausted {
                            status: last_status,
                            last_error,
                        });
                    }
                    tracing::debug!(attempt, error = ?last_error, "retrying job submission");
                }
            }

            tokio::time::sleep(policy.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    /// Fetches the job status once. Failures are returned, never retried.
    pub async fn status(&self, job_id: &JobId) -> Result<StatusReport, JobApiError> {
        let response = self.build_status_request(job_id)?.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(JobApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        serde_json::from_str::<StatusReport>(&body)
            .map_err(|error| JobApiError::MalformedBody(format!("status response: {error}")))
    }

    /// Opens the job event stream and returns decoded frames.
    ///
    /// The stream ends when the server closes the connection; deciding whether
    /// that was premature is left to the caller.
    pub async fn open_events(&self, job_id: &JobId) -> Result<FrameResultStream, JobApiError> {
        let response = self.build_events_request(job_id)?.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        tracing::debug!(job_id = %job_id, "event stream opened");
        Ok(decode_frames(Box::pin(response.bytes_stream())))
    }
}

struct DecodeState<S> {
    bytes: S,
    parser: SseStreamParser,
    pending: VecDeque<Result<StreamFrame, JobApiError>>,
    finished: bool,
}

/// Turns a raw byte stream into decoded SSE frames.
///
/// A byte-level error is yielded once and ends the stream.
pub fn decode_frames<S, B, E>(bytes: S) -> FrameResultStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<JobApiError> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        parser: SseStreamParser::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.parser.feed(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(error.into()), state));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use futures_util::stream::{self, StreamExt};
    use job_protocol::{JobStatus, StreamFrame};

    use super::decode_frames;
    use crate::error::JobApiError;

    #[tokio::test]
    async fn decode_frames_yields_parser_order_then_ends() {
        let chunks: Vec<Result<Vec<u8>, JobApiError>> = vec![
            Ok(b"data: {\"text\":\"A\"}\n\ndata: {\"te".to_vec()),
            Ok(b"xt\":\"B\"}\n\n".to_vec()),
            Ok(b"data: {\"status\":\"completed\",\"result\":\"AB\"}\n\n".to_vec()),
        ];

        let frames: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], Ok(StreamFrame::Fragment { text }) if text == "A"));
        assert!(matches!(&frames[1], Ok(StreamFrame::Fragment { text }) if text == "B"));
        assert!(matches!(
            &frames[2],
            Ok(StreamFrame::Terminal(report)) if report.status == JobStatus::Completed
        ));
    }

    #[tokio::test]
    async fn decode_frames_stops_after_byte_error() {
        let chunks: Vec<Result<Vec<u8>, JobApiError>> = vec![
            Ok(b"data: {\"text\":\"A\"}\n\n".to_vec()),
            Err(JobApiError::Unknown("reset".to_string())),
            Ok(b"data: {\"text\":\"never\"}\n\n".to_vec()),
        ];

        let frames: Vec<_> = decode_frames(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[1], Err(JobApiError::Unknown(message)) if message == "reset"));
    }
}
