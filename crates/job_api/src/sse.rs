use job_protocol::{JobStatus, StatusReport, StreamFrame};
use serde_json::Value;

use crate::error::JobApiError;

/// Incremental parser for job event SSE streams.
///
/// Bytes are buffered until a blank line closes a frame, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete frames.
    ///
    /// Malformed frames surface as [`JobApiError::MalformedFrame`] items in
    /// place; they never poison later frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamFrame, JobApiError>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some((split, separator_len)) = find_frame_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..split + separator_len).collect();
            let frame = String::from_utf8_lossy(&raw[..split]);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => match frame_from_value(value) {
                    Ok(Some(frame)) => frames.push(Ok(frame)),
                    Ok(None) => {}
                    Err(error) => frames.push(Err(error)),
                },
                Err(error) => frames.push(Err(JobApiError::MalformedFrame(format!(
                    "invalid JSON payload: {error}"
                )))),
            }
        }

        frames
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<Result<StreamFrame, JobApiError>> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|window| window == b"\n\n");
    let crlf = buffer.windows(4).position(|window| window == b"\r\n\r\n");

    match (lf, crlf) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Map one decoded JSON payload to a stream frame.
///
/// Returns `Ok(None)` for non-terminal status heartbeats (`queued`/`running`
/// without text), which carry nothing for the transcript.
pub fn frame_from_value(value: Value) -> Result<Option<StreamFrame>, JobApiError> {
    let mut heartbeat = false;
    if let Some(status) = value.get("status") {
        let status = status
            .as_str()
            .and_then(JobStatus::parse)
            .ok_or_else(|| JobApiError::MalformedFrame(format!("unknown status {status}")))?;
        if status.is_terminal() {
            let report = serde_json::from_value::<StatusReport>(value).map_err(|error| {
                JobApiError::MalformedFrame(format!("terminal frame: {error}"))
            })?;
            return Ok(Some(StreamFrame::Terminal(report)));
        }
        heartbeat = true;
    }

    let Some(text) = ["text", "delta", "content"]
        .iter()
        .find_map(|key| value.get(*key))
    else {
        if heartbeat {
            return Ok(None);
        }
        return Err(JobApiError::MalformedFrame(
            "frame carries neither text nor status".to_string(),
        ));
    };

    match text.as_str() {
        Some(text) => Ok(Some(StreamFrame::Fragment {
            text: text.to_owned(),
        })),
        None => Err(JobApiError::MalformedFrame(format!(
            "fragment text must be a string, got {text}"
        ))),
    }
}
