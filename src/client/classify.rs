//! Response classification: raw HTTP outcome to typed poll result

use std::time::Duration;

use compact_str::{CompactString, ToCompactString, format_compact};
use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::api::{RawOutcome, RawResponse};
use crate::id::PollIndex;

/// Which stage of a poll went wrong
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was received
    Transport,
    /// The server answered with a status of 400 or above
    Http,
    /// A successful status carried a body that could not be decoded
    Decode,
}

/// Diagnostic for a failed poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// `Failed to poll: <status> <status text>[ - <decode error>]`
    pub message: CompactString,
    /// Response body (decoded when possible) or the error detail
    pub data: Value,
    #[serde(skip)]
    pub kind: FailureKind,
    #[serde(skip)]
    pub status: Option<u16>,
    /// Server-suggested pause before the next attempt
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

/// Typed outcome of one poll request
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult<T> {
    Success { data: T, index: Option<PollIndex> },
    /// 304: nothing new, keep the held value
    NotModified { index: Option<PollIndex> },
    Failure(Failure),
}

impl Failure {
    pub fn transport(status: Option<StatusCode>, detail: impl Into<CompactString>) -> Self {
        let detail = detail.into();
        let message = match status {
            Some(status) => status_message(status),
            None => "Failed to poll: 0 Network Error".into(),
        };

        Self {
            message,
            data: Value::String(detail.into()),
            kind: FailureKind::Transport,
            status: status.map(|s| s.as_u16()),
            retry_after: None,
        }
    }

    pub fn http(status: StatusCode, data: Value) -> Self {
        Self {
            message: status_message(status),
            data,
            kind: FailureKind::Http,
            status: Some(status.as_u16()),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn decode(status: StatusCode, detail: impl Into<CompactString>) -> Self {
        let detail = detail.into();
        Self {
            message: format_compact!("{} - {}", status_message(status), detail),
            data: Value::String(detail.into()),
            kind: FailureKind::Decode,
            status: Some(status.as_u16()),
            retry_after: None,
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Turn a raw outcome into a [`PollResult`]
pub fn classify<T: DeserializeOwned>(outcome: RawOutcome) -> PollResult<T> {
    match outcome {
        RawOutcome::Transport { status, detail } => {
            PollResult::Failure(Failure::transport(status, detail))
        },
        RawOutcome::Response(response) => classify_response(&response),
    }
}

fn classify_response<T: DeserializeOwned>(response: &RawResponse) -> PollResult<T> {
    let status = response.status;

    if status.as_u16() >= 400 {
        return PollResult::Failure(
            Failure::http(status, error_body(response)).with_retry_after(response.retry_after()),
        );
    }

    let index = response.polling_index();
    if status == StatusCode::NOT_MODIFIED {
        return PollResult::NotModified { index };
    }

    match decode_body(response) {
        Ok(data) => PollResult::Success { data, index },
        Err(detail) => PollResult::Failure(Failure::decode(status, detail)),
    }
}

fn decode_body<T: DeserializeOwned>(response: &RawResponse) -> Result<T, CompactString> {
    if response.is_json() {
        serde_json::from_slice(&response.body).map_err(|e| {
            format_compact!(
                "invalid json response body at {} reason: {}",
                response.url,
                e
            )
        })
    } else {
        serde_json::from_value(Value::String(response.text())).map_err(|e| {
            format_compact!(
                "unexpected response body at {} reason: {}",
                response.url,
                e
            )
        })
    }
}

/// Error bodies are decoded when they claim to be JSON, otherwise kept as text
fn error_body(response: &RawResponse) -> Value {
    if response.is_json()
        && let Ok(value) = serde_json::from_slice::<Value>(&response.body)
    {
        return value;
    }

    Value::String(response.text())
}

fn status_message(status: StatusCode) -> CompactString {
    let message = format_compact!(
        "Failed to poll: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    message.trim_end().to_compact_string()
}
