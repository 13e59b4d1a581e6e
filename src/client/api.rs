//! Request issuer: sends one long-poll GET and returns the raw outcome

use std::time::Duration;

use chrono::Local;
use compact_str::{CompactString, ToCompactString, format_compact};
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT},
};
use tracing::{debug, instrument, warn};

use super::{
    config::{DebugConfig, ProviderConfig},
    error::{ClientError, Result},
};
use crate::id::PollIndex;

/// Request header carrying the wait hint and continuation index
pub const PREFER_HEADER: HeaderName = HeaderName::from_static("prefer");
/// Response header carrying the next continuation index
pub const POLLING_INDEX_HEADER: HeaderName = HeaderName::from_static("x-polling-index");

/// HTTP transport shared by every poller of a provider
#[derive(Debug)]
pub struct PollApi {
    client: Client,
    debug: DebugConfig,
}

/// A fully computed poll request
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub url: CompactString,
    pub headers: HeaderMap,
}

/// What came back from the wire, before any interpretation
#[derive(Debug)]
pub enum RawOutcome {
    Response(RawResponse),
    /// No usable response: connect error, reset, body read failure...
    Transport {
        status: Option<StatusCode>,
        detail: CompactString,
    },
}

#[derive(Debug)]
pub struct RawResponse {
    pub url: CompactString,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl PollApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.request.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        let mut default_headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.request.user_agent)
            .map_err(|_| ClientError::config_validation("user_agent", "Not a valid header value"))?;
        default_headers.insert(USER_AGENT, user_agent);

        let client = builder
            .default_headers(default_headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { client, debug: config.debug.clone() })
    }

    /// Send a single GET and wait for the response or a transport failure
    #[instrument(skip(self, request), fields(url = %request.url, prefer = ?request.headers.get(PREFER_HEADER)))]
    pub async fn issue(&self, request: &PollRequest) -> RawOutcome {
        let response = match self
            .client
            .get(request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Poll request failed before a response arrived");
                return RawOutcome::Transport {
                    status: e.status(),
                    detail: e.to_compact_string(),
                };
            },
        };

        let url = response.url().to_compact_string();
        let status = response.status();
        let headers = response.headers().clone();

        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => {
                debug!(error = %e, status = %status, "Failed to read poll response body");
                return RawOutcome::Transport {
                    status: Some(status),
                    detail: e.to_compact_string(),
                };
            },
        };

        debug!(status = %status, bytes = body.len(), "Poll response received");

        if self.debug.log_responses {
            self.log_response_to_file(&url, &body);
        }

        RawOutcome::Response(RawResponse { url, status, headers, body })
    }

    /// Dump a raw response body to the debug directory
    fn log_response_to_file(&self, url: &str, body: &[u8]) {
        let Some(log_dir) = &self.debug.log_directory else {
            return;
        };

        if !log_dir.exists()
            && let Err(e) = std::fs::create_dir_all(log_dir)
        {
            warn!("Failed to create log directory: {}", e);
            return;
        }

        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let filename = format!(
            "{}_{}.txt",
            Local::now().format("%Y-%m-%d_%H-%M-%S%.3f"),
            path.replace('/', "_")
        );
        let log_path = log_dir.join(filename);

        if let Err(e) = std::fs::write(&log_path, body) {
            warn!("Failed to write response log to {:?}: {}", log_path, e);
        } else {
            debug!("Response logged to {:?}", log_path);
        }
    }
}

impl PollRequest {
    /// Build a request; `headers` has lower priority than the computed `Prefer` header
    pub fn new(
        url: impl Into<CompactString>,
        wait: Duration,
        index: Option<&PollIndex>,
        mut headers: HeaderMap,
    ) -> Result<Self> {
        let prefer = HeaderValue::from_str(&prefer_value(wait, index)).map_err(|_| {
            ClientError::config_validation("index", "Polling index is not a valid header value")
        })?;
        headers.insert(PREFER_HEADER, prefer);

        Ok(Self { url: url.into(), headers })
    }
}

impl RawResponse {
    pub fn polling_index(&self) -> Option<PollIndex> {
        self.headers
            .get(POLLING_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(PollIndex::new)
    }

    /// `Retry-After` in delta-seconds; HTTP dates are ignored
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("json"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// `wait=<secs>s;` before the first index is known, `wait=<secs>s;index=<index>` after
pub fn prefer_value(wait: Duration, index: Option<&PollIndex>) -> CompactString {
    match index {
        Some(index) => format_compact!("wait={}s;index={}", wait.as_secs(), index),
        None => format_compact!("wait={}s;", wait.as_secs()),
    }
}

/// Effective URL is a plain concatenation of base and path
pub fn compose_url(base: &str, path: &str) -> CompactString {
    format_compact!("{}{}", base, path)
}
