//! Error types for the polling client

use compact_str::CompactString;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while building or driving a poller
///
/// Poll failures (bad status, network errors, undecodable bodies) are not
/// errors of this type: they are reported as [`Failure`](super::Failure)
/// snapshots and the loop keeps going.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(CompactString),

    #[error("Invalid {field}: {message}")]
    ConfigValidation { field: CompactString, message: CompactString },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: CompactString },

    #[error("Poller has been stopped")]
    Stopped,
}

impl ClientError {
    pub fn config(message: impl Into<CompactString>) -> Self {
        Self::Config(message.into())
    }

    pub fn config_validation(
        field: impl Into<CompactString>,
        message: impl Into<CompactString>,
    ) -> Self {
        Self::ConfigValidation { field: field.into(), message: message.into() }
    }

    pub fn invalid_url(url: impl Into<CompactString>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
