use std::path::PathBuf;

use compact_str::CompactString;
use thiserror::Error;

use longpoll::ClientError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Failed to load configuration from: {path}: {message}")]
    ConfigLoadError { path: PathBuf, message: String },

    #[error("Failed to save configuration to: {path}: {message}")]
    ConfigSaveError { path: PathBuf, message: String },

    #[error("Invalid {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Failed to initialize logging: {0}")]
    LoggingError(CompactString),

    #[error("{0}")]
    GeneralError(CompactString),
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::ConfigValidation { field, message } => {
                AppError::config_validation_error(field, message)
            },
            e => AppError::GeneralError(e.to_string().into()),
        }
    }
}

impl AppError {
    /// Create a configuration load error
    pub fn config_load_error(path: PathBuf, source: impl std::fmt::Display) -> Self {
        Self::ConfigLoadError { path, message: source.to_string() }
    }

    /// Create a configuration save error
    pub fn config_save_error(path: PathBuf, source: impl std::fmt::Display) -> Self {
        Self::ConfigSaveError { path, message: source.to_string() }
    }

    /// Create a configuration validation error
    pub fn config_validation_error(
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigValidationError { field: field.into(), message: message.into() }
    }
}
