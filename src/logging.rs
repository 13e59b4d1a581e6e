use std::path::PathBuf;

use compact_str::{CompactString, format_compact};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::result::{AppError, Result};

const LOG_FILTER_ENV: &str = "LONGPOLL_LOG";
const LOG_DIR_ENV: &str = "LONGPOLL_LOG_DIR";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `longpoll=debug`
    pub level: CompactString,
    /// JSON log files are written here when set
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: std::env::var(LOG_FILTER_ENV)
                .map(CompactString::from)
                .unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}

/// Console output goes to stderr; stdout is reserved for snapshots
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        AppError::LoggingError(format_compact!("invalid filter {:?}: {}", config.level, e))
    })?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "longpoll.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::LoggingError(format_compact!("{}", e)))?;

    Ok(guard)
}
