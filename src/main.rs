mod config;
mod logging;
mod result;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use longpoll::{
    Failure, Phase, PollConfig, PollIndex, PollProvider, ProviderConfig, Snapshot, resolver,
};
use serde_json::Value;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    config::CliConfig,
    logging::{LoggingConfig, init_logging},
    result::{AppError, Result},
};

/// Follow a long-polling endpoint and print every snapshot as a JSON line
#[derive(Debug, Parser)]
#[command(name = "longpoll", version, about)]
struct Cli {
    /// Path appended verbatim to the base URL
    #[arg(default_value = "")]
    path: String,

    /// Base URL, e.g. https://api.example.com
    #[arg(long)]
    base: Option<String>,

    /// Seconds the server may hold each request
    #[arg(long, value_name = "SECS")]
    wait: Option<u64>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Continuation index to resume from
    #[arg(long)]
    index: Option<String>,

    /// Shallow-merge successive JSON objects instead of replacing them
    #[arg(long)]
    merge: bool,

    /// Stop once the held value has this field set to `true`
    #[arg(long, value_name = "FIELD")]
    until_field: Option<String>,

    /// Pause after a failed poll before trying again
    #[arg(long, value_name = "MILLIS")]
    error_delay_ms: Option<u64>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist base, wait, headers and index to the configuration file
    #[arg(long)]
    save_config: bool,

    /// Dump every raw response body to ./longpoll-responses
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_config(&config_path)?;

    let _log_guard = initialize_logging(&file_config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "longpoll starting up");

    let effective = effective_config(&cli, file_config)?;
    if cli.save_config {
        config::save_config(&config_path, &effective)?;
        info!(path = %config_path.display(), "Configuration saved");
    }

    let provider = create_provider(&effective, cli.debug)?;
    let poll_config = create_poll_config(&cli, &effective);

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<Snapshot<Value>>();
    let poller = provider.poller(poll_config).sink(sender).mount()?;

    loop {
        tokio::select! {
            snapshot = receiver.recv() => {
                let Some(snapshot) = snapshot else { break };
                println!("{}", serde_json::to_string(&snapshot)?);

                if poller.phase() == Phase::Stopped {
                    info!("Stop condition met");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}

fn initialize_logging(file_config: &CliConfig) -> Result<Option<WorkerGuard>> {
    let mut logging_config = LoggingConfig::from_env();

    if let Some(log_level) = &file_config.log_level {
        if log_level.eq_ignore_ascii_case("off") {
            logging_config.log_dir = None;
        }
        logging_config.level = log_level.to_ascii_lowercase().into();
    }

    init_logging(&logging_config)
}

/// Command-line values win over the configuration file
fn effective_config(cli: &Cli, mut config: CliConfig) -> Result<CliConfig> {
    if let Some(base) = &cli.base {
        config.base = Some(base.as_str().into());
    }
    if let Some(wait) = cli.wait {
        config.wait_secs = Some(wait);
    }
    if let Some(index) = &cli.index {
        config.index = Some(PollIndex::new(index.as_str()));
    }
    for raw in &cli.headers {
        let (name, value) = config::parse_header(raw)?;
        config.headers.insert(name, value);
    }

    if config.base.is_none() {
        return Err(AppError::config_validation_error(
            "base",
            "pass --base or set `base` in the configuration file",
        ));
    }

    Ok(config)
}

fn create_provider(config: &CliConfig, debug: bool) -> Result<PollProvider<Value>> {
    let mut provider_config =
        ProviderConfig::new(config.base.clone().unwrap_or_default()).with_debug_logging(debug);
    provider_config.headers = config.header_map()?;
    if debug {
        provider_config.debug.log_directory = Some(PathBuf::from("longpoll-responses"));
    }

    let provider = PollProvider::new(provider_config)?.with_on_error(|failure: &Failure| {
        error!(error = %failure, data = %failure.data, "Poll failed");
    });

    Ok(provider)
}

fn create_poll_config(cli: &Cli, config: &CliConfig) -> PollConfig<Value> {
    let mut poll_config =
        PollConfig::new(cli.path.as_str()).with_initial_index(config.index.clone());

    if let Some(millis) = cli.error_delay_ms {
        poll_config = poll_config.with_error_delay(Duration::from_millis(millis));
    }
    if let Some(wait) = config.wait_secs {
        poll_config = poll_config.with_wait(Duration::from_secs(wait));
    }
    if cli.merge {
        poll_config = poll_config.with_resolve(resolver(merge_objects));
    }
    if let Some(field) = cli.until_field.clone() {
        poll_config = poll_config.with_until(move |held: &Value| {
            held.get(field.as_str()).and_then(Value::as_bool) == Some(true)
        });
    }

    poll_config
}

/// Shallow merge: keys of the new object replace keys of the previous one
fn merge_objects(data: Value, previous: Option<&Value>) -> Value {
    match (previous, data) {
        (Some(Value::Object(previous)), Value::Object(next)) => {
            let mut merged = previous.clone();
            merged.extend(next);
            Value::Object(merged)
        },
        (_, data) => data,
    }
}
