use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use compact_str::CompactString;
use directories::BaseDirs;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use longpoll::PollIndex;

use crate::result::{AppError, Result};

/// Settings persisted between runs of the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub base: Option<CompactString>,
    pub wait_secs: Option<u64>,
    pub headers: BTreeMap<CompactString, CompactString>,
    pub log_level: Option<CompactString>,
    /// Continuation index to resume from
    pub index: Option<PollIndex>,
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = BaseDirs::new() {
        dirs.config_dir().join("longpoll.toml")
    } else {
        PathBuf::from("longpoll.toml")
    }
}

pub fn load_config(config_file: &Path) -> Result<CliConfig> {
    confy::load_path(config_file)
        .map_err(|e| AppError::config_load_error(config_file.to_path_buf(), e))
}

pub fn save_config(config_file: &Path, config: &CliConfig) -> Result<()> {
    confy::store_path(config_file, config)
        .map_err(|e| AppError::config_save_error(config_file.to_path_buf(), e))?;

    Ok(())
}

/// Parse `name:value` as given to `-H`
pub fn parse_header(raw: &str) -> Result<(CompactString, CompactString)> {
    let (name, value) = raw.split_once(':').ok_or_else(|| {
        AppError::config_validation_error("header", format!("expected NAME:VALUE, got {raw:?}"))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::config_validation_error("header", "header name is empty"));
    }

    Ok((name.into(), value.trim().into()))
}

impl CliConfig {
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                AppError::config_validation_error("header", format!("invalid header name {name:?}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                AppError::config_validation_error("header", format!("invalid value for {name}"))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}
