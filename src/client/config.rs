//! Configuration for providers and poll instances

use std::{path::PathBuf, sync::Arc, time::Duration};

use compact_str::CompactString;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::{
    api::compose_url,
    consolidate::{Resolver, same_resolver},
    error::{ClientError, Result},
};
use crate::id::PollIndex;

/// Default long-poll hold time requested from the server
pub const DEFAULT_WAIT: Duration = Duration::from_secs(60);

/// Minimum pause before retrying after a failed poll
pub const DEFAULT_ERROR_DELAY: Duration = Duration::from_millis(250);

/// Predicate over the held value; polling stops once it returns true
pub type StopCondition<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Provider-level configuration shared by every poller it creates
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL prepended to every poller's path unless the poller has its own
    pub base_url: CompactString,
    /// Headers sent with every request
    pub headers: HeaderMap,
    pub request: RequestConfig,
    pub debug: DebugConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Whole-request timeout; `None` leaves long polls to the server
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub user_agent: CompactString,
}

/// Debug and logging configuration
#[derive(Debug, Clone, Default)]
pub struct DebugConfig {
    /// Dump every raw poll response body to `log_directory`
    pub log_responses: bool,
    pub log_directory: Option<PathBuf>,
}

/// Configuration of a single poller
pub struct PollConfig<T> {
    pub path: CompactString,
    /// Overrides the provider base when set
    pub base: Option<CompactString>,
    /// Wait hint, sent in whole seconds
    pub wait: Duration,
    /// Stay idle until explicitly started
    pub lazy: bool,
    /// Keep failures away from the provider's error observer
    pub local_error_only: bool,
    pub headers: HeaderMap,
    pub resolve: Option<Resolver<T>>,
    pub until: Option<StopCondition<T>>,
    /// Pause before the next request after a failure; a longer
    /// `Retry-After` from the server takes precedence
    pub error_delay: Duration,
    /// Continuation index to resume from
    pub initial_index: Option<PollIndex>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: concat!("longpoll/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<CompactString>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HeaderMap::new(),
            request: RequestConfig::default(),
            debug: DebugConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.is_empty() {
            validate_base("base_url", &self.base_url)?;
        }

        if self.request.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ClientError::config_validation(
                "timeout",
                "Timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set request configuration
    pub fn with_request(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    /// Set debug configuration
    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    /// Enable dumping of raw responses
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug.log_responses = enabled;
        self
    }
}

impl<T> PollConfig<T> {
    pub fn new(path: impl Into<CompactString>) -> Self {
        Self {
            path: path.into(),
            base: None,
            wait: DEFAULT_WAIT,
            lazy: false,
            local_error_only: false,
            headers: HeaderMap::new(),
            resolve: None,
            until: None,
            error_delay: DEFAULT_ERROR_DELAY,
            initial_index: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<CompactString>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn local_error_only(mut self, local_error_only: bool) -> Self {
        self.local_error_only = local_error_only;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_resolve(mut self, resolve: Resolver<T>) -> Self {
        self.resolve = Some(resolve);
        self
    }

    pub fn with_until<F>(mut self, until: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.until = Some(Arc::new(until));
        self
    }

    pub fn with_error_delay(mut self, delay: Duration) -> Self {
        self.error_delay = delay;
        self
    }

    pub fn with_initial_index(mut self, index: Option<PollIndex>) -> Self {
        self.initial_index = index;
        self
    }

    /// Whether switching from `self` to `other` must restart the poll cycle
    pub fn requires_restart(&self, other: &PollConfig<T>) -> bool {
        self.path != other.path
            || self.base != other.base
            || self.wait.as_secs() != other.wait.as_secs()
            || self.headers != other.headers
            || self.initial_index != other.initial_index
            || !same_resolver(&self.resolve, &other.resolve)
    }

    /// Compose and validate the request URL against a provider base
    pub fn url(&self, provider_base: &str) -> Result<CompactString> {
        let base = self.base.as_deref().unwrap_or(provider_base);
        if base.is_empty() {
            return Err(ClientError::config_validation(
                "base",
                "No base URL configured on the poller or its provider",
            ));
        }

        validate_base("base", base)?;

        let url = compose_url(base, &self.path);
        if url::Url::parse(&url).is_err() {
            return Err(ClientError::invalid_url(url));
        }

        Ok(url)
    }
}

impl<T> Clone for PollConfig<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            base: self.base.clone(),
            wait: self.wait,
            lazy: self.lazy,
            local_error_only: self.local_error_only,
            headers: self.headers.clone(),
            resolve: self.resolve.clone(),
            until: self.until.clone(),
            error_delay: self.error_delay,
            initial_index: self.initial_index.clone(),
        }
    }
}

impl<T> std::fmt::Debug for PollConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PollConfig")
            .field("path", &self.path)
            .field("base", &self.base)
            .field("wait", &self.wait)
            .field("lazy", &self.lazy)
            .field("local_error_only", &self.local_error_only)
            .field("headers", &self.headers)
            .field("resolve", &self.resolve.is_some())
            .field("until", &self.until.is_some())
            .field("error_delay", &self.error_delay)
            .field("initial_index", &self.initial_index)
            .finish()
    }
}

fn validate_base(field: &'static str, base: &str) -> Result<()> {
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(ClientError::config_validation(
            field,
            "Base URL must start with http:// or https://",
        ));
    }

    if url::Url::parse(base).is_err() {
        return Err(ClientError::config_validation(
            field,
            "Base URL is not a valid URL format",
        ));
    }

    Ok(())
}
