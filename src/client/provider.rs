//! Provider: shared transport, base URL and error observer for a family of pollers

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::{
    api::PollApi,
    classify::Failure,
    config::{PollConfig, ProviderConfig},
    consolidate::Resolver,
    error::Result,
    poller::PollerBuilder,
};

/// Process-wide observer notified of every failure, unless a poller opts out
/// with `local_error_only`
///
/// Runs after the failure snapshot was emitted and outside the poller's state
/// lock, so it may stop or inspect the poller that failed.
pub trait ErrorObserver: Send + Sync {
    fn on_error(&self, failure: &Failure);
}

impl<F> ErrorObserver for F
where
    F: Fn(&Failure) + Send + Sync,
{
    fn on_error(&self, failure: &Failure) {
        self(failure)
    }
}

/// Hands out pollers that share one HTTP client and one set of defaults
///
/// Poller-level settings win over provider-level ones: an instance `base`
/// replaces the provider base, an instance resolver replaces the provider
/// resolver, and instance headers override provider headers of the same name.
pub struct PollProvider<T> {
    api: Arc<PollApi>,
    config: ProviderConfig,
    resolve: Option<Resolver<T>>,
    on_error: Option<Arc<dyn ErrorObserver>>,
}

impl<T> PollProvider<T> {
    /// Create a provider with its own HTTP client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(PollApi::new(&config)?);
        Ok(Self::from_api(api, config))
    }

    /// Create a provider on top of an existing transport
    pub fn from_api(api: Arc<PollApi>, config: ProviderConfig) -> Self {
        Self { api, config, resolve: None, on_error: None }
    }

    /// Resolver used by pollers that have none of their own
    pub fn with_resolve(mut self, resolve: Resolver<T>) -> Self {
        self.resolve = Some(resolve);
        self
    }

    pub fn with_on_error<O>(mut self, observer: O) -> Self
    where
        O: ErrorObserver + 'static,
    {
        self.on_error = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn api(&self) -> &PollApi {
        &self.api
    }

    pub(crate) fn resolve(&self) -> Option<&Resolver<T>> {
        self.resolve.as_ref()
    }

    pub(crate) fn error_observer(&self) -> Option<&dyn ErrorObserver> {
        self.on_error.as_deref()
    }
}

impl<T> PollProvider<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Start building a poller for `config`
    pub fn poller(&self, config: PollConfig<T>) -> PollerBuilder<T> {
        PollerBuilder::new(self.clone(), config)
    }
}

impl<T> Clone for PollProvider<T> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            config: self.config.clone(),
            resolve: self.resolve.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> std::fmt::Debug for PollProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PollProvider")
            .field("config", &self.config)
            .field("resolve", &self.resolve.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
