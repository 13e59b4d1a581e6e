//! Long-polling client modules
//!
//! Split leaf-first: the request issuer (`api`), the response classifier
//! (`classify`), the consolidator (`consolidate`), and the poll loop
//! (`poller`) driving them, with `provider` carrying shared defaults.

pub mod api;
pub mod classify;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod poller;
pub mod provider;

// Re-export main types for convenience
pub use api::{PollApi, PollRequest, RawOutcome};
pub use classify::{Failure, FailureKind, PollResult};
pub use config::{DEFAULT_ERROR_DELAY, DEFAULT_WAIT, DebugConfig, PollConfig, ProviderConfig, RequestConfig};
pub use consolidate::{Consolidator, Resolver, resolver};
pub use error::{ClientError, Result};
pub use poller::{Phase, Poller, PollerBuilder};
pub use provider::{ErrorObserver, PollProvider};
