//! Long-polling client engine
//!
//! Repeatedly issues `GET` requests carrying `Prefer: wait=<secs>s;index=<token>`,
//! echoes the server's `x-polling-index` on the next request, merges every
//! successful payload into a held value and pushes `(data, status)` snapshots
//! to a [`SnapshotSink`].
//!
//! ```no_run
//! # async fn demo() -> longpoll::client::Result<()> {
//! use longpoll::{PollConfig, PollProvider, ProviderConfig, Snapshot};
//! use serde_json::Value;
//!
//! let provider = PollProvider::<Value>::new(ProviderConfig::new("https://api.example.com"))?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Snapshot<Value>>();
//! let poller = provider.poller(PollConfig::new("/events")).sink(tx).mount()?;
//!
//! while let Some(snapshot) = rx.recv().await {
//!     println!("{:?}", snapshot.data);
//! }
//! # drop(poller);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod id;
pub mod sink;

pub use client::{
    ClientError, ErrorObserver, Failure, FailureKind, Phase, PollConfig, PollProvider, Poller,
    ProviderConfig, resolver,
};
pub use id::{PollIndex, PollerId};
pub use sink::{LoopStatus, SinkFn, Snapshot, SnapshotSink};
