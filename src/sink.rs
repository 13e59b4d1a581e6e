//! Outcome sink: where a poller pushes its `(data, status)` snapshots

use std::sync::mpsc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::client::Failure;

/// Request status as seen by consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStatus {
    /// True only while a request is in flight
    pub loading: bool,
    pub error: Option<Failure>,
}

/// One observation of a poller. Each snapshot replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    #[serde(flatten)]
    pub status: LoopStatus,
}

impl<T> Snapshot<T> {
    pub fn new(data: Option<T>, status: LoopStatus) -> Self {
        Self { data, status }
    }

    pub fn loading(&self) -> bool {
        self.status.loading
    }

    pub fn error(&self) -> Option<&Failure> {
        self.status.error.as_ref()
    }
}

/// Receives snapshots from a poller.
///
/// Called with the poller's state lock held, so implementations must not call
/// back into the [`Poller`](crate::client::Poller) that owns them.
pub trait SnapshotSink<T>: Send + Sync {
    fn emit(&self, snapshot: Snapshot<T>);
}

impl<T: Send> SnapshotSink<T> for mpsc::Sender<Snapshot<T>> {
    fn emit(&self, snapshot: Snapshot<T>) {
        let _ = self.send(snapshot);
    }
}

impl<T: Send> SnapshotSink<T> for UnboundedSender<Snapshot<T>> {
    fn emit(&self, snapshot: Snapshot<T>) {
        let _ = self.send(snapshot);
    }
}

/// Adapts a closure taking `(data, status)` into a sink
pub struct SinkFn<F>(pub F);

impl<T, F> SnapshotSink<T> for SinkFn<F>
where
    F: Fn(Option<&T>, &LoopStatus) + Send + Sync,
{
    fn emit(&self, snapshot: Snapshot<T>) {
        (self.0)(snapshot.data.as_ref(), &snapshot.status)
    }
}

/// Sink that drops everything, used when no observer is registered
pub(crate) struct Discard;

impl<T> SnapshotSink<T> for Discard {
    fn emit(&self, _snapshot: Snapshot<T>) {}
}
