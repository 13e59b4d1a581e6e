//! Long-poll loop
//!
//! A [`Poller`] issues one request at a time: as soon as a response settles it
//! sends the next one, echoing the last `x-polling-index` it saw. The server's
//! hold time is the only delay between successful polls.
//!
//! Every (re)start bumps a generation counter. Responses belonging to an older
//! generation are dropped at settle time, so nothing reaches the sink after
//! `stop()` or a restarting `configure()`, even if the transport could not be
//! aborted in time.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use compact_str::{CompactString, ToCompactString};
use serde::de::DeserializeOwned;
use tokio::{runtime::Handle, task::JoinHandle, time::sleep};
use tracing::{debug, info, instrument, warn};

use super::{
    api::PollRequest,
    classify::{Failure, PollResult, classify},
    config::PollConfig,
    consolidate::Consolidator,
    error::{ClientError, Result},
    provider::PollProvider,
};
use crate::{
    id::{PollIndex, PollerId},
    sink::{Discard, LoopStatus, Snapshot, SnapshotSink},
};

/// Where a poller is in its lifecycle
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    /// Lazy and not started yet
    Idle,
    InFlight,
    /// A response was applied; the next request is about to go out
    Settled,
    /// Terminal
    Stopped,
}

/// Handle to a running long-poll loop. Dropping it stops the loop.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
}

/// Builder for [`Poller`], obtained from [`PollProvider::poller`]
pub struct PollerBuilder<T> {
    provider: PollProvider<T>,
    config: PollConfig<T>,
    sink: Option<Box<dyn SnapshotSink<T>>>,
}

struct Shared<T> {
    id: PollerId,
    provider: PollProvider<T>,
    sink: Box<dyn SnapshotSink<T>>,
    handle: Handle,
    state: Mutex<LoopState<T>>,
}

struct LoopState<T> {
    config: PollConfig<T>,
    url: CompactString,
    generation: u64,
    phase: Phase,
    index: Option<PollIndex>,
    held: Option<T>,
    status: LoopStatus,
    task: Option<JoinHandle<()>>,
}

enum Next {
    Poll(Duration),
    Halt,
}

impl<T> PollerBuilder<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(provider: PollProvider<T>, config: PollConfig<T>) -> Self {
        Self { provider, config, sink: None }
    }

    /// Set the snapshot sink
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: SnapshotSink<T> + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Emit the mount snapshot and start polling unless the config is lazy
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(self) -> Result<Poller<T>> {
        let handle = Handle::try_current().map_err(|_| {
            ClientError::config("Poller must be mounted within a Tokio runtime context")
        })?;
        let url = checked_url(&self.provider, &self.config)?;
        let id = PollerId::next();

        info!(poller_id = %id, url = %url, lazy = self.config.lazy, "Mounting poller");

        let shared = Arc::new(Shared {
            id,
            provider: self.provider,
            sink: self.sink.unwrap_or_else(|| Box::new(Discard)),
            handle,
            state: Mutex::new(LoopState::new(self.config, url)),
        });

        {
            let mut state = shared.lock();
            if state.config.lazy {
                shared.emit(&state);
            } else {
                state.status.loading = true;
                shared.emit(&state);
                shared.begin_cycle(&mut state);
            }
        }

        Ok(Poller { shared })
    }
}

impl<T> Poller<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Leave the idle state of a lazy poller; no-op when already polling
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.lock();
        match state.phase {
            Phase::Stopped => Err(ClientError::Stopped),
            Phase::Idle => {
                info!(poller_id = %self.shared.id, "Starting poller");
                state.status.loading = true;
                self.shared.emit(&state);
                self.shared.begin_cycle(&mut state);
                Ok(())
            },
            Phase::InFlight | Phase::Settled => Ok(()),
        }
    }

    /// Stop polling for good. Any in-flight request is aborted and its
    /// response, should it still arrive, is discarded.
    pub fn stop(&self) {
        self.shared.halt();
    }

    /// Replace the configuration
    ///
    /// A change of path, base, wait, headers, initial index or resolver
    /// restarts the poller as if it were mounted again: continuation index and
    /// held value are reset and the mount snapshot is emitted. Other changes
    /// apply from the next response on.
    pub fn configure(&self, config: PollConfig<T>) -> Result<()> {
        let url = checked_url(&self.shared.provider, &config)?;

        let mut state = self.shared.lock();
        if state.phase == Phase::Stopped {
            return Err(ClientError::Stopped);
        }

        let restart = state.config.requires_restart(&config);
        state.config = config;
        state.url = url;

        if !restart {
            debug!(poller_id = %self.shared.id, "Configuration updated in place");
            return Ok(());
        }

        state.index = state.config.initial_index.clone();
        state.held = None;
        state.status = LoopStatus::default();

        if state.phase == Phase::Idle {
            debug!(poller_id = %self.shared.id, "Idle poller reconfigured");
            return Ok(());
        }

        info!(poller_id = %self.shared.id, url = %state.url, "Restarting poller after configuration change");

        if state.config.lazy {
            self.shared.idle(&mut state);
            self.shared.emit(&state);
        } else {
            state.status.loading = true;
            self.shared.emit(&state);
            self.shared.begin_cycle(&mut state);
        }

        Ok(())
    }

    /// Current value and status
    pub fn snapshot(&self) -> Snapshot<T> {
        let state = self.shared.lock();
        Snapshot::new(state.held.clone(), state.status.clone())
    }
}

impl<T> Poller<T> {
    pub fn id(&self) -> PollerId {
        self.shared.id
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Continuation index that the next request will carry
    pub fn index(&self) -> Option<PollIndex> {
        self.shared.lock().index.clone()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.shared.halt();
    }
}

impl<T> std::fmt::Debug for Poller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("id", &self.shared.id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl<T> LoopState<T> {
    fn new(config: PollConfig<T>, url: CompactString) -> Self {
        Self {
            index: config.initial_index.clone(),
            config,
            url,
            generation: 0,
            phase: Phase::Idle,
            held: None,
            status: LoopStatus::default(),
            task: None,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.phase != Phase::Stopped
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, LoopState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn halt(&self) {
        let mut state = self.lock();
        if state.phase == Phase::Stopped {
            return;
        }

        debug!(poller_id = %self.id, "Stopping poller");
        state.invalidate();
        state.phase = Phase::Stopped;
        state.status.loading = false;
    }

    fn idle(&self, state: &mut LoopState<T>) {
        state.invalidate();
        state.phase = Phase::Idle;
        state.status.loading = false;
    }
}

impl<T> Shared<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn emit(&self, state: &LoopState<T>) {
        self.sink
            .emit(Snapshot::new(state.held.clone(), state.status.clone()));
    }

    /// Invalidate the running cycle, if any, and spawn a fresh one
    fn begin_cycle(self: &Arc<Self>, state: &mut LoopState<T>) {
        state.invalidate();
        state.phase = Phase::InFlight;
        state.status.loading = true;

        let generation = state.generation;
        state.task = Some(self.handle.spawn(run(Arc::clone(self), generation)));
    }

    /// Compute the next request, or `None` when this generation is over
    fn prepare(&self, generation: u64) -> Option<Result<PollRequest>> {
        let mut state = self.lock();
        if !state.is_current(generation) {
            return None;
        }

        state.phase = Phase::InFlight;
        state.status.loading = true;

        let mut headers = self.provider.config().headers.clone();
        headers.extend(state.config.headers.clone());

        Some(PollRequest::new(
            state.url.clone(),
            state.config.wait,
            state.index.as_ref(),
            headers,
        ))
    }

    /// Apply a classified response to the loop state
    fn settle(&self, generation: u64, result: PollResult<T>) -> Next {
        let mut state = self.lock();
        if !state.is_current(generation) {
            debug!(poller_id = %self.id, generation, "Discarding response from a stale cycle");
            return Next::Halt;
        }

        state.phase = Phase::Settled;
        state.status.loading = false;

        match result {
            PollResult::Success { data, index } => {
                let consolidator = Consolidator::new(
                    state
                        .config
                        .resolve
                        .clone()
                        .or_else(|| self.provider.resolve().cloned()),
                );
                let previous = state.held.take();
                state.held = Some(consolidator.merge(data, previous.as_ref()));
                if let Some(index) = index {
                    debug!(poller_id = %self.id, index = %index, "Continuation index updated");
                    state.index = Some(index);
                }
                state.status.error = None;
                self.emit(&state);

                let finished = state
                    .config
                    .until
                    .as_ref()
                    .zip(state.held.as_ref())
                    .is_some_and(|(until, held)| until(held));
                if finished {
                    info!(poller_id = %self.id, "Stop condition met, poller stopped");
                    state.phase = Phase::Stopped;
                    state.task = None;
                    return Next::Halt;
                }

                Next::Poll(Duration::ZERO)
            },
            PollResult::NotModified { index } => {
                debug!(poller_id = %self.id, "Not modified");
                if let Some(index) = index {
                    state.index = Some(index);
                }
                state.status.error = None;
                self.emit(&state);
                Next::Poll(Duration::ZERO)
            },
            PollResult::Failure(failure) => {
                warn!(
                    poller_id = %self.id,
                    kind = ?failure.kind,
                    error = %failure,
                    "Poll failed"
                );
                state.status.error = Some(failure.clone());
                self.emit(&state);

                let delay = failure
                    .retry_after
                    .map_or(state.config.error_delay, |after| after.max(state.config.error_delay));
                let notify = !state.config.local_error_only;
                drop(state);

                // The observer may call back into this poller
                if notify && let Some(observer) = self.provider.error_observer() {
                    observer.on_error(&failure);
                }

                Next::Poll(delay)
            },
        }
    }
}

/// One generation of the loop; ends when the generation is superseded
#[instrument(skip(shared), fields(poller_id = %shared.id))]
async fn run<T>(shared: Arc<Shared<T>>, generation: u64)
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    debug!("Poll loop started");

    while let Some(request) = shared.prepare(generation) {
        let result = match request {
            Ok(request) => classify(shared.provider.api().issue(&request).await),
            Err(e) => PollResult::Failure(Failure::transport(None, e.to_compact_string())),
        };

        match shared.settle(generation, result) {
            Next::Poll(delay) if delay.is_zero() => tokio::task::yield_now().await,
            Next::Poll(delay) => sleep(delay).await,
            Next::Halt => break,
        }
    }

    debug!("Poll loop ended");
}

fn checked_url<T>(provider: &PollProvider<T>, config: &PollConfig<T>) -> Result<CompactString> {
    let url = config.url(&provider.config().base_url)?;
    PollRequest::new(
        url.clone(),
        config.wait,
        config.initial_index.as_ref(),
        config.headers.clone(),
    )?;
    Ok(url)
}
