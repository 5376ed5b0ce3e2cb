//! Workers drive one receiver each and turn its values into changes

use crate::constants::{DEFAULT_POLL_INTERVAL, INIT_RETRY_DELAY};
use crate::error::WorkerError;
use crate::receiver::{ReceiverHandle, ReceiverKind};
use crate::registry::Registry;
use anyhow::Result;
use log::{debug, error, info, trace, warn};
use rg_pipe_types::{Change, ReceiverConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Extract the poll interval from an entry's config
///
/// Absent, malformed and zero intervals all fall back to the default.
/// A bad value is logged but never fails the worker.
fn resolve_poll_interval(name: &str, config: &ReceiverConfig) -> Duration {
    match config.poll_interval() {
        Ok(Some(interval)) if interval.is_zero() => {
            warn!(
                "{}: pollInterval must be positive, using {:?}",
                name, DEFAULT_POLL_INTERVAL
            );
            DEFAULT_POLL_INTERVAL
        }
        Ok(Some(interval)) => interval,
        Ok(None) => DEFAULT_POLL_INTERVAL,
        Err(e) => {
            warn!("{}: {}, using {:?}", name, e, DEFAULT_POLL_INTERVAL);
            DEFAULT_POLL_INTERVAL
        }
    }
}

/// Owns one receiver instance and pushes its values as [`Change`]s
#[derive(Debug)]
pub struct Worker {
    name: String,
    receiver: ReceiverHandle,
    poll_interval: Duration,
    once: bool,
}

impl Worker {
    /// Construct a worker for the entry `name`
    ///
    /// Unknown or missing receiver types are configuration errors and
    /// return immediately. A failing `init` is retried forever with a flat
    /// [`INIT_RETRY_DELAY`]; it only blocks this worker.
    pub async fn new(
        name: impl Into<String>,
        config: &ReceiverConfig,
        registry: &Registry,
    ) -> Result<Self, WorkerError> {
        let name = name.into();
        let poll_interval = resolve_poll_interval(&name, config);

        let receiver_type = config
            .receiver_type()
            .ok_or_else(|| WorkerError::MissingReceiver(name.clone()))?;
        let factory = registry
            .get_receiver(receiver_type)
            .map_err(|source| WorkerError::Registry {
                name: name.clone(),
                source,
            })?;

        let mut receiver = factory();
        let mut attempt: u32 = 1;
        while let Err(e) = receiver.init(config).await {
            warn!(
                "{}: init attempt {} failed, retrying in {:?}: {:#}",
                name, attempt, INIT_RETRY_DELAY, e
            );
            attempt += 1;
            tokio::time::sleep(INIT_RETRY_DELAY).await;
        }

        info!(
            "{}: {} receiver `{}` ready (poll interval {:?})",
            name,
            receiver.kind(),
            receiver_type,
            poll_interval
        );

        Ok(Self {
            name,
            receiver,
            poll_interval,
            once: false,
        })
    }

    /// Wrap an already initialised receiver
    pub fn with_receiver(
        name: impl Into<String>,
        receiver: ReceiverHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            receiver,
            poll_interval,
            once: false,
        }
    }

    /// Stop after a single tick/event following the initial value
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn kind(&self) -> ReceiverKind {
        self.receiver.kind()
    }

    /// Worker event loop
    ///
    /// Polling receivers are asked on every poll interval tick; evented
    /// receivers block until their source reports something. Both get one
    /// synchronous `get` first. Returns when running once, or when the
    /// change channel has been closed.
    pub async fn run(&mut self, changes: &mpsc::Sender<Change>) {
        let name = self.name.as_str();
        let once = self.once;
        let period = self.poll_interval;

        match &mut self.receiver {
            ReceiverHandle::Evented(receiver) => {
                if !emit(name, receiver.get().await, changes).await {
                    return;
                }
                loop {
                    if !emit(name, receiver.get_evented().await, changes).await || once {
                        break;
                    }
                }
            }
            ReceiverHandle::Polling(receiver) => {
                if !emit(name, receiver.get().await, changes).await {
                    return;
                }
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !emit(name, receiver.get().await, changes).await || once {
                        break;
                    }
                }
            }
        }
        debug!("{}: worker loop finished", name);
    }
}

/// Handle the outcome of one fetch
///
/// Errors are logged with the entry name, `None` is silently skipped.
/// Returns `false` once the change channel is closed.
async fn emit(name: &str, result: Result<Option<Value>>, changes: &mpsc::Sender<Change>) -> bool {
    match result {
        Err(e) => {
            warn!("{}: {:#}", name, e);
            true
        }
        Ok(None) => true,
        Ok(Some(value)) => {
            trace!("{}: sending change", name);
            if changes.send(Change::new(name, value)).await.is_err() {
                debug!("{}: change channel closed", name);
                return false;
            }
            true
        }
    }
}

/// Construct a worker on its own task and hand it to the render loop
///
/// Construction may retry indefinitely, so each entry gets an independent
/// task. Configuration errors are logged and nothing is sent.
pub fn spawn_construction(
    name: String,
    config: ReceiverConfig,
    registry: Arc<Registry>,
    once: bool,
    ready: mpsc::Sender<Worker>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("{}: construction cancelled", name);
            }
            result = Worker::new(name.clone(), &config, &registry) => match result {
                Ok(worker) => {
                    if ready.send(worker.once(once)).await.is_err() {
                        debug!("{}: worker channel closed", name);
                    }
                }
                Err(e) => error!("{}, not spawning worker", e),
            },
        }
    })
}
