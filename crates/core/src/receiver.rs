//! Receiver traits and the capability-tagged handle workers own

use anyhow::Result;
use async_trait::async_trait;
use rg_pipe_types::ReceiverConfig;
use serde_json::Value;
use std::fmt;

/// Trait for all receivers
///
/// A receiver produces a value on demand. Workers call [`Receiver::get`]
/// once right away and then on every poll interval tick.
///
/// The `#[async_trait]` macro is required because workers store receivers
/// as `Box<dyn Receiver>`.
#[async_trait]
pub trait Receiver: Send {
    /// Prepare the receiver from its configuration
    ///
    /// Side effects (opening sockets, probing devices) belong here, not in
    /// the registry factory. Failures are retried with a fixed backoff, so
    /// this must be safe to call again after an error.
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()>;

    /// Fetch the current value
    ///
    /// `Ok(None)` means "nothing changed this cycle" and is not an error.
    async fn get(&mut self) -> Result<Option<Value>>;
}

/// A receiver that can wait for its source to report a change
///
/// `get` is still used once at startup so templates do not sit on the zero
/// value until the first event arrives.
#[async_trait]
pub trait EventedReceiver: Receiver {
    /// Block until a new value is available
    async fn get_evented(&mut self) -> Result<Option<Value>>;
}

/// Capability profile of a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    Polling,
    Evented,
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverKind::Polling => f.write_str("polling"),
            ReceiverKind::Evented => f.write_str("evented"),
        }
    }
}

/// Type-erased receiver, tagged with its capability profile
///
/// The tag is decided once when the handle is built; the worker matches on
/// it to pick its run loop.
pub enum ReceiverHandle {
    Polling(Box<dyn Receiver>),
    Evented(Box<dyn EventedReceiver>),
}

impl ReceiverHandle {
    pub fn polling(receiver: impl Receiver + 'static) -> Self {
        ReceiverHandle::Polling(Box::new(receiver))
    }

    pub fn evented(receiver: impl EventedReceiver + 'static) -> Self {
        ReceiverHandle::Evented(Box::new(receiver))
    }

    pub fn kind(&self) -> ReceiverKind {
        match self {
            ReceiverHandle::Polling(_) => ReceiverKind::Polling,
            ReceiverHandle::Evented(_) => ReceiverKind::Evented,
        }
    }

    pub async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        match self {
            ReceiverHandle::Polling(receiver) => receiver.init(config).await,
            ReceiverHandle::Evented(receiver) => receiver.init(config).await,
        }
    }

    pub async fn get(&mut self) -> Result<Option<Value>> {
        match self {
            ReceiverHandle::Polling(receiver) => receiver.get().await,
            ReceiverHandle::Evented(receiver) => receiver.get().await,
        }
    }
}

impl fmt::Debug for ReceiverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReceiverHandle").field(&self.kind()).finish()
    }
}
