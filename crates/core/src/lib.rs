//! rg-pipe-core: Receiver traits, registry, workers and the render loop.
//!
//! Workers drive one receiver each and push [`Change`]s onto a shared
//! channel; the [`Aggregator`] is the single owner of the value snapshot
//! and re-renders the template whenever a change arrives.

pub mod aggregator;
pub mod constants;
pub mod error;
mod receiver;
mod registry;
pub mod template;
mod worker;

#[cfg(test)]
pub(crate) mod test_log;

pub use aggregator::Aggregator;
pub use constants::{
    CHANGE_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL, INIT_RETRY_DELAY, WORKER_CHANNEL_CAPACITY,
};
pub use error::{RegistryError, RenderError, TemplateError, WorkerError};
pub use receiver::{EventedReceiver, Receiver, ReceiverHandle, ReceiverKind};
pub use registry::{ReceiverFactory, Registry};
pub use template::{Delims, Render, Template};
pub use worker::{spawn_construction, Worker};

// Re-export types used in trait signatures for convenience
pub use rg_pipe_types::{Change, ReceiverConfig, Snapshot, Value};
