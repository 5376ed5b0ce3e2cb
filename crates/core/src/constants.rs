//! Shared constants for the scheduling core

use std::time::Duration;

/// Poll interval used when `pollInterval` is absent, malformed or zero
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Flat backoff between failed receiver `init` attempts
pub const INIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the shared change channel.
/// Kept at one so a slow render loop pushes back on the workers.
pub const CHANGE_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the worker-ready channel
pub const WORKER_CHANNEL_CAPACITY: usize = 1;
