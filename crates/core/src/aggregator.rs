//! Aggregator: the single owner of the value snapshot and the render loop

use crate::constants::CHANGE_CHANNEL_CAPACITY;
use crate::template::Render;
use crate::worker::Worker;
use log::{debug, info, trace, warn};
use rg_pipe_types::{Change, Snapshot};
use serde_json::Value;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Output used for a cycle whose render failed
const RENDER_ERROR_OUTPUT: &str = "\n";

/// Consumes changes, keeps the snapshot and writes rendered output
///
/// Only this type ever mutates the snapshot, so no locking is needed.
pub struct Aggregator<R, W> {
    snapshot: Snapshot,
    renderer: R,
    sink: W,
    last_output: Option<String>,
}

impl<R: Render, W: Write> Aggregator<R, W> {
    pub fn new(renderer: R, sink: W) -> Self {
        Self {
            snapshot: Snapshot::new(),
            renderer,
            sink,
            last_output: None,
        }
    }

    /// Seed an entry with its receiver's zero value
    pub fn seed(&mut self, name: impl Into<String>, zero: Value) {
        self.snapshot.insert(name.into(), zero);
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Render the current snapshot
    ///
    /// A render error never escapes: it is logged and the cycle's output
    /// becomes a single blank line.
    pub fn render(&self) -> String {
        match self.renderer.render(&self.snapshot) {
            Ok(output) => output,
            Err(e) => {
                warn!("Render failed: {}", e);
                RENDER_ERROR_OUTPUT.to_string()
            }
        }
    }

    /// Record a change, render, and write the output if it differs from
    /// the previous render
    ///
    /// Returns whether anything was written.
    pub fn apply(&mut self, change: Change) -> io::Result<bool> {
        trace!("Change for {}", change.name);
        change.apply_to(&mut self.snapshot);

        let output = self.render();
        if self.last_output.as_deref() == Some(output.as_str()) {
            debug!("Output unchanged, skipping write");
            return Ok(false);
        }

        self.sink.write_all(output.as_bytes())?;
        self.sink.flush()?;
        self.last_output = Some(output);
        Ok(true)
    }

    /// Run the render loop
    ///
    /// Multiplexes the worker-ready channel and the change channel. Each
    /// ready worker runs on its own task until `cancel` fires. Returns when
    /// cancelled, or once the worker-ready channel is closed and every
    /// worker has finished.
    pub async fn run(
        &mut self,
        mut workers: mpsc::Receiver<Worker>,
        cancel: CancellationToken,
    ) -> io::Result<()> {
        let (tx, mut changes) = mpsc::channel::<Change>(CHANGE_CHANNEL_CAPACITY);
        // Dropped once no more workers can arrive, so the change channel
        // closes after the last worker exits.
        let mut tx = Some(tx);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Render loop cancelled");
                    break;
                }
                ready = workers.recv(), if tx.is_some() => match ready {
                    Some(worker) => {
                        if let Some(sender) = &tx {
                            debug!("Spawning worker {}", worker.name());
                            spawn_worker(worker, sender.clone(), cancel.clone());
                        }
                    }
                    None => {
                        debug!("Worker channel closed");
                        tx = None;
                    }
                },
                change = changes.recv() => match change {
                    Some(change) => {
                        self.apply(change)?;
                    }
                    None => {
                        debug!("All workers finished");
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}

fn spawn_worker(mut worker: Worker, changes: mpsc::Sender<Change>, cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = worker.run(&changes) => {}
        }
    });
}
