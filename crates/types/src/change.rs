//! Value changes flowing from workers to the aggregator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Mapping from configured entry name to its most recent value
pub type Snapshot = HashMap<String, Value>;

/// A single named value update emitted by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Name of the configured entry (not the receiver type)
    pub name: String,
    /// New value reported by the receiver
    pub value: Value,
}

impl Change {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Write this change into a snapshot, replacing any previous value
    pub fn apply_to(self, snapshot: &mut Snapshot) {
        snapshot.insert(self.name, self.value);
    }
}
