//! Per-entry receiver configuration
//!
//! The configuration loader hands each named entry over as a flat mapping of
//! loosely-typed values. The core only reads `receiver` and `pollInterval`;
//! everything else is passed through untouched for the receiver to validate.

use crate::duration::{parse_duration, DurationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Key naming the registered receiver type
pub const RECEIVER_KEY: &str = "receiver";

/// Key holding the optional poll interval duration string
pub const POLL_INTERVAL_KEY: &str = "pollInterval";

/// Opaque key -> value configuration for one receiver instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverConfig(HashMap<String, Value>);

impl ReceiverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for tests and programmatic setup
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Get a string value; `None` if absent or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Get an integer value; `None` if absent or not an integer
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Get a list of strings, skipping non-string items
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        self.0.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Name of the receiver type this entry asks for
    pub fn receiver_type(&self) -> Option<&str> {
        self.get_str(RECEIVER_KEY)
    }

    /// Parse the configured poll interval
    ///
    /// Returns `Ok(None)` when the key is absent. A non-string value is
    /// reported as an invalid duration.
    pub fn poll_interval(&self) -> Result<Option<Duration>, DurationError> {
        match self.0.get(POLL_INTERVAL_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => parse_duration(raw).map(Some),
            Some(other) => Err(DurationError::Invalid(other.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, Value>> for ReceiverConfig {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<ReceiverConfig> for HashMap<String, Value> {
    fn from(config: ReceiverConfig) -> Self {
        config.0
    }
}
