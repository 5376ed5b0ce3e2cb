//! Registry of receiver types

use crate::error::RegistryError;
use crate::receiver::ReceiverHandle;
use serde_json::Value;
use std::collections::HashMap;

/// Function that creates a fresh, uninitialised receiver
pub type ReceiverFactory = fn() -> ReceiverHandle;

/// Factory and zero value registered under one name.
/// Stored together so a re-registration swaps both at once.
#[derive(Clone)]
struct RegistryEntry {
    factory: ReceiverFactory,
    zero: Value,
}

/// Registry for receiver types
///
/// Built once at startup from a fixed table and only read afterwards.
/// Names are case-insensitive.
#[derive(Clone, Default)]
pub struct Registry {
    receivers: HashMap<String, RegistryEntry>,
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(name, factory, zero)` rows
    pub fn from_table<I>(table: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, ReceiverFactory, Value)>,
    {
        let mut registry = Self::new();
        for (name, factory, zero) in table {
            registry.add_receiver(name, factory, zero);
        }
        registry
    }

    /// Register a receiver type
    ///
    /// `zero` seeds the snapshot before the first real value so a template
    /// referencing the entry never hits a missing field. A later
    /// registration under the same name replaces the earlier one.
    pub fn add_receiver(&mut self, name: &str, factory: ReceiverFactory, zero: Value) {
        self.receivers
            .insert(normalize(name), RegistryEntry { factory, zero });
    }

    /// Look up the factory for a receiver type
    pub fn get_receiver(&self, name: &str) -> Result<ReceiverFactory, RegistryError> {
        self.receivers
            .get(&normalize(name))
            .map(|entry| entry.factory)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Look up the zero value for a receiver type
    pub fn get_zero(&self, name: &str) -> Result<Value, RegistryError> {
        self.receivers
            .get(&normalize(name))
            .map(|entry| entry.zero.clone())
            .ok_or_else(|| RegistryError::ZeroNotFound(name.to_string()))
    }

    /// Create a new receiver instance by type name
    ///
    /// Every call returns a new instance, so several entries can use the
    /// same receiver type with different configuration.
    pub fn create_receiver(&self, name: &str) -> Result<ReceiverHandle, RegistryError> {
        let factory = self.get_receiver(name)?;
        Ok(factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.receivers.contains_key(&normalize(name))
    }

    /// List all registered receiver names (normalized), sorted
    pub fn list_receivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.receivers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}
