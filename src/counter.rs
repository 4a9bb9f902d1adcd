//! Signature counters.
//!
//! A credential's counter starts at the value sealed into its identifier
//! (0 at creation) and must strictly increase on every assertion.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::keystore::KeyStoreError;

pub trait SignCounter: Send + Sync {
    /// Advance the counter for `label` and return the new value, which is
    /// always greater than `floor` and than any value previously returned
    /// for `label` by this counter.
    fn next(&self, label: &str, floor: u32) -> Result<u32, KeyStoreError>;
}

/// Per-credential counters held in memory.
///
/// Values reset when the process restarts; a relying party that saw higher
/// values from a previous instance will observe a non-increasing counter.
#[derive(Debug, Default)]
pub struct MemoryCounter {
    counts: Mutex<HashMap<String, u32>>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, label: &str) -> Option<u32> {
        self.counts.lock().ok()?.get(label).copied()
    }
}

impl SignCounter for MemoryCounter {
    fn next(&self, label: &str, floor: u32) -> Result<u32, KeyStoreError> {
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| KeyStoreError::Unavailable("mutex poisoned".into()))?;
        let current = counts.get(label).copied().unwrap_or(0).max(floor);
        let next = current
            .checked_add(1)
            .ok_or_else(|| KeyStoreError::Sign(format!("signature counter exhausted for {label}")))?;
        counts.insert(label.to_string(), next);
        tracing::debug!(label, count = next, "Counter incremented");
        Ok(next)
    }
}
