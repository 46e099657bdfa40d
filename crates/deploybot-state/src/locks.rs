//! Per-channel mutex registry.
//!
//! Hands out one mutex per channel identifier, created on first use and
//! dropped again once no caller holds or waits on it. Callers on
//! different channels never contend beyond the brief registry lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct ChannelLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the mutex for `channel`.
    pub fn with_channel<T>(&self, channel: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.for_channel(channel);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(channel, lock);
        result
    }

    /// The mutex guarding `channel`. Every call for the same channel returns
    /// the same mutex while any caller still holds it.
    fn for_channel(&self, channel: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop our handle, and the registry entry if nobody else has one.
    fn release(&self, channel: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Handles are only cloned under the registry lock, so two references
        // (the map's and ours) means no other caller is holding or waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(channel);
        }
    }

    /// Number of channels with a live mutex.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
