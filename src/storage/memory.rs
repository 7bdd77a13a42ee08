//! Process-local window store

use super::backend::{StorageBackend, WindowKey, WindowStore};
use crate::core::window::{WindowDecision, WindowSpec, WindowSet};
use crate::utils::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Windows of one key, guarded together with the retirement flag
#[derive(Debug, Default)]
struct SlotState {
    windows: WindowSet,
    /// Set, under the lock, when the slot is dropped from the map. A caller
    /// that still holds the slot must look the key up again.
    retired: bool,
}

/// Window set of one key plus the time it was last touched
#[derive(Debug)]
struct WindowSlot {
    state: Mutex<SlotState>,
    last_seen: AtomicU64,
}

impl WindowSlot {
    fn new(now_millis: u64) -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            last_seen: AtomicU64::new(now_millis),
        }
    }

    fn retire(&self) {
        self.state.lock().retired = true;
    }
}

/// In-memory windows, sharded by key with one lock per key
#[derive(Debug)]
pub struct InMemoryWindowStore {
    slots: DashMap<WindowKey, Arc<WindowSlot>>,
    max_keys: usize,
}

impl InMemoryWindowStore {
    pub fn new(max_keys: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &WindowKey, now_millis: u64) -> Arc<WindowSlot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }

        if self.slots.len() >= self.max_keys {
            self.make_room(now_millis);
        }

        Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(WindowSlot::new(now_millis)))
                .value(),
        )
    }

    /// Drop idle keys, then the least recently used ones until a tenth of the
    /// capacity is free
    fn make_room(&self, now_millis: u64) {
        let expired = self.purge_expired(now_millis);
        if self.slots.len() < self.max_keys {
            debug!("Dropped {} idle rate limit keys", expired);
            return;
        }

        let target = self.max_keys - (self.max_keys / 10).max(1);
        let excess = self.slots.len().saturating_sub(target);

        let mut by_age: Vec<(u64, WindowKey)> = self
            .slots
            .iter()
            .map(|entry| (entry.value().last_seen.load(Ordering::Relaxed), entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_seen, _)| *last_seen);

        for (_, key) in by_age.into_iter().take(excess) {
            self.slots.remove_if(&key, |_, slot| {
                slot.retire();
                true
            });
        }
        debug!("Evicted {} least recently used rate limit keys", excess);
    }

    fn purge_expired(&self, now_millis: u64) -> usize {
        let mut removed = 0;
        self.slots.retain(|_, slot| {
            let mut state = slot.state.lock();
            state.windows.purge_all(now_millis);
            let keep = !state.windows.is_empty();
            if !keep {
                state.retired = true;
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Evaluate under the slot lock; `None` when the slot was retired after
    /// it was looked up
    fn try_acquire(
        slot: &WindowSlot,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> Option<WindowDecision> {
        let mut state = slot.state.lock();
        if state.retired {
            return None;
        }
        Some(state.windows.acquire(windows, now_millis, record))
    }
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn acquire(
        &self,
        key: &WindowKey,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> Result<WindowDecision> {
        loop {
            let slot = self.slot(key, now_millis);
            slot.last_seen.fetch_max(now_millis, Ordering::Relaxed);

            if let Some(decision) = Self::try_acquire(&slot, windows, now_millis, record) {
                return Ok(decision);
            }
            debug!("Rate limit slot for {} was retired, retrying", key);
        }
    }

    async fn clear(&self, identity: &str) -> Result<usize> {
        let mut removed = 0;
        self.slots.retain(|key, slot| {
            let keep = key.identity != identity;
            if !keep {
                slot.retire();
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn tracked_keys(&self) -> Result<usize> {
        Ok(self.slots.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self, now_millis: u64) -> Result<usize> {
        Ok(self.purge_expired(now_millis))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
