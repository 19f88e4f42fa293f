//! Reader/writer-locked key/value mapping plus high-water mark.

use std::collections::HashMap;

use rowcache_core::{CacheEntry, HighWaterMark, RawValue};
use tokio::sync::RwLock;

/// Everything guarded by the cache lock.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, RawValue>,
    high_water_mark: Option<HighWaterMark>,
    /// Total bytes held in values.
    value_bytes: usize,
    /// Number of merges applied since creation.
    merges: u64,
}

/// Summary of one applied merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Keys that were not in the cache before this merge.
    pub inserted: usize,
    /// Keys whose value was replaced.
    pub overwritten: usize,
    /// Whether the merge moved the high-water mark forward.
    pub advanced: bool,
    /// The mark after the merge.
    pub high_water_mark: HighWaterMark,
}

impl MergeOutcome {
    /// Number of rows applied by the merge.
    pub fn rows(&self) -> usize {
        self.inserted + self.overwritten
    }
}

/// Point-in-time statistics about the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of keys currently cached.
    pub entry_count: usize,
    /// Approximate bytes held in values.
    pub value_bytes: usize,
    /// Merges applied since creation (the full load counts as one).
    pub merges: u64,
    /// Current high-water mark, `None` until the full load lands.
    pub high_water_mark: Option<HighWaterMark>,
}

/// Concurrently readable mirror of the row store.
///
/// Entries are never evicted. The only mutation is [`CacheStore::merge_batch`],
/// which is atomic with respect to every read method on this type.
#[derive(Debug, Default)]
pub struct CacheStore {
    state: RwLock<CacheState>,
}

impl CacheStore {
    /// Create an empty, not-yet-ready cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key`, or `None` if the key was never merged.
    pub async fn get(&self, key: &str) -> Option<RawValue> {
        self.state.read().await.entries.get(key).cloned()
    }

    /// Resolve several keys under one read guard.
    ///
    /// The returned vector is index-aligned with `keys`, and every element
    /// comes from the same snapshot.
    pub async fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Option<RawValue>> {
        let state = self.state.read().await;
        keys.iter()
            .map(|key| state.entries.get(key.as_ref()).cloned())
            .collect()
    }

    /// Insert or overwrite every entry and advance the mark, atomically.
    ///
    /// The mark only moves if `new_mark` is strictly newer than the current
    /// one. Entries are applied in order, so a key repeated within one batch
    /// ends with its last value.
    pub async fn merge_batch(
        &self,
        entries: Vec<CacheEntry>,
        new_mark: HighWaterMark,
    ) -> MergeOutcome {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut inserted = 0;
        let mut overwritten = 0;
        for entry in entries {
            let added = entry.value.len();
            match state.entries.insert(entry.key, entry.value) {
                Some(previous) => {
                    overwritten += 1;
                    state.value_bytes -= previous.len();
                }
                None => inserted += 1,
            }
            state.value_bytes += added;
        }

        let (advanced, high_water_mark) = match state.high_water_mark {
            Some(current) if !new_mark.is_newer_than(&current) => (false, current),
            _ => {
                state.high_water_mark = Some(new_mark);
                (true, new_mark)
            }
        };
        state.merges += 1;

        MergeOutcome {
            inserted,
            overwritten,
            advanced,
            high_water_mark,
        }
    }

    /// The mark used to scope the next incremental load.
    pub async fn high_water_mark(&self) -> Option<HighWaterMark> {
        self.state.read().await.high_water_mark
    }

    /// True once the initial full load has been merged.
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.high_water_mark.is_some()
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// True when no key has been merged yet.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Size, merge count and mark, read under one guard.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entry_count: state.entries.len(),
            value_bytes: state.value_bytes,
            merges: state.merges,
            high_water_mark: state.high_water_mark,
        }
    }

    /// Copy of the whole mapping. Intended for diagnostics and tests.
    pub async fn snapshot(&self) -> HashMap<String, RawValue> {
        self.state.read().await.entries.clone()
    }
}
