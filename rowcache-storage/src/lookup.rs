//! Batch key resolution against the cache.

use std::sync::Arc;

use rowcache_core::{LookupEntry, LookupRequest, LookupResult};

use crate::cache::CacheStore;

/// Read-only view of the cache used by request handlers.
#[derive(Debug, Clone)]
pub struct LookupService {
    cache: Arc<CacheStore>,
}

impl LookupService {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Resolve every key in `request`.
    ///
    /// The result has one entry per requested key, in request order and with
    /// duplicates kept. All keys are read from a single cache snapshot.
    pub async fn lookup_batch(&self, request: &LookupRequest) -> LookupResult {
        let keys = request.keys();
        let values = self.cache.get_many(keys).await;
        let entries = keys
            .iter()
            .zip(values)
            .map(|(key, value)| LookupEntry {
                key: key.clone(),
                value,
            })
            .collect();
        LookupResult::new(entries)
    }

    pub async fn is_ready(&self) -> bool {
        self.cache.is_ready().await
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}
