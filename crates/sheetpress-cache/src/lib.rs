// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sheetpress-cache: content-addressed cache of adjusted card images.
//
// Reads happen before every adjustment pass; writes are best-effort and run
// detached from the render path. A failing store degrades to "always
// recompute", never to wrong output.

pub mod key;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use key::{EffectKey, effect_cache_key, has_effects};
pub use sqlite::SqliteEffectStore;
pub use store::{EffectStore, MemoryEffectStore};

/// Shared handle to an effect store. Cheap to clone.
#[derive(Clone)]
pub struct EffectCache {
    store: Arc<dyn EffectStore>,
}

impl EffectCache {
    pub fn new(store: Arc<dyn EffectStore>) -> Self {
        Self { store }
    }

    /// A cache held in process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEffectStore::new()))
    }

    /// Look up an adjusted image. Store errors count as a miss.
    pub fn lookup(&self, key: &EffectKey) -> Option<Vec<u8>> {
        match self.store.get(key) {
            Ok(Some(bytes)) => {
                debug!(key = %key, size = bytes.len(), "effect cache hit");
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "effect cache read failed, recomputing");
                None
            }
        }
    }

    /// Write an entry on the tokio blocking pool.
    ///
    /// The returned handle may be dropped; nothing on the render path waits for
    /// it. Outside a runtime the write happens inline and `None` is returned.
    /// A failed write is logged and otherwise ignored.
    pub fn put_detached(&self, key: EffectKey, bytes: Vec<u8>) -> Option<JoinHandle<()>> {
        let store = Arc::clone(&self.store);
        let write = move || {
            if let Err(e) = store.put(&key, &bytes) {
                warn!(key = %key, error = %e, "effect cache write failed");
            }
        };
        match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn_blocking(write)),
            Err(_) => {
                write();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetpress_core::error::{Result, SheetpressError};
    use sheetpress_core::types::{EffectOverrides, ImageRef};

    struct BrokenStore;

    impl EffectStore for BrokenStore {
        fn get(&self, _key: &EffectKey) -> Result<Option<Vec<u8>>> {
            Err(SheetpressError::Cache("disk on fire".into()))
        }

        fn put(&self, _key: &EffectKey, _bytes: &[u8]) -> Result<()> {
            Err(SheetpressError::Cache("disk on fire".into()))
        }
    }

    fn key() -> EffectKey {
        effect_cache_key(&ImageRef::new("a.png"), &EffectOverrides::default(), 300)
    }

    #[tokio::test]
    async fn detached_write_becomes_visible() {
        let cache = EffectCache::in_memory();
        assert!(cache.lookup(&key()).is_none());
        let handle = cache
            .put_detached(key(), b"adjusted".to_vec())
            .expect("runtime present");
        handle.await.expect("writer task");
        assert_eq!(cache.lookup(&key()).as_deref(), Some(&b"adjusted"[..]));
    }

    #[test]
    fn write_without_runtime_is_inline() {
        let cache = EffectCache::in_memory();
        assert!(cache.put_detached(key(), b"adjusted".to_vec()).is_none());
        assert_eq!(cache.lookup(&key()).as_deref(), Some(&b"adjusted"[..]));
    }

    #[tokio::test]
    async fn broken_store_degrades_to_miss() {
        let cache = EffectCache::new(Arc::new(BrokenStore));
        assert!(cache.lookup(&key()).is_none());
        let handle = cache
            .put_detached(key(), vec![1, 2, 3])
            .expect("runtime present");
        // The writer swallows the error; awaiting must not surface a panic.
        handle.await.expect("writer task");
    }
}
