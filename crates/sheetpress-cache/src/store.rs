// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Effect stores: byte blobs keyed by effect hash.

use std::collections::HashMap;
use std::sync::Mutex;

use sheetpress_core::error::{Result, SheetpressError};

use crate::key::EffectKey;

/// Backing store for adjusted images.
///
/// Entries are immutable: a key always maps to the same bytes, so a second
/// `put` for an existing key may be ignored.
pub trait EffectStore: Send + Sync {
    fn get(&self, key: &EffectKey) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &EffectKey, bytes: &[u8]) -> Result<()>;
}

/// Process-local store, used in tests and when no database is configured.
#[derive(Default)]
pub struct MemoryEffectStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryEffectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EffectStore for MemoryEffectStore {
    fn get(&self, key: &EffectKey) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SheetpressError::Cache("memory store lock poisoned".into()))?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn put(&self, key: &EffectKey, bytes: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SheetpressError::Cache("memory store lock poisoned".into()))?;
        entries
            .entry(key.as_str().to_owned())
            .or_insert_with(|| bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::effect_cache_key;
    use sheetpress_core::types::{EffectOverrides, ImageRef};

    #[test]
    fn miss_then_hit() {
        let store = MemoryEffectStore::new();
        let key = effect_cache_key(&ImageRef::new("a.png"), &EffectOverrides::default(), 300);
        assert!(store.get(&key).expect("get").is_none());

        store.put(&key, b"adjusted").expect("put");
        assert_eq!(store.get(&key).expect("get").as_deref(), Some(&b"adjusted"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn existing_entries_are_not_rewritten() {
        let store = MemoryEffectStore::new();
        let key = effect_cache_key(&ImageRef::new("a.png"), &EffectOverrides::default(), 300);
        store.put(&key, b"first").expect("put");
        store.put(&key, b"second").expect("put");
        assert_eq!(store.get(&key).expect("get").as_deref(), Some(&b"first"[..]));
    }
}
