//! The tile cache
//!
//! Encoded PNG tiles keyed by `(set key, set token, settings sequence,
//! z, x, y)`. Capacity is a memory budget with LRU eviction.
//! Invalidation happens two ways: a chart set change removes all tiles
//! of that set, a settings change removes every tile not rendered for
//! the new sequence.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tidemark_core::bbox::TileId;
use tracing::{debug, info};

/// Full key of one cached tile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// The chart set key
    pub set_key: String,
    /// The set token at render time
    pub set_token: String,
    /// The settings sequence at render time
    pub settings_sequence: u64,
    /// Tile address
    pub tile: TileId,
}

/// LRU tile cache with a memory budget
pub struct TileCache {
    inner: Mutex<LruCache<TileCacheKey, Bytes>>,
    max_bytes: usize,
    current_bytes: Mutex<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TileCache {
    /// Create with a memory budget in bytes
    pub fn new(max_bytes: usize) -> Self {
        TileCache {
            // the LRU length bound is a backstop; the real bound is bytes
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(1_000_000).expect("nonzero"),
            )),
            max_bytes,
            current_bytes: Mutex::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a tile
    pub fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        match inner.get(key) {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(data.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a tile, evicting LRU entries past the budget
    pub fn put(&self, key: TileCacheKey, data: Bytes) {
        let mut inner = self.inner.lock();
        let mut bytes = self.current_bytes.lock();
        if let Some(old) = inner.put(key, data.clone()) {
            *bytes -= old.len();
        }
        *bytes += data.len();
        while *bytes > self.max_bytes {
            match inner.pop_lru() {
                Some((_, evicted)) => *bytes -= evicted.len(),
                None => break,
            }
        }
    }

    /// Remove all tiles of one set
    pub fn clean_set(&self, set_key: &str) -> usize {
        let mut inner = self.inner.lock();
        let mut bytes = self.current_bytes.lock();
        let victims: Vec<TileCacheKey> = inner
            .iter()
            .filter(|(k, _)| k.set_key == set_key)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            if let Some(data) = inner.pop(key) {
                *bytes -= data.len();
            }
        }
        info!(set_key, removed = victims.len(), "cleaned tile cache for set");
        victims.len()
    }

    /// Remove all tiles not rendered for the given settings sequence
    pub fn clean_by_settings(&self, sequence: u64) -> usize {
        let mut inner = self.inner.lock();
        let mut bytes = self.current_bytes.lock();
        let victims: Vec<TileCacheKey> = inner
            .iter()
            .filter(|(k, _)| k.settings_sequence != sequence)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            if let Some(data) = inner.pop(key) {
                *bytes -= data.len();
            }
        }
        debug!(sequence, removed = victims.len(), "cleaned tile cache by settings");
        victims.len()
    }

    /// Current memory use in bytes
    pub fn current_bytes(&self) -> usize {
        *self.current_bytes.lock()
    }

    /// Number of cached tiles
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) counters for status reporting
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
