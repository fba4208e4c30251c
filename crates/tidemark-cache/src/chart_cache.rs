//! The chart cache
//!
//! Keeps fully parsed charts under a memory budget. The cache is
//! generic over the chart value so the render layer can store charts
//! together with their prepared render data without this crate knowing
//! about rendering.
//!
//! Guarantees:
//!
//! - at most one value per key, and at most one build in flight per key
//!   (other callers wait on the build or get [`OpenOutcome::Pending`]);
//! - the reported size never exceeds the budget after an insert
//!   completes; least-recently-used entries are evicted first;
//! - entries still referenced outside the cache are never evicted;
//! - failures are remembered with a back-off TTL and retried afterwards.

use crate::error::{CacheError, CacheResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Values storable in the chart cache
pub trait CacheValue: Send + Sync + 'static {
    /// Memory use in whole kilobytes (at least 1)
    fn size_kb(&self) -> usize;
}

/// Outcome of a non-blocking open
pub enum OpenOutcome<C> {
    /// The chart is ready
    Ready(Arc<C>),
    /// A load is in flight; retry later
    Pending,
}

/// Chart cache configuration
#[derive(Debug, Clone)]
pub struct ChartCacheConfig {
    /// Memory budget in kilobytes
    pub max_size_kb: usize,
    /// Back-off before a failed key is retried
    pub error_ttl: Duration,
}

impl Default for ChartCacheConfig {
    fn default() -> Self {
        ChartCacheConfig {
            max_size_kb: 512 * 1024,
            error_ttl: Duration::from_secs(30),
        }
    }
}

type LoadSlot<C> = watch::Receiver<Option<Result<Arc<C>, CacheError>>>;

enum Entry<C> {
    Ready {
        value: Arc<C>,
        size_kb: usize,
        last_use: Instant,
    },
    Loading {
        slot: LoadSlot<C>,
    },
    Failed {
        error: CacheError,
        at: Instant,
    },
}

struct Inner<C> {
    entries: HashMap<String, Entry<C>>,
    current_kb: usize,
}

/// The chart cache; see the module docs for the guarantees.
pub struct ChartCache<C: CacheValue> {
    config: ChartCacheConfig,
    inner: Mutex<Inner<C>>,
}

impl<C: CacheValue> ChartCache<C> {
    /// Create with the given configuration
    pub fn new(config: ChartCacheConfig) -> Self {
        ChartCache {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                current_kb: 0,
            }),
        }
    }

    /// The cache key for a chart
    pub fn key(set_key: &str, chart_name: &str) -> String {
        format!("{}:{}", set_key, chart_name)
    }

    /// Current size in kilobytes
    pub fn current_size_kb(&self) -> usize {
        self.inner.lock().current_kb
    }

    /// The configured budget in kilobytes
    pub fn max_size_kb(&self) -> usize {
        self.config.max_size_kb
    }

    /// Number of ready entries
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| matches!(e, Entry::Ready { .. }))
            .count()
    }

    /// Whether the cache holds no ready entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a chart through the cache.
    ///
    /// On a miss the first caller runs `load`; concurrent callers for
    /// the same key wait on that build (`wait = true`) or get
    /// [`OpenOutcome::Pending`] (`wait = false`, the load continues in
    /// the background).
    pub async fn open<F, Fut>(
        self: &Arc<Self>,
        key: &str,
        wait: bool,
        load: F,
    ) -> CacheResult<OpenOutcome<C>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<C>> + Send + 'static,
    {
        // fast path and single-flight arbitration under the lock
        let (slot, tx) = {
            let mut inner = self.inner.lock();
            match inner.entries.get_mut(key) {
                Some(Entry::Ready { value, last_use, .. }) => {
                    *last_use = Instant::now();
                    return Ok(OpenOutcome::Ready(value.clone()));
                }
                Some(Entry::Loading { slot }) => (Some(slot.clone()), None),
                Some(Entry::Failed { error, at }) => {
                    if at.elapsed() < self.config.error_ttl {
                        return Err(error.clone());
                    }
                    // back-off expired, retry below
                    let (tx, rx) = watch::channel(None);
                    inner
                        .entries
                        .insert(key.to_string(), Entry::Loading { slot: rx });
                    (None, Some(tx))
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    inner
                        .entries
                        .insert(key.to_string(), Entry::Loading { slot: rx });
                    (None, Some(tx))
                }
            }
        };

        if let Some(mut slot) = slot {
            // someone else is loading
            if !wait {
                return Ok(OpenOutcome::Pending);
            }
            loop {
                if let Some(result) = slot.borrow().clone() {
                    return result.map(OpenOutcome::Ready);
                }
                if slot.changed().await.is_err() {
                    return Err(CacheError::Interrupted);
                }
            }
        }

        // we own the load
        let tx = tx.expect("load slot owner without sender");
        if wait {
            let result = self.run_load(key, load()).await;
            let _ = tx.send(Some(result.clone()));
            result.map(OpenOutcome::Ready)
        } else {
            let key = key.to_string();
            let fut = load();
            let this = self.clone();
            tokio::spawn(async move {
                let result = this.run_load(&key, fut).await;
                let _ = tx.send(Some(result));
            });
            Ok(OpenOutcome::Pending)
        }
    }

    async fn run_load(
        &self,
        key: &str,
        fut: impl Future<Output = CacheResult<C>>,
    ) -> Result<Arc<C>, CacheError> {
        match fut.await {
            Ok(value) => {
                let size_kb = value.size_kb();
                if size_kb > self.config.max_size_kb {
                    error!(key, size_kb, "chart exceeds the whole cache budget");
                    let err = CacheError::OutOfBudget(key.to_string());
                    self.store_failure(key, err.clone());
                    return Err(err);
                }
                let value = Arc::new(value);
                self.store_ready(key, value.clone(), size_kb);
                Ok(value)
            }
            Err(e) => {
                warn!(key, error = %e, "chart load failed");
                self.store_failure(key, e.clone());
                Err(e)
            }
        }
    }

    fn store_ready(&self, key: &str, value: Arc<C>, size_kb: usize) {
        let mut inner = self.inner.lock();
        inner.entries.insert(
            key.to_string(),
            Entry::Ready {
                value,
                size_kb,
                last_use: Instant::now(),
            },
        );
        inner.current_kb += size_kb;
        Self::evict_to(&mut inner, self.config.max_size_kb);
        debug!(key, size_kb, current_kb = inner.current_kb, "chart cached");
    }

    fn store_failure(&self, key: &str, error: CacheError) {
        let mut inner = self.inner.lock();
        inner.entries.insert(
            key.to_string(),
            Entry::Failed {
                error,
                at: Instant::now(),
            },
        );
    }

    /// Evict least-recently-used unreferenced entries until `budget_kb`
    /// holds. Entries in use stay; the bound is re-established as soon
    /// as they are released and the next insert or trim runs.
    fn evict_to(inner: &mut Inner<C>, budget_kb: usize) {
        while inner.current_kb > budget_kb {
            let victim = inner
                .entries
                .iter()
                .filter_map(|(k, e)| match e {
                    Entry::Ready {
                        value, last_use, ..
                    } if Arc::strong_count(value) == 1 => Some((k.clone(), *last_use)),
                    _ => None,
                })
                .min_by_key(|(_, last_use)| *last_use);
            let Some((key, _)) = victim else {
                // everything left is in use
                break;
            };
            if let Some(Entry::Ready { size_kb, .. }) = inner.entries.remove(&key) {
                inner.current_kb -= size_kb;
                debug!(key, size_kb, "evicted chart");
            }
        }
    }

    /// Close one chart; in-use entries are not removed
    pub fn close(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removable = match inner.entries.get(key) {
            Some(Entry::Ready { value, .. }) => Arc::strong_count(value) == 1,
            Some(Entry::Failed { .. }) => true,
            _ => false,
        };
        if removable {
            if let Some(Entry::Ready { size_kb, .. }) = inner.entries.remove(key) {
                inner.current_kb -= size_kb;
            } else {
                inner.entries.remove(key);
            }
            info!(key, "closed chart");
            return true;
        }
        false
    }

    /// Remove all entries of one set
    pub fn close_set(&self, set_key: &str) -> usize {
        let prefix = format!("{}:", set_key);
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        let mut removed = 0;
        for key in keys {
            let removable = match inner.entries.get(&key) {
                Some(Entry::Ready { value, .. }) => Arc::strong_count(value) == 1,
                Some(Entry::Failed { .. }) => true,
                _ => false,
            };
            if removable {
                if let Some(Entry::Ready { size_kb, .. }) = inner.entries.remove(&key) {
                    inner.current_kb -= size_kb;
                } else {
                    inner.entries.remove(&key);
                }
                removed += 1;
            }
        }
        removed
    }

    /// Drop unreferenced entries idle for longer than `max_idle`;
    /// called by the housekeeper.
    pub fn trim_idle(&self, max_idle: Duration) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let victims: Vec<String> = inner
            .entries
            .iter()
            .filter_map(|(k, e)| match e {
                Entry::Ready {
                    value, last_use, ..
                } if Arc::strong_count(value) == 1
                    && now.duration_since(*last_use) > max_idle =>
                {
                    Some(k.clone())
                }
                Entry::Failed { at, .. } if now.duration_since(*at) > max_idle => Some(k.clone()),
                _ => None,
            })
            .collect();
        let mut removed = 0;
        for key in victims {
            if let Some(Entry::Ready { size_kb, .. }) = inner.entries.remove(&key) {
                inner.current_kb -= size_kb;
            } else {
                inner.entries.remove(&key);
            }
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, current_kb = inner.current_kb, "trimmed idle charts");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeChart {
        kb: usize,
    }

    impl CacheValue for FakeChart {
        fn size_kb(&self) -> usize {
            self.kb
        }
    }

    fn cache(max_kb: usize) -> Arc<ChartCache<FakeChart>> {
        Arc::new(ChartCache::new(ChartCacheConfig {
            max_size_kb: max_kb,
            error_ttl: Duration::from_millis(50),
        }))
    }

    #[tokio::test]
    async fn test_open_and_hit() {
        let cache = cache(100);
        let loads = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let loads = loads.clone();
            let rt = cache
                .open("s:a", true, move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(FakeChart { kb: 10 })
                })
                .await
                .unwrap();
            assert!(matches!(rt, OpenOutcome::Ready(_)));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.current_size_kb(), 10);
    }

    #[tokio::test]
    async fn test_single_flight_concurrent() {
        let cache = cache(100);
        let loads = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .open("s:a", true, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(FakeChart { kb: 1 })
                    })
                    .await
            }));
        }
        for h in handles {
            assert!(matches!(h.await.unwrap().unwrap(), OpenOutcome::Ready(_)));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_eviction_lru() {
        let cache = cache(30);
        for (i, key) in ["s:a", "s:b", "s:c"].iter().enumerate() {
            let rt = cache
                .open(key, true, move || async move { Ok(FakeChart { kb: 10 }) })
                .await
                .unwrap();
            drop(rt);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = i;
        }
        assert_eq!(cache.current_size_kb(), 30);
        // touch a so b becomes the LRU victim
        let a = cache
            .open("s:a", true, || async { Ok(FakeChart { kb: 10 }) })
            .await
            .unwrap();
        let _d = cache
            .open("s:d", true, || async { Ok(FakeChart { kb: 10 }) })
            .await
            .unwrap();
        assert!(cache.current_size_kb() <= 30);
        drop(a);
        // b was evicted: loading it again calls the loader
        let loads = Arc::new(AtomicUsize::new(0));
        let l2 = loads.clone();
        let _ = cache
            .open("s:b", true, move || async move {
                l2.fetch_add(1, Ordering::SeqCst);
                Ok(FakeChart { kb: 10 })
            })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_use_not_evicted() {
        let cache = cache(20);
        let held = match cache
            .open("s:a", true, || async { Ok(FakeChart { kb: 15 }) })
            .await
            .unwrap()
        {
            OpenOutcome::Ready(c) => c,
            _ => panic!("expected ready"),
        };
        // inserting b overflows, but a is referenced
        let _ = cache
            .open("s:b", true, || async { Ok(FakeChart { kb: 15 }) })
            .await
            .unwrap();
        // a must still be a cache hit
        let again = cache
            .open("s:a", true, || async {
                panic!("a must not be reloaded");
                #[allow(unreachable_code)]
                Ok(FakeChart { kb: 15 })
            })
            .await
            .unwrap();
        assert!(matches!(again, OpenOutcome::Ready(_)));
        drop(held);
    }

    #[tokio::test]
    async fn test_failure_backoff_and_retry() {
        let cache = cache(100);
        let loads = Arc::new(AtomicUsize::new(0));
        let l = loads.clone();
        let err = cache
            .open("s:bad", true, move || async move {
                l.fetch_add(1, Ordering::SeqCst);
                Err(CacheError::DecryptError("s:bad".into()))
            })
            .await;
        assert!(err.is_err());
        // inside the back-off the error is returned without a reload
        let err2 = cache
            .open("s:bad", true, || async {
                panic!("must not reload inside backoff");
                #[allow(unreachable_code)]
                Ok(FakeChart { kb: 1 })
            })
            .await;
        assert!(err2.is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        // after the ttl the key is retried
        tokio::time::sleep(Duration::from_millis(60)).await;
        let ok = cache
            .open("s:bad", true, || async { Ok(FakeChart { kb: 1 }) })
            .await
            .unwrap();
        assert!(matches!(ok, OpenOutcome::Ready(_)));
    }

    #[tokio::test]
    async fn test_nonblocking_returns_pending() {
        let cache = cache(100);
        let rt = cache
            .open("s:slow", false, || async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(FakeChart { kb: 1 })
            })
            .await
            .unwrap();
        assert!(matches!(rt, OpenOutcome::Pending));
        tokio::time::sleep(Duration::from_millis(60)).await;
        let rt = cache
            .open("s:slow", true, || async {
                panic!("already loaded in the background");
                #[allow(unreachable_code)]
                Ok(FakeChart { kb: 1 })
            })
            .await
            .unwrap();
        assert!(matches!(rt, OpenOutcome::Ready(_)));
    }

    #[tokio::test]
    async fn test_close_and_close_set() {
        let cache = cache(100);
        for key in ["s1:a", "s1:b", "s2:c"] {
            let _ = cache
                .open(key, true, || async { Ok(FakeChart { kb: 5 }) })
                .await
                .unwrap();
        }
        assert!(cache.close("s1:a"));
        assert_eq!(cache.close_set("s1"), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size_kb(), 5);
    }

    #[tokio::test]
    async fn test_trim_idle() {
        let cache = cache(100);
        let _ = cache
            .open("s:a", true, || async { Ok(FakeChart { kb: 5 }) })
            .await
            .unwrap();
        assert_eq!(cache.trim_idle(Duration::from_secs(60)), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.trim_idle(Duration::from_millis(1)), 1);
        assert_eq!(cache.current_size_kb(), 0);
    }
}
