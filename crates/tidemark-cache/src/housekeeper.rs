//! Background trimming of idle chart cache entries

use crate::chart_cache::{CacheValue, ChartCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runs [`ChartCache::trim_idle`] on a fixed cadence.
///
/// A single housekeeper per cache; dropping the handle stops the task.
pub struct HouseKeeper {
    handle: JoinHandle<()>,
}

impl HouseKeeper {
    /// Start trimming `cache` every `interval`, dropping entries idle
    /// longer than `max_idle`.
    pub fn start<C: CacheValue>(
        cache: Arc<ChartCache<C>>,
        interval: Duration,
        max_idle: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            info!(?interval, ?max_idle, "housekeeper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = cache.trim_idle(max_idle);
                if removed > 0 {
                    debug!(removed, "housekeeper trimmed idle charts");
                }
            }
        });
        HouseKeeper { handle }
    }

    /// Stop the housekeeper task
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for HouseKeeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_cache::{CacheValue, ChartCacheConfig, OpenOutcome};

    struct Small;
    impl CacheValue for Small {
        fn size_kb(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_housekeeper_trims() {
        let cache = Arc::new(ChartCache::<Small>::new(ChartCacheConfig::default()));
        let rt = cache
            .open("s:a", true, || async { Ok(Small) })
            .await
            .unwrap();
        assert!(matches!(rt, OpenOutcome::Ready(_)));
        drop(rt);
        let keeper = HouseKeeper::start(
            cache.clone(),
            Duration::from_millis(10),
            Duration::from_millis(1),
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len(), 0);
        keeper.stop();
    }
}
