//! Process-local configuration cache.
//!
//! Every trade is evaluated against every active config, so hitting the
//! store per trade is prohibitive; this cache refreshes lazily on a TTL and
//! publishes the whole active set atomically via `ArcSwap`, the same
//! lock-free snapshot-swap pattern used elsewhere in this codebase for order
//! book state (`scrapers/polymarket_book_store.rs`), so readers during a
//! reload see either the old or new set, never a partial one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::clock::Clock;
use crate::domain::PositionConfig;
use crate::error::StoreResult;
use crate::persistence::PositionStore;

pub struct ConfigurationCache {
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    configs: ArcSwap<Vec<PositionConfig>>,
    last_refresh_millis: AtomicI64,
}

impl ConfigurationCache {
    pub fn new(store: Arc<dyn PositionStore>, clock: Arc<dyn Clock>, refresh_interval: Duration) -> Self {
        Self {
            store,
            clock,
            refresh_interval,
            configs: ArcSwap::from_pointee(Vec::new()),
            // Sentinel: "never refreshed" so the very first read reloads
            // regardless of clock value, including a `FixedClock` at epoch.
            last_refresh_millis: AtomicI64::new(i64::MIN),
        }
    }

    /// Active configs, refreshing first if the cache is empty or stale.
    pub async fn active_configs(&self) -> StoreResult<Arc<Vec<PositionConfig>>> {
        let now_millis = self.clock.now().timestamp_millis();
        let last = self.last_refresh_millis.load(Ordering::Acquire);
        let stale = last == i64::MIN
            || now_millis.saturating_sub(last) > self.refresh_interval.as_millis() as i64;

        if stale || self.configs.load().is_empty() {
            let fresh = self.store.find_active_configs().await?;
            self.configs.store(Arc::new(fresh));
            self.last_refresh_millis.store(now_millis, Ordering::Release);
        }

        Ok(self.configs.load_full())
    }

    /// Force a reload regardless of TTL, useful after a config CRUD write
    /// the caller knows should be visible immediately.
    pub async fn force_refresh(&self) -> StoreResult<()> {
        let fresh = self.store.find_active_configs().await?;
        self.configs.store(Arc::new(fresh));
        self.last_refresh_millis
            .store(self.clock.now().timestamp_millis(), Ordering::Release);
        Ok(())
    }
}
