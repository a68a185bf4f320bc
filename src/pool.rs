//! Bounded, recycling pool for short-lived [`crate::trie::TrieNode`] and
//! [`crate::entry::MapEntry`] values.
//!
//! Modeled on `volo-thrift`'s connection pool (`Arc<Mutex<Inner<..>>>`
//! guarding a bounded idle list), with the metrics side-channel realized as
//! a `tokio::sync::watch` (a single slot that always holds the latest
//! value and silently drops updates a lagging consumer never observed).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::trace;

use crate::config::PoolConfig;

/// A point-in-time snapshot of pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub created: u32,
    pub returned: u32,
    pub size: usize,
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A bounded, multi-producer/multi-consumer recycling pool.
///
/// `capacity` is always `4 * init_size`. [`ObjectPool::put`] probabilistically
/// refuses 1 of every 8 returns (`returned & drop_mask == drop_mask`), and the
/// `returned` counter advances on every call, including refused ones, so
/// the drop cadence is independent of how full the pool currently is.
pub struct ObjectPool<T: Send> {
    factory: Option<Factory<T>>,
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    drop_mask: u32,
    created: AtomicU32,
    returned: AtomicU32,
    metrics_tx: watch::Sender<PoolMetrics>,
}

impl<T: Send> ObjectPool<T> {
    /// Builds a pool, pre-populating `config.init_size` items when `factory`
    /// is given.
    pub fn new(factory: Option<Factory<T>>, config: PoolConfig) -> Self {
        let mut items = VecDeque::with_capacity(config.init_size.min(config.capacity()));
        if let Some(f) = &factory {
            for _ in 0..config.init_size {
                items.push_back(f());
            }
        }
        let (metrics_tx, _) = watch::channel(PoolMetrics::default());
        let pool = Self {
            factory,
            items: Mutex::new(items),
            capacity: config.capacity(),
            drop_mask: config.drop_mask,
            created: AtomicU32::new(0),
            returned: AtomicU32::new(0),
            metrics_tx,
        };
        pool.publish_metrics();
        pool
    }

    pub fn with_factory(factory: impl Fn() -> T + Send + Sync + 'static, config: PoolConfig) -> Self {
        Self::new(Some(Arc::new(factory)), config)
    }

    /// Returns a pooled item if one is idle, otherwise a freshly constructed
    /// one (bumping `created`). With no factory and an empty pool, returns
    /// `None`; the caller must handle the sentinel.
    pub fn get(&self) -> Option<T> {
        if let Some(item) = self.items.lock().unwrap().pop_front() {
            self.publish_metrics();
            return Some(item);
        }
        let fresh = self.factory.as_ref().map(|f| {
            self.created.fetch_add(1, Ordering::Relaxed);
            f()
        });
        self.publish_metrics();
        fresh
    }

    /// Attempts to return `item` to the pool. Silently drops it if this is
    /// one of every 8 returns, or if the pool is already at capacity.
    pub fn put(&self, item: T) {
        let returned = self.returned.fetch_add(1, Ordering::Relaxed) + 1;
        if returned & self.drop_mask == self.drop_mask {
            trace!(returned, "probabilistic pool drop");
            self.publish_metrics();
            return;
        }
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            drop(items);
            trace!(capacity = self.capacity, "pool at capacity, dropping item");
            self.publish_metrics();
            return;
        }
        items.push_back(item);
        drop(items);
        self.publish_metrics();
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            created: self.created.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            size: self.items.lock().unwrap().len(),
        }
    }

    /// A single-slot broadcast of the latest [`PoolMetrics`]. A lagging
    /// subscriber simply observes the most recent value on its next poll.
    pub fn metrics_channel(&self) -> watch::Receiver<PoolMetrics> {
        self.metrics_tx.subscribe()
    }

    fn publish_metrics(&self) {
        // A closed receiver set is not an error here; there may be no
        // subscribers at all.
        let _ = self.metrics_tx.send(self.metrics());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32 as Counter;

    fn counting_pool(init_size: usize) -> (ObjectPool<u32>, Arc<Counter>) {
        let counter = Arc::new(Counter::new(0));
        let c = counter.clone();
        let pool = ObjectPool::with_factory(move || c.fetch_add(1, Ordering::Relaxed), PoolConfig::new(init_size));
        (pool, counter)
    }

    #[test]
    fn zero_init_size_uses_default_and_capacity_is_4x() {
        let (pool, _) = counting_pool(0);
        assert_eq!(pool.metrics().size, 512);
        assert_eq!(pool.capacity, 2048);
    }

    #[test]
    fn get_prefers_idle_items_over_factory() {
        let (pool, counter) = counting_pool(1);
        let created_before = counter.load(Ordering::Relaxed);
        let _ = pool.get();
        assert_eq!(counter.load(Ordering::Relaxed), created_before);
    }

    #[test]
    fn get_falls_back_to_factory_when_empty() {
        let pool: ObjectPool<u32> = ObjectPool::new(None, PoolConfig::new(0));
        assert_eq!(pool.get(), None, "no factory, empty pool => sentinel None");
    }

    #[test]
    fn put_drops_one_of_every_eight_returns() {
        let pool: ObjectPool<u32> = ObjectPool::new(None, PoolConfig::new(16));
        for i in 0..8 {
            pool.put(i);
        }
        // returned counts 1..=8; only a returned-count of 7 (mod 8 == 7) is
        // dropped, so 7 of the 8 puts land in the pool.
        assert_eq!(pool.metrics().returned, 8);
        assert_eq!(pool.metrics().size, 7);
    }

    #[test]
    fn put_drops_when_at_capacity() {
        let pool: ObjectPool<u32> = ObjectPool::new(None, PoolConfig::new(1));
        assert_eq!(pool.capacity, 4);
        for i in 0..4 {
            pool.put(i);
        }
        assert_eq!(pool.metrics().size, 4);
        pool.put(99);
        assert_eq!(pool.metrics().size, 4, "pool at capacity, extra item dropped");
    }

    #[test]
    fn drop_rate_averages_one_in_eight_over_many_returns() {
        let pool: ObjectPool<u32> = ObjectPool::new(None, PoolConfig::new(1_000_000));
        for i in 0..8_000u32 {
            pool.put(i);
        }
        let metrics = pool.metrics();
        assert_eq!(metrics.returned, 8_000);
        assert_eq!(metrics.size as u32, 8_000 * 7 / 8);
    }

    #[tokio::test]
    async fn metrics_channel_reflects_latest_snapshot() {
        let (pool, _) = counting_pool(0);
        let mut rx = pool.metrics_channel();
        pool.put(1);
        rx.changed().await.unwrap();
        assert!(rx.borrow().returned >= 1);
    }
}
