use std::time::Duration;

use tokio::time::Instant;

use crate::{config::DEFAULT_TTL, ip_list::IpList};

/// Per-host cached value used by the map back-end: `(ips, best_before)`.
///
/// `create`/`update`/`delete`/`retrieve`/`is_expired` mirror the node
/// contract the trie back-end also implements, but `create` ignores its
/// `parts` argument entirely, for interface uniformity, not trie navigation.
#[derive(Debug, Clone)]
pub(crate) struct MapEntry {
    ips: IpList,
    best_before: Instant,
}

impl Default for MapEntry {
    fn default() -> Self {
        Self {
            ips: IpList::default(),
            best_before: Instant::now(),
        }
    }
}

impl MapEntry {
    /// Clears fields so a pool-recycled entry has no leftover identity.
    pub(crate) fn reset(&mut self) {
        self.ips = IpList::default();
        self.best_before = Instant::now();
    }

    /// Delegates to `update`; `parts` is ignored.
    pub(crate) fn create(&mut self, ips: IpList, ttl: Duration) {
        self.update(ips, ttl);
    }

    /// If `ips` already matches the stored value, returns unchanged
    /// (timestamp untouched). An empty `ips` tombstones the entry.
    pub(crate) fn update(&mut self, ips: IpList, ttl: Duration) {
        if ips == self.ips {
            return;
        }
        if ips.is_empty() {
            self.ips = IpList::default();
            self.best_before = Instant::now();
            return;
        }
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        self.ips = ips;
        self.best_before = Instant::now() + ttl;
    }

    pub(crate) fn delete(&mut self) {
        self.ips = IpList::default();
        self.best_before = Instant::now();
    }

    pub(crate) fn retrieve(&self) -> IpList {
        self.ips.clone()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.ips.is_empty() || self.best_before <= Instant::now()
    }

    /// Compares only `ips`; nanosecond clock skew on `best_before` must
    /// never affect equality (tests, `Clone` round-trips).
    pub(crate) fn equal(&self, other: &MapEntry) -> bool {
        self.ips == other.ips
    }
}
