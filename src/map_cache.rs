//! Hash-map back-end keyed by the lowercased, trimmed hostname.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    config::{DEFAULT_CACHE_SIZE, PoolConfig},
    cx::Cx,
    entry::MapEntry,
    ip_list::IpList,
    parts_list::sort_hostnames,
    pool::ObjectPool,
};

// Create/Update/Delete/Exists/IPs touch exactly one key, so there is no
// traversal to cancel mid-flight; `cx` is accepted (and ignored) only to
// keep this back-end's signatures identical to `TrieCache`'s under the
// `Cache` trait.

pub struct MapCache {
    map: RwLock<HashMap<String, MapEntry>>,
    pool: Arc<ObjectPool<MapEntry>>,
}

impl MapCache {
    pub fn new(size_hint: usize) -> Self {
        let size_hint = if size_hint == 0 { DEFAULT_CACHE_SIZE } else { size_hint };
        info!(size_hint, "constructing map cache back-end");
        Self {
            map: RwLock::new(HashMap::with_capacity(size_hint)),
            pool: Arc::new(ObjectPool::with_factory(MapEntry::default, PoolConfig::default())),
        }
    }

    pub fn create(&self, _cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        self.update(_cx, host, ips, ttl)
    }

    pub fn update(&self, _cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        let Some(key) = normalize(host) else { return };
        let mut map = self.map.write();
        map.entry(key).or_insert_with(|| self.pool.get().unwrap_or_default()).update(ips, ttl);
    }

    pub fn delete(&self, _cx: &Cx, host: &str) -> bool {
        let Some(key) = normalize(host) else { return false };
        let mut map = self.map.write();
        match map.remove(&key) {
            Some(mut entry) => {
                entry.delete();
                self.pool.put(entry);
                true
            }
            None => false,
        }
    }

    /// Presence check. Treats an expired-but-not-yet-reaped entry as absent,
    /// the same policy the trie back-end's `finalNode` already applies to
    /// terminals, resolving the map/trie asymmetry in favor of the
    /// stricter reading.
    pub fn exists(&self, _cx: &Cx, host: &str) -> bool {
        let Some(key) = normalize(host) else { return false };
        matches!(self.map.read().get(&key), Some(entry) if !entry.is_expired())
    }

    pub fn ips(&self, _cx: &Cx, host: &str) -> (IpList, bool) {
        let Some(key) = normalize(host) else {
            return (IpList::default(), false);
        };
        match self.map.read().get(&key) {
            Some(entry) if !entry.is_expired() => {
                let ips = entry.retrieve();
                let found = !ips.is_empty();
                (ips, found)
            }
            _ => (IpList::default(), false),
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clone_cache(&self) -> Self {
        let cloned = self.map.read().clone();
        Self {
            map: RwLock::new(cloned),
            pool: self.pool.clone(),
        }
    }

    /// `hosts(5)`-style serialized form: one `<ip> <fqdn>` line per stored
    /// IP, in `sort_hostnames` order. Matches the trie back-end's `store`
    /// so both back-ends satisfy the same round-trip property.
    pub fn store<W: std::io::Write>(&self, _cx: &Cx, writer: &mut W) -> std::io::Result<()> {
        let map = self.map.read();
        let hostnames: Vec<String> = map.keys().cloned().collect();
        for host in sort_hostnames(&hostnames) {
            if let Some(entry) = map.get(&host) {
                for ip in entry.retrieve().as_slice() {
                    writeln!(writer, "{ip} {host}")?;
                }
            }
        }
        Ok(())
    }

    pub fn render(&self, cx: &Cx) -> String {
        let mut buf = Vec::new();
        let _ = self.store(cx, &mut buf);
        String::from_utf8(buf).unwrap_or_default()
    }

    /// Snapshots hostnames under the read lock, sorts them, then streams,
    /// the "snapshot-then-release" alternative the design notes call out,
    /// chosen so the lock is never held across an `.await` point.
    pub fn range(&self, cx: Cx) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        let hostnames: Vec<String> = self.map.read().keys().cloned().collect();
        let sorted = sort_hostnames(&hostnames);
        Box::pin(async_stream::stream! {
            for fqdn in sorted {
                if cx.is_cancelled() {
                    debug!("map cache range cancelled");
                    break;
                }
                yield fqdn;
            }
        })
    }

    /// Background expiry loop: on each tick, clone the key set, then
    /// re-acquire the write lock per expired key so each deletion holds the
    /// lock for as little time as possible.
    pub async fn auto_expire(&self, rate: Duration, cx: Cx) {
        let mut ticker = tokio::time::interval(rate);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cx_cancelled(&cx) => break,
            }
            let expired: Vec<String> = self
                .map
                .read()
                .iter()
                .filter(|(_, entry)| entry.is_expired())
                .map(|(host, _)| host.clone())
                .collect();
            let mut count = 0;
            for host in expired {
                let mut map = self.map.write();
                if let Some(mut entry) = map.remove(&host) {
                    entry.delete();
                    drop(map);
                    self.pool.put(entry);
                    count += 1;
                }
            }
            if count > 0 {
                debug!(count, "map cache reaped expired entries");
            }
        }
    }
}

async fn cx_cancelled(cx: &Cx) {
    while !cx.is_cancelled() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn normalize(host: &str) -> Option<String> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
