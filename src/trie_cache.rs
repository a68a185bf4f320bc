//! Trie back-end: a single [`TrieNode`] root guarded by a reader/writer
//! lock, offering the same CRUD/Exists/Len/Range/AutoExpire surface as
//! [`crate::map_cache::MapCache`].

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{config::PoolConfig, cx::Cx, ip_list::IpList, parts_list::PartsList, pool::ObjectPool, trie::TrieNode};

pub struct TrieCache {
    root: RwLock<TrieNode>,
    pool: Arc<ObjectPool<TrieNode>>,
}

impl TrieCache {
    pub fn new() -> Self {
        info!("constructing trie cache back-end");
        Self {
            root: RwLock::new(TrieNode::default()),
            pool: Arc::new(ObjectPool::with_factory(TrieNode::default, PoolConfig::default())),
        }
    }

    pub fn create(&self, cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        self.update(cx, host, ips, ttl)
    }

    pub fn update(&self, cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        let Some(parts) = PartsList::from_host(host) else { return };
        self.root.write().create(cx, parts.labels(), ips, ttl, &self.pool);
    }

    pub fn delete(&self, cx: &Cx, host: &str) -> bool {
        let Some(parts) = PartsList::from_host(host) else { return false };
        self.root.write().delete(cx, parts.labels(), &self.pool)
    }

    pub fn exists(&self, cx: &Cx, host: &str) -> bool {
        !self.ips(cx, host).0.is_empty()
    }

    pub fn ips(&self, cx: &Cx, host: &str) -> (IpList, bool) {
        let Some(parts) = PartsList::from_host(host) else {
            return (IpList::default(), false);
        };
        let ips = self.root.read().retrieve(cx, parts.labels());
        let found = !ips.is_empty();
        (ips, found)
    }

    pub fn len(&self) -> usize {
        self.root.read().terminal_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clone_cache(&self) -> Self {
        Self {
            root: RwLock::new(self.root.read().clone()),
            pool: self.pool.clone(),
        }
    }

    pub fn render(&self, cx: &Cx) -> String {
        self.root.read().render(cx)
    }

    pub fn store<W: std::io::Write>(&self, cx: &Cx, writer: &mut W) -> std::io::Result<()> {
        self.root.read().store(cx, writer)
    }

    /// Clones the root under the read lock, then streams the clone, the
    /// same snapshot-then-release choice as `MapCache::range`, so no
    /// synchronous lock is ever held across an `.await`.
    pub fn range(&self, cx: Cx) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        let snapshot = self.root.read().clone();
        Box::pin(async_stream::stream! {
            for fqdn in snapshot.enumerator() {
                if cx.is_cancelled() {
                    debug!("trie cache range cancelled");
                    break;
                }
                yield fqdn;
            }
        })
    }

    pub async fn auto_expire(&self, rate: Duration, cx: Cx) {
        let mut ticker = tokio::time::interval(rate);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cx_cancelled(&cx) => break,
            }
            let removed = self.root.write().expire(&cx, &self.pool);
            if removed {
                debug!("trie cache reaped expired terminals");
            }
        }
    }
}

impl Default for TrieCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn cx_cancelled(cx: &Cx) {
    while !cx.is_cancelled() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn structural_sharing_len_and_range() {
        let cache = TrieCache::new();
        let cx = Cx::new();
        let ips = IpList::new(vec![ip("10.0.0.1")]);
        for host in ["tld", "domain.tld", "sub.domain.tld"] {
            cache.update(&cx, host, ips.clone(), Duration::from_secs(3600));
        }
        assert_eq!(cache.len(), 3);

        assert!(cache.delete(&cx, "domain.tld"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.ips(&cx, "sub.domain.tld").0, ips);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_honors_terminals_with_live_children() {
        let cache = TrieCache::new();
        let cx = Cx::new();
        let ips = IpList::new(vec![ip("10.0.0.1")]);
        cache.update(&cx, "tld", ips.clone(), Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(5)).await;
        cache.update(&cx, "sub.tld", ips.clone(), Duration::from_secs(3600));

        cache.root.write().expire(&cx, &cache.pool);

        assert!(!cache.exists(&cx, "tld"));
        assert!(cache.exists(&cx, "sub.tld"));
    }

    #[tokio::test]
    async fn range_emits_sorted_fqdns() {
        let cache = TrieCache::new();
        let cx = Cx::new();
        for host in ["z.a", "a.z", "a.a"] {
            cache.update(&cx, host, IpList::new(vec![ip("10.0.0.1")]), Duration::from_secs(60));
        }
        let emitted: Vec<String> = cache.range(Cx::new()).collect().await;
        assert_eq!(emitted, vec!["a.a", "z.a", "a.z"]);
    }

    #[test]
    fn store_round_trips_through_store_output() {
        let cache = TrieCache::new();
        let cx = Cx::new();
        cache.update(&cx, "example.com", IpList::new(vec![ip("192.168.1.1")]), Duration::from_secs(3600));
        cache.update(&cx, "sub.example.com", IpList::new(vec![ip("10.0.0.2")]), Duration::from_secs(3600));
        let rendered = cache.render(&cx);

        let reloaded = TrieCache::new();
        for line in rendered.lines() {
            let (ip_str, host) = line.split_once(' ').unwrap();
            reloaded.update(&cx, host, IpList::new(vec![ip_str.parse().unwrap()]), Duration::from_secs(3600));
        }
        assert_eq!(reloaded.render(&cx), rendered);
    }
}
