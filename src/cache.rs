//! The `Cache` trait unifying [`MapCache`] and [`TrieCache`], plus the
//! [`CacheType`]-selecting factory. Modeled on
//! `volo::loadbalance::LoadBalanceFactory::create`, which dispatches on a
//! strategy enum to build one of several `Box<dyn LoadBalance<D>>`
//! implementations behind a single trait object.

use std::io;
use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::Stream;

use crate::{cx::Cx, ip_list::IpList, map_cache::MapCache, trie_cache::TrieCache};

/// Selects a back-end at construction time. Any value other than `Trie`
/// maps to the map back-end only via explicit construction; `open` treats
/// an unrecognized type by defaulting to the trie back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheType {
    Map,
    #[default]
    Trie,
}

/// Common CRUD/Exists/Len/Range/AutoExpire/Clone surface shared by both
/// back-ends. A sum type over the two concrete back-ends rather than a
/// boxed trait object, since there are exactly two implementations and no
/// caller needs to supply a third.
pub enum Cache {
    Map(MapCache),
    Trie(TrieCache),
}

impl Cache {
    /// Equivalent to [`Cache::update`]; kept as a distinct method only for
    /// parity with the two-name CRUD surface the back-ends expose.
    pub fn create(&self, cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        self.update(cx, host, ips, ttl)
    }

    pub fn update(&self, cx: &Cx, host: &str, ips: IpList, ttl: Duration) {
        match self {
            Cache::Map(c) => c.update(cx, host, ips, ttl),
            Cache::Trie(c) => c.update(cx, host, ips, ttl),
        }
    }

    pub fn delete(&self, cx: &Cx, host: &str) -> bool {
        match self {
            Cache::Map(c) => c.delete(cx, host),
            Cache::Trie(c) => c.delete(cx, host),
        }
    }

    pub fn exists(&self, cx: &Cx, host: &str) -> bool {
        match self {
            Cache::Map(c) => c.exists(cx, host),
            Cache::Trie(c) => c.exists(cx, host),
        }
    }

    pub fn ips(&self, cx: &Cx, host: &str) -> (IpList, bool) {
        match self {
            Cache::Map(c) => c.ips(cx, host),
            Cache::Trie(c) => c.ips(cx, host),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Cache::Map(c) => c.len(),
            Cache::Trie(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cache::Map(c) => c.is_empty(),
            Cache::Trie(c) => c.is_empty(),
        }
    }

    pub fn clone_cache(&self) -> Cache {
        match self {
            Cache::Map(c) => Cache::Map(c.clone_cache()),
            Cache::Trie(c) => Cache::Trie(c.clone_cache()),
        }
    }

    pub fn store<W: io::Write>(&self, cx: &Cx, writer: &mut W) -> io::Result<()> {
        match self {
            Cache::Map(c) => c.store(cx, writer),
            Cache::Trie(c) => c.store(cx, writer),
        }
    }

    pub fn render(&self, cx: &Cx) -> String {
        match self {
            Cache::Map(c) => c.render(cx),
            Cache::Trie(c) => c.render(cx),
        }
    }

    /// Streams stored FQDNs in sorted reversed-label order.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// use futures::StreamExt;
    /// use hostcache::cache::{open, CacheType};
    /// use hostcache::cx::Cx;
    /// use hostcache::ip_list::IpList;
    /// use std::time::Duration;
    ///
    /// let cache = open(CacheType::Trie, 0);
    /// let cx = Cx::new();
    /// for host in ["b.example.com", "a.example.com"] {
    ///     cache.update(&cx, host, IpList::new(vec!["10.0.0.1".parse().unwrap()]), Duration::from_secs(60));
    /// }
    /// let fqdns: Vec<String> = cache.range(Cx::new()).collect().await;
    /// assert_eq!(fqdns, vec!["a.example.com", "b.example.com"]);
    /// # })
    /// ```
    pub fn range(&self, cx: Cx) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        match self {
            Cache::Map(c) => c.range(cx),
            Cache::Trie(c) => c.range(cx),
        }
    }

    /// Background expiry loop, boxed the way `volo::LoadBalance::get_picker`
    /// boxes its future rather than pulling in `async-trait`.
    pub fn auto_expire(&self, rate: Duration, cx: Cx) -> BoxFuture<'_, ()> {
        match self {
            Cache::Map(c) => Box::pin(c.auto_expire(rate, cx)),
            Cache::Trie(c) => Box::pin(c.auto_expire(rate, cx)),
        }
    }
}

/// `open(cache_type, size_hint)`. `size_hint` is honored only by the map
/// back-end; the trie back-end ignores it.
pub fn open(cache_type: CacheType, size_hint: usize) -> Cache {
    match cache_type {
        CacheType::Map => Cache::Map(MapCache::new(size_hint)),
        CacheType::Trie => Cache::Trie(TrieCache::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn open_trie_is_the_default() {
        assert_eq!(CacheType::default(), CacheType::Trie);
    }

    #[test]
    fn map_and_trie_back_ends_share_crud_semantics() {
        let cx = Cx::new();
        for cache_type in [CacheType::Map, CacheType::Trie] {
            let cache = open(cache_type, 0);
            cache.update(&cx, "Example.COM", IpList::new(vec![ip("192.168.1.1")]), Duration::from_secs(3600));
            assert_eq!(cache.ips(&cx, "example.com"), (IpList::new(vec![ip("192.168.1.1")]), true));
            assert!(cache.exists(&cx, "example.com"));
            assert_eq!(cache.len(), 1);
            assert!(cache.delete(&cx, "example.com"));
            assert!(!cache.exists(&cx, "example.com"));
        }
    }

    #[test]
    fn clone_cache_is_independent_of_the_original() {
        let cx = Cx::new();
        let cache = open(CacheType::Map, 0);
        cache.update(&cx, "example.com", IpList::new(vec![ip("10.0.0.1")]), Duration::from_secs(60));
        let cloned = cache.clone_cache();
        cache.delete(&cx, "example.com");
        assert!(!cache.exists(&cx, "example.com"));
        assert!(cloned.exists(&cx, "example.com"));
    }
}
