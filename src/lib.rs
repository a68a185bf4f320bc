//! An in-memory, thread-safe cache mapping hostnames to IP address lists.
//!
//! Two interchangeable back-ends are available behind the [`Cache`] sum
//! type: a flat hash map keyed by the lowercased FQDN, and a
//! reversed-label trie that shares structure across common domain
//! suffixes. Both support per-entry TTL, bulk expiration driven by a
//! periodic tick, and a sorted streaming enumeration of stored FQDNs.
//!
//! Construct one with [`cache::open`]:
//!
//! ```
//! use hostcache::cache::{open, CacheType};
//! use hostcache::cx::Cx;
//! use hostcache::ip_list::IpList;
//! use std::time::Duration;
//!
//! let cache = open(CacheType::Trie, 0);
//! let cx = Cx::new();
//! cache.update(&cx, "example.com", IpList::new(vec!["192.168.1.1".parse().unwrap()]), Duration::from_secs(3600));
//! assert!(cache.exists(&cx, "example.com"));
//! ```

pub mod cache;
pub mod config;
pub mod cx;
pub mod error;
pub mod ip_list;
pub mod parts_list;

mod entry;
mod map_cache;
mod pool;
mod trie;
mod trie_cache;

pub use cache::{open, Cache, CacheType};
pub use cx::Cx;
pub use error::CacheError;
pub use ip_list::IpList;
pub use parts_list::{sort_hostnames, PartsList};
