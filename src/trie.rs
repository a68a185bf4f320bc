//! The reversed-label trie back-end. The hardest part of the system: every
//! traversal that walks more than a single root-to-leaf path (delete's
//! backtrack, expire, enumeration) uses an explicit path stack instead of
//! recursion, so cancellation can be checked per iteration and a large tree
//! never risks stack exhaustion. Plain recursion is used only where depth is
//! inherently bounded by DNS label count (`structural_eq`, `terminal_count`,
//! `Clone`) rather than by total node count.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{config::DEFAULT_TTL, cx::Cx, ip_list::IpList, parts_list::PartsList, pool::ObjectPool};

/// A node in the reversed-label trie: cached IPs plus children keyed by
/// label. The root has no label of its own; only children carry one.
#[derive(Debug, Clone)]
pub(crate) struct TrieNode {
    ips: IpList,
    best_before: Instant,
    children: HashMap<String, TrieNode>,
}

impl Default for TrieNode {
    fn default() -> Self {
        Self {
            ips: IpList::default(),
            best_before: Instant::now(),
            children: HashMap::new(),
        }
    }
}

impl TrieNode {
    /// Clears a pool-recycled node so it has no leftover identity.
    pub(crate) fn reset(&mut self) {
        self.ips = IpList::default();
        self.best_before = Instant::now();
        self.children.clear();
    }

    /// A terminal node represents a stored FQDN: non-empty cached IPs.
    pub(crate) fn is_terminal(&self) -> bool {
        !self.ips.is_empty()
    }

    fn is_live(&self) -> bool {
        self.is_terminal() && self.best_before > Instant::now()
    }

    fn node_at(&self, path: &[String]) -> Option<&TrieNode> {
        let mut node = self;
        for label in path {
            node = node.children.get(label)?;
        }
        Some(node)
    }

    fn node_at_mut(&mut self, path: &[String]) -> Option<&mut TrieNode> {
        let mut node = self;
        for label in path {
            node = node.children.get_mut(label)?;
        }
        Some(node)
    }

    /// Insert. Walks `parts` from TLD to leftmost label, allocating
    /// interior nodes from `pool` as needed, then updates the final node's
    /// cached value. Returns `false` (no-op) for an empty `parts`, or if
    /// cancelled mid-descent (any interior nodes already allocated are left
    /// in place; a later insert will simply reuse them).
    pub(crate) fn create(
        &mut self,
        cx: &Cx,
        parts: &[String],
        ips: IpList,
        ttl: Duration,
        pool: &ObjectPool<TrieNode>,
    ) -> bool {
        if parts.is_empty() {
            return false;
        }
        let mut node = self;
        for label in parts {
            if cx.is_cancelled() {
                debug!("trie insert cancelled mid-descent");
                return false;
            }
            if !node.children.contains_key(label) {
                let mut child = pool.get().unwrap_or_default();
                child.reset();
                node.children.insert(label.clone(), child);
            }
            node = node.children.get_mut(label).expect("just inserted above");
        }
        node.update_value(ips, ttl);
        true
    }

    fn update_value(&mut self, ips: IpList, ttl: Duration) {
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

    /// Lookup. An expired terminal is treated as a miss but is *not*
    /// retroactively removed; that is `expire`'s job.
    pub(crate) fn retrieve(&self, cx: &Cx, parts: &[String]) -> IpList {
        let mut node = self;
        for label in parts {
            if cx.is_cancelled() {
                return IpList::default();
            }
            match node.children.get(label) {
                Some(child) => node = child,
                None => return IpList::default(),
            }
        }
        if node.is_live() {
            node.ips.clone()
        } else {
            IpList::default()
        }
    }

    /// Delete. If the target node has children, it is demoted to interior
    /// (cached IPs cleared) rather than removed. Otherwise the empty leaf
    /// chain is walked back toward the root, removing each now-empty node
    /// until an ancestor with other children or its own cached IPs is hit.
    pub(crate) fn delete(&mut self, cx: &Cx, parts: &[String], pool: &ObjectPool<TrieNode>) -> bool {
        if parts.is_empty() || self.node_at(parts).is_none() {
            return false;
        }

        if !self.node_at(parts).expect("checked above").children.is_empty() {
            let target = self.node_at_mut(parts).expect("checked above");
            target.ips = IpList::default();
            target.best_before = Instant::now();
            return true;
        }

        for depth in (0..parts.len()).rev() {
            if cx.is_cancelled() {
                debug!("trie delete backtrack cancelled");
                return true;
            }
            let parent = self
                .node_at_mut(&parts[..depth])
                .expect("path verified before backtrack started");
            if let Some(removed) = parent.children.remove(&parts[depth]) {
                pool.put(removed);
            }
            if !parent.children.is_empty() || parent.is_terminal() {
                break;
            }
        }
        true
    }

    /// Two-pass bulk expiry. Mark pass clears expired terminals and records
    /// any that became leaves as a result; sweep pass removes those leaves
    /// from their parents. A terminal with live children is never removed,
    /// even once cleared; pruning an interior node whose children expire
    /// in the very same pass is left for the *next* `expire` call (its
    /// children are only removed on the sweep, which runs after this node
    /// was already visited in the mark pass).
    pub(crate) fn expire(&mut self, cx: &Cx, pool: &ObjectPool<TrieNode>) -> bool {
        let mut to_delete: Vec<Vec<String>> = Vec::new();
        let mut stack: Vec<Vec<String>> = vec![Vec::new()];

        while let Some(path) = stack.pop() {
            if cx.is_cancelled() {
                debug!("trie expire mark pass cancelled");
                break;
            }
            let node = self
                .node_at(&path)
                .expect("path was constructed from this trie's own children");
            let expired = node.is_terminal() && node.best_before <= Instant::now();
            if expired && !path.is_empty() && node.children.is_empty() {
                to_delete.push(path.clone());
            }
            for label in node.children.keys() {
                let mut child_path = path.clone();
                child_path.push(label.clone());
                stack.push(child_path);
            }
            if expired {
                if let Some(node) = self.node_at_mut(&path) {
                    node.ips = IpList::default();
                    node.best_before = Instant::now();
                }
            }
        }

        let removed_any = !to_delete.is_empty();
        for path in &to_delete {
            if cx.is_cancelled() {
                debug!("trie expire sweep pass cancelled");
                break;
            }
            let (parent_path, label) = path.split_at(path.len() - 1);
            if let Some(parent) = self.node_at_mut(parent_path) {
                if let Some(node) = parent.children.remove(&label[0]) {
                    pool.put(node);
                }
            }
        }
        removed_any
    }

    /// A lazy, stateful depth-first cursor over terminal FQDNs in sorted
    /// reversed-label order. Backing iterator for `store`, `String`, and the
    /// streaming `Range`.
    pub(crate) fn enumerator(&self) -> Enumerator<'_> {
        Enumerator {
            root: self,
            stack: vec![Vec::new()],
        }
    }

    pub(crate) fn store<W: std::io::Write>(&self, cx: &Cx, writer: &mut W) -> std::io::Result<()> {
        for fqdn in self.enumerator() {
            if cx.is_cancelled() {
                break;
            }
            let parts = PartsList::from_host(&fqdn).expect("enumerator only yields valid FQDNs");
            let node = self.node_at(parts.labels()).expect("FQDN came from this trie");
            for ip in node.ips.as_slice() {
                writeln!(writer, "{ip} {fqdn}")?;
            }
        }
        Ok(())
    }

    pub(crate) fn render(&self, cx: &Cx) -> String {
        let mut buf = Vec::new();
        let _ = self.store(cx, &mut buf);
        String::from_utf8(buf).unwrap_or_default()
    }

    /// Structure-only equality: matching sets of child labels at every
    /// level. Cached IPs and timestamps are ignored; this exists for
    /// testing the shape of a clone, not the semantics of cached state.
    pub(crate) fn structural_eq(&self, other: &TrieNode) -> bool {
        self.children.len() == other.children.len()
            && self.children.iter().all(|(label, child)| {
                other
                    .children
                    .get(label)
                    .is_some_and(|peer| child.structural_eq(peer))
            })
    }

    pub(crate) fn terminal_count(&self) -> usize {
        let mut count = usize::from(self.is_terminal());
        for child in self.children.values() {
            count += child.terminal_count();
        }
        count
    }
}

/// Depth-first, sorted-child cursor. Each step reconstructs the node it
/// yields from the root via `node_at`, so the cursor itself is just a stack
/// of label paths and borrows nothing mutable.
pub(crate) struct Enumerator<'a> {
    root: &'a TrieNode,
    stack: Vec<Vec<String>>,
}

impl Iterator for Enumerator<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(path) = self.stack.pop() {
            let node = self
                .root
                .node_at(&path)
                .expect("path was constructed from this trie's own children");
            let mut labels: Vec<&String> = node.children.keys().collect();
            labels.sort();
            for label in labels.into_iter().rev() {
                let mut child_path = path.clone();
                child_path.push(label.clone());
                self.stack.push(child_path);
            }
            if node.is_terminal() {
                let mut reversed = path;
                reversed.reverse();
                return Some(reversed.join("."));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn pool() -> ObjectPool<TrieNode> {
        ObjectPool::with_factory(TrieNode::default, PoolConfig::new(8))
    }

    fn parts(host: &str) -> Vec<String> {
        PartsList::from_host(host).unwrap().labels().to_vec()
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let pool = pool();
        let mut root = TrieNode::default();
        let ips = IpList::new(vec![ip("192.168.1.1")]);
        assert!(root.create(&Cx::new(), &parts("example.com"), ips.clone(), Duration::from_secs(3600), &pool));
        assert_eq!(root.retrieve(&Cx::new(), &parts("example.com")), ips);
    }

    #[test]
    fn empty_parts_is_a_no_op() {
        let pool = pool();
        let mut root = TrieNode::default();
        assert!(!root.create(&Cx::new(), &[], IpList::new(vec![ip("10.0.0.1")]), Duration::from_secs(60), &pool));
    }

    #[test]
    fn structural_sharing_across_suffixes() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        let ips = IpList::new(vec![ip("10.0.0.1")]);
        for host in ["tld", "domain.tld", "sub.domain.tld"] {
            root.create(&cx, &parts(host), ips.clone(), Duration::from_secs(3600), &pool);
        }
        assert_eq!(root.terminal_count(), 3);
        assert_eq!(
            root.enumerator().collect::<Vec<_>>(),
            vec!["tld", "domain.tld", "sub.domain.tld"]
        );

        assert!(root.delete(&cx, &parts("domain.tld"), &pool));
        assert_eq!(root.terminal_count(), 2);
        // sub.domain.tld still resolves: the interior node survives.
        assert_eq!(root.retrieve(&cx, &parts("sub.domain.tld")), ips);
        assert!(root.retrieve(&cx, &parts("domain.tld")).is_empty());
    }

    #[test]
    fn delete_prunes_empty_leaf_chain() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        root.create(&cx, &parts("a.b.c"), IpList::new(vec![ip("10.0.0.1")]), Duration::from_secs(60), &pool);
        assert!(root.delete(&cx, &parts("a.b.c"), &pool));
        assert!(root.children.is_empty(), "whole empty chain should be pruned");
    }

    #[tokio::test(start_paused = true)]
    async fn expire_honors_terminals_with_live_children() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        let ips = IpList::new(vec![ip("10.0.0.1")]);
        // "tld" is already expired, "sub.tld" is live.
        root.create(&cx, &parts("tld"), ips.clone(), Duration::from_millis(1), &pool);
        tokio::time::advance(Duration::from_millis(5)).await;
        root.create(&cx, &parts("sub.tld"), ips.clone(), Duration::from_secs(3600), &pool);

        root.expire(&cx, &pool);

        assert!(root.retrieve(&cx, &parts("tld")).is_empty());
        assert_eq!(root.retrieve(&cx, &parts("sub.tld")), ips);
    }

    #[test]
    fn enumerator_sorts_by_reversed_label_order() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        let ips = IpList::new(vec![ip("10.0.0.1")]);
        for host in ["z.a", "a.z", "a.a"] {
            root.create(&cx, &parts(host), ips.clone(), Duration::from_secs(60), &pool);
        }
        assert_eq!(root.enumerator().collect::<Vec<_>>(), vec!["a.a", "z.a", "a.z"]);
    }

    #[test]
    fn store_renders_hosts_style_lines() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        root.create(&cx, &parts("example.com"), IpList::new(vec![ip("192.168.1.1")]), Duration::from_secs(60), &pool);
        assert_eq!(root.render(&cx), "192.168.1.1 example.com\n");
    }

    #[test]
    fn clone_is_structurally_equal() {
        let pool = pool();
        let mut root = TrieNode::default();
        let cx = Cx::new();
        root.create(&cx, &parts("a.b.c"), IpList::new(vec![ip("10.0.0.1")]), Duration::from_secs(60), &pool);
        let cloned = root.clone();
        assert!(root.structural_eq(&cloned));
    }
}
