use std::fmt;

/// The reversed-label path of an FQDN: the TLD is element `0`, the leftmost
/// label is last. `PartsList`'s derived `Ord` is exactly the comparator
/// `sort_hostnames` needs: lexicographic over labels, with a shorter
/// (prefix) path sorting before a longer one that extends it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PartsList(Vec<String>);

impl PartsList {
    /// Trims whitespace, lowercases, splits on `.`, then reverses.
    /// Returns `None` for an empty-after-trim hostname (caller's no-op case).
    pub fn from_host(host: &str) -> Option<Self> {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut labels: Vec<String> = trimmed.to_lowercase().split('.').map(str::to_owned).collect();
        labels.reverse();
        Some(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Reconstructs the original (lowercased, trimmed) FQDN.
    pub fn to_fqdn(&self) -> String {
        let mut labels = self.0.clone();
        labels.reverse();
        labels.join(".")
    }
}

impl fmt::Display for PartsList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fqdn())
    }
}

/// Orders FQDNs by comparing their reversed-label sequences lexicographically.
/// Invalid (empty-after-trim) hostnames are silently dropped, matching the
/// cache's own no-op policy for blank hostnames.
pub fn sort_hostnames(hosts: &[String]) -> Vec<String> {
    let mut keyed: Vec<(PartsList, &str)> = hosts
        .iter()
        .filter_map(|h| PartsList::from_host(h).map(|parts| (parts, h.as_str())))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, h)| h.to_owned()).collect()
}
