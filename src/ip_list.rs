use std::fmt;
use std::net::IpAddr;

/// An ordered list of IP addresses (v4 or v6). Equality is element-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpList(Vec<IpAddr>);

impl IpList {
    pub fn new(ips: Vec<IpAddr>) -> Self {
        Self(ips)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[IpAddr] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<IpAddr> {
        self.0
    }
}

impl From<Vec<IpAddr>> for IpList {
    fn from(ips: Vec<IpAddr>) -> Self {
        Self(ips)
    }
}

impl FromIterator<IpAddr> for IpList {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for IpList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ip) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ip}")?;
        }
        Ok(())
    }
}
