//! Hierarchical keys: the domain- or network-shaped values the referral
//! engine reduces and tests for containment (spec.md §4.4).

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 or IPv6 network, normalised so that bits beyond the prefix
/// length are zeroed (spec.md §4.4, Network form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkPrefix {
    V4 { addr: Ipv4Addr, len: u8 },
    V6 { addr: Ipv6Addr, len: u8 },
}

impl NetworkPrefix {
    pub fn len(&self) -> u8 {
        match self {
            NetworkPrefix::V4 { len, .. } => *len,
            NetworkPrefix::V6 { len, .. } => *len,
        }
    }

    fn normalize_v4(addr: Ipv4Addr, len: u8) -> Ipv4Addr {
        let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
        Ipv4Addr::from(u32::from(addr) & mask)
    }

    fn normalize_v6(addr: Ipv6Addr, len: u8) -> Ipv6Addr {
        let mask = if len == 0 { 0 } else { u128::MAX << (128 - len) };
        Ipv6Addr::from(u128::from(addr) & mask)
    }

    /// Strict-or-equal prefix containment (spec.md §4.4, Containment).
    pub fn contains(&self, other: &NetworkPrefix) -> bool {
        match (self, other) {
            (NetworkPrefix::V4 { addr: a, len: la }, NetworkPrefix::V4 { addr: b, len: lb }) => {
                la <= lb && Self::normalize_v4(*b, *la) == *a
            }
            (NetworkPrefix::V6 { addr: a, len: la }, NetworkPrefix::V6 { addr: b, len: lb }) => {
                la <= lb && Self::normalize_v6(*b, *la) == *a
            }
            _ => false,
        }
    }

    /// Reduces the key by one bit, widening the matched network (spec.md
    /// §4.4, step 1). Returns `None` once the prefix length has reached 0.
    pub fn reduce(&self) -> Option<NetworkPrefix> {
        match self {
            NetworkPrefix::V4 { addr, len } if *len > 0 => {
                Some(NetworkPrefix::V4 { addr: Self::normalize_v4(*addr, len - 1), len: len - 1 })
            }
            NetworkPrefix::V6 { addr, len } if *len > 0 => {
                Some(NetworkPrefix::V6 { addr: Self::normalize_v6(*addr, len - 1), len: len - 1 })
            }
            _ => None,
        }
    }
}

impl FromStr for NetworkPrefix {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, len_part) = match s.split_once('/') {
            Some((a, l)) => (a, Some(l)),
            None => (s, None),
        };

        if let Ok(addr) = addr_part.parse::<Ipv4Addr>() {
            let len = match len_part {
                Some(l) => l.parse::<u8>().map_err(|_| ())?,
                None => 32,
            };
            if len > 32 {
                return Err(());
            }
            return Ok(NetworkPrefix::V4 { addr: Self::normalize_v4(addr, len), len });
        }

        if let Ok(addr) = addr_part.parse::<Ipv6Addr>() {
            let len = match len_part {
                Some(l) => l.parse::<u8>().map_err(|_| ())?,
                None => 128,
            };
            if len > 128 {
                return Err(());
            }
            return Ok(NetworkPrefix::V6 { addr: Self::normalize_v6(addr, len), len });
        }

        Err(())
    }
}

impl std::fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkPrefix::V4 { addr, len } => write!(f, "{addr}/{len}"),
            NetworkPrefix::V6 { addr, len } => write!(f, "{addr}/{len}"),
        }
    }
}

/// A reversed-label domain key, compared lowercase (spec.md §4.4, Domain
/// form).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainKey {
    /// Labels in top-to-bottom order, e.g. `["com", "example", "sub"]` for
    /// `sub.example.com`.
    labels: Vec<String>,
}

impl DomainKey {
    /// Parses a domain-form value, stripping the user portion of an
    /// email-style value if present (spec.md §4.4).
    pub fn parse(value: &str) -> Self {
        let domain = value.rsplit_once('@').map(|(_, d)| d).unwrap_or(value);
        let trimmed = domain.strip_suffix('.').unwrap_or(domain);
        let mut labels: Vec<String> =
            trimmed.split('.').map(|label| label.to_ascii_lowercase()).collect();
        labels.reverse();
        DomainKey { labels }
    }

    /// Strict-or-equal suffix containment, walked from the top label down.
    pub fn contains(&self, other: &DomainKey) -> bool {
        self.labels.len() <= other.labels.len()
            && self.labels.iter().zip(other.labels.iter()).all(|(a, b)| a == b)
    }

    /// Drops the most specific label, widening the key (spec.md §4.4, step
    /// 1). Returns `None` once no labels remain.
    pub fn reduce(&self) -> Option<DomainKey> {
        if self.labels.is_empty() {
            return None;
        }
        let mut labels = self.labels.clone();
        labels.pop();
        Some(DomainKey { labels })
    }
}

impl std::fmt::Display for DomainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<&str> = self.labels.iter().rev().map(String::as_str).collect();
        write!(f, "{}", joined.join("."))
    }
}

/// Either shape of hierarchical key a query term can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierKey {
    Network(NetworkPrefix),
    Domain(DomainKey),
}

impl HierKey {
    /// Parses `value` as a network if it contains a `/`, else as a domain.
    pub fn parse(value: &str) -> HierKey {
        if value.contains('/') {
            if let Ok(net) = value.parse::<NetworkPrefix>() {
                return HierKey::Network(net);
            }
        }
        HierKey::Domain(DomainKey::parse(value))
    }

    pub fn contains(&self, other: &HierKey) -> bool {
        match (self, other) {
            (HierKey::Network(a), HierKey::Network(b)) => a.contains(b),
            (HierKey::Domain(a), HierKey::Domain(b)) => a.contains(b),
            _ => false,
        }
    }

    pub fn reduce(&self) -> Option<HierKey> {
        match self {
            HierKey::Network(n) => n.reduce().map(HierKey::Network),
            HierKey::Domain(d) => d.reduce().map(HierKey::Domain),
        }
    }
}

impl std::fmt::Display for HierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HierKey::Network(n) => write!(f, "{n}"),
            HierKey::Domain(d) => write!(f, "{d}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_containment_is_suffix_based() {
        let biz = HierKey::parse("biz.");
        let sub_biz = HierKey::parse("sub.biz.");
        assert!(biz.contains(&sub_biz));
        assert!(!sub_biz.contains(&biz));
    }

    #[test]
    fn domain_strips_email_user_part() {
        let key = DomainKey::parse("jdoe@example.com");
        assert_eq!(key.to_string(), "example.com");
    }

    #[test]
    fn network_containment_respects_prefix_length() {
        let a: NetworkPrefix = "10.0.0.0/8".parse().unwrap();
        let b: NetworkPrefix = "10.1.2.0/24".parse().unwrap();
        assert!(a.contains(&b));
        assert!(!b.contains(&a));
    }

    #[test]
    fn network_reduce_widens_by_one_bit() {
        let net: NetworkPrefix = "10.1.2.0/24".parse().unwrap();
        let reduced = net.reduce().unwrap();
        assert_eq!(reduced.to_string(), "10.1.2.0/23");
    }

    #[test]
    fn unspecified_length_is_maximum() {
        let net: NetworkPrefix = "10.1.2.3".parse().unwrap();
        assert_eq!(net.len(), 32);
    }
}
