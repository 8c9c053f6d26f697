//! Host identity and affinity scoring.

use std::cmp::Ordering;
use std::net::{IpAddr, ToSocketAddrs};
use tracing::debug;

/// The literal pattern that matches every host at the lowest score.
pub const DEFAULT_PATTERN: &str = "default";

/// How well a pattern matches the local host. Larger is better.
///
/// Variants are ordered from weakest to strongest; within `Address` more
/// matching leading bits win, within `DomainSuffix` more matching labels win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Affinity {
    /// The `default` pattern.
    Default,
    /// A local address lies in the pattern's network.
    Address {
        /// Prefix length of the matching network.
        bits: u8,
    },
    /// The hostname ends with the pattern at a label boundary.
    DomainSuffix {
        /// Number of labels in the pattern.
        labels: usize,
    },
    /// The pattern is the hostname.
    ExactHost,
    /// The value does not depend on the host at all.
    Unconditional,
}

impl Affinity {
    /// True for matches that only came from the `default` pattern.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Affinity::Default)
    }
}

/// Who the local host is, for affinity scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    hostname: String,
    addresses: Vec<IpAddr>,
}

impl HostIdentity {
    /// Creates an identity from a hostname and its known addresses.
    pub fn new(hostname: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            hostname: hostname.into().trim_end_matches('.').to_ascii_lowercase(),
            addresses,
        }
    }

    /// Detects the local hostname and the addresses it resolves to.
    ///
    /// Resolution failures leave the address list empty.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        let addresses = match (hostname.as_str(), 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                ips.sort();
                ips.dedup();
                ips
            }
            Err(e) => {
                debug!(%hostname, error = %e, "could not resolve local hostname");
                Vec::new()
            }
        };
        Self::new(hostname, addresses)
    }

    /// The lowercase hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Known local addresses.
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// Scores a pattern against this host; `None` if it does not match.
    ///
    /// Patterns are `default`, an address or `address/prefix` network, or a
    /// hostname / domain suffix (a leading `.` is optional).
    pub fn score(&self, pattern: &str) -> Option<Affinity> {
        let pattern = pattern.trim();
        if pattern == DEFAULT_PATTERN {
            return Some(Affinity::Default);
        }
        if let Some((network, bits)) = parse_network(pattern) {
            return self.score_network(network, bits);
        }
        self.score_name(pattern)
    }

    fn score_network(&self, network: IpAddr, bits: u8) -> Option<Affinity> {
        self.addresses
            .iter()
            .filter(|addr| leading_bits_in_common(**addr, network).is_some_and(|n| n >= bits))
            .map(|_| Affinity::Address { bits })
            .max()
    }

    fn score_name(&self, pattern: &str) -> Option<Affinity> {
        if self.hostname.is_empty() {
            return None;
        }
        let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
        if pattern == self.hostname {
            return Some(Affinity::ExactHost);
        }
        let suffix = pattern.trim_start_matches('.');
        if suffix.is_empty() {
            return None;
        }
        let boundary = format!(".{suffix}");
        if self.hostname.ends_with(&boundary) {
            return Some(Affinity::DomainSuffix {
                labels: suffix.split('.').count(),
            });
        }
        None
    }
}

/// Picks the best-scoring entry; ties keep the earliest.
pub fn best_match<'a, T>(
    candidates: impl IntoIterator<Item = (Affinity, &'a T)>,
) -> Option<(Affinity, &'a T)> {
    let mut best: Option<(Affinity, &'a T)> = None;
    for (score, item) in candidates {
        let better = match &best {
            None => true,
            Some((current, _)) => score.cmp(current) == Ordering::Greater,
        };
        if better {
            best = Some((score, item));
        }
    }
    best
}

fn parse_network(pattern: &str) -> Option<(IpAddr, u8)> {
    let (addr, bits) = match pattern.split_once('/') {
        Some((addr, bits)) => (addr, Some(bits)),
        None => (pattern, None),
    };
    let addr: IpAddr = addr.parse().ok()?;
    let max = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    let bits = match bits {
        Some(b) => b.parse::<u8>().ok().filter(|b| *b <= max)?,
        None => max,
    };
    Some((addr, bits))
}

fn leading_bits_in_common(a: IpAddr, b: IpAddr) -> Option<u8> {
    let (a, b, width) = match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => (u128::from(u32::from(a)), u128::from(u32::from(b)), 32),
        (IpAddr::V6(a), IpAddr::V6(b)) => (u128::from(a), u128::from(b), 128),
        _ => return None,
    };
    let shift = 128 - width;
    let common = ((a << shift) ^ (b << shift)).leading_zeros().min(width);
    Some(common as u8)
}
