//! Network whitelists.
//!
//! Wraps a list of CIDR ranges (bare addresses count as host-length
//! prefixes) with containment and subset checks. The global whitelist may
//! additionally require every range to be private.

use std::net::IpAddr;

use ipnet::IpNet;

/// A list of allowed networks.
#[derive(Debug, Clone)]
pub struct NetworkWhitelist {
    networks: Vec<IpNet>,
}

impl NetworkWhitelist {
    /// Parse whitelist entries. With `private_only`, every entry must be a
    /// private, loopback, or link-local range.
    pub fn parse(entries: &[String], private_only: bool) -> Result<Self, String> {
        let mut networks = Vec::with_capacity(entries.len());
        for entry in entries {
            let network = parse_network(entry)?;
            if private_only && !is_private(&network) {
                return Err(format!(
                    "private_only enabled, but network {entry} is not private"
                ));
            }
            networks.push(network);
        }
        Ok(Self { networks })
    }

    /// Whether the whitelist contains the given address.
    pub fn contains(&self, address: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(&address))
    }

    /// Whether every network in this whitelist is covered by `other`.
    pub fn is_subset_of(&self, other: &NetworkWhitelist) -> bool {
        self.networks.iter().all(|network| {
            other
                .networks
                .iter()
                .any(|covering| covering.contains(network))
        })
    }
}

fn parse_network(entry: &str) -> Result<IpNet, String> {
    if let Ok(network) = entry.parse::<IpNet>() {
        return Ok(network);
    }
    entry
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| format!("invalid network or address: {entry}"))
}

fn is_private(network: &IpNet) -> bool {
    match network.addr() {
        IpAddr::V4(addr) => addr.is_private() || addr.is_loopback() || addr.is_link_local(),
        IpAddr::V6(addr) => {
            // Unique-local (fc00::/7), link-local (fe80::/10), or loopback.
            addr.is_loopback()
                || (addr.segments()[0] & 0xfe00) == 0xfc00
                || (addr.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(entries: &[&str]) -> NetworkWhitelist {
        let entries: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        NetworkWhitelist::parse(&entries, false).unwrap()
    }

    #[test]
    fn test_host_prefix_matches_single_address() {
        let list = whitelist(&["127.0.0.1/32"]);
        assert!(list.contains("127.0.0.1".parse().unwrap()));
        assert!(!list.contains("127.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_bare_address_counts_as_host() {
        let list = whitelist(&["192.168.1.34"]);
        assert!(list.contains("192.168.1.34".parse().unwrap()));
        assert!(!list.contains("192.168.1.35".parse().unwrap()));
    }

    #[test]
    fn test_cidr_containment() {
        let list = whitelist(&["192.168.0.0/16"]);
        assert!(list.contains("192.168.1.2".parse().unwrap()));
        assert!(!list.contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_subset() {
        let global = whitelist(&["192.168.0.0/16", "127.0.0.1/32"]);
        let inside = whitelist(&["192.168.1.0/24"]);
        let outside = whitelist(&["10.0.0.0/8"]);
        assert!(inside.is_subset_of(&global));
        assert!(!outside.is_subset_of(&global));
    }

    #[test]
    fn test_private_only() {
        let entries = vec!["8.8.8.8/32".to_string()];
        assert!(NetworkWhitelist::parse(&entries, true).is_err());
        let entries = vec!["10.1.0.0/16".to_string(), "127.0.0.1".to_string()];
        assert!(NetworkWhitelist::parse(&entries, true).is_ok());
    }

    #[test]
    fn test_ipv6() {
        let list = whitelist(&["::1/128"]);
        assert!(list.contains("::1".parse().unwrap()));
        assert!(!list.contains("::2".parse().unwrap()));
    }
}
