//! Scan range parsing and subnet expansion

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;

use super::interface::detect_local_networks;

/// Safety cap on hosts per network, matching a full /24
const MAX_HOSTS_PER_NETWORK: usize = 254;

/// A scan range: explicit CIDRs or interface auto-detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    Cidrs(Vec<Ipv4Network>),
    AutoDetect,
}

/// Parse configured ranges. An empty list or the `"auto"` sentinel selects
/// auto-detection.
pub fn parse_range(ranges: &[String]) -> Result<RangeSpec> {
    if ranges.is_empty() || ranges.iter().any(|r| r == "auto") {
        return Ok(RangeSpec::AutoDetect);
    }

    let mut networks = Vec::with_capacity(ranges.len());
    for raw in ranges {
        let network: Ipv4Network = raw
            .parse()
            .with_context(|| format!("Invalid network range: {}", raw))?;
        let aligned = Ipv4Network::new(network.network(), network.prefix())
            .with_context(|| format!("Invalid network range: {}", raw))?;
        if !networks.contains(&aligned) {
            networks.push(aligned);
        }
    }
    Ok(RangeSpec::Cidrs(networks))
}

/// Resolve a range spec to the concrete network list.
pub fn resolve_networks(spec: &RangeSpec) -> Vec<Ipv4Network> {
    match spec {
        RangeSpec::Cidrs(networks) => networks.clone(),
        RangeSpec::AutoDetect => detect_local_networks(),
    }
}

/// Checks if an IP address is the network or broadcast address
fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

/// Expand a network into probe targets, excluding network/broadcast
/// addresses and capping oversized subnets.
pub fn subnet_hosts(subnet: &Ipv4Network) -> Vec<Ipv4Addr> {
    let all: Vec<Ipv4Addr> = subnet
        .iter()
        .filter(|ip| !is_special_address(*ip, subnet))
        .collect();

    if all.len() > MAX_HOSTS_PER_NETWORK {
        tracing::warn!(
            "Subnet {} has {} hosts, limiting scan to {}",
            subnet,
            all.len(),
            MAX_HOSTS_PER_NETWORK
        );
        all.into_iter().take(MAX_HOSTS_PER_NETWORK).collect()
    } else {
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_explicit_cidrs() {
        let spec = parse_range(&["192.168.1.0/24".to_string(), "10.0.0.0/24".to_string()])
            .expect("valid CIDRs should parse");
        match spec {
            RangeSpec::Cidrs(networks) => {
                assert_eq!(networks.len(), 2);
                assert_eq!(networks[0].to_string(), "192.168.1.0/24");
            }
            RangeSpec::AutoDetect => panic!("expected explicit CIDRs"),
        }
    }

    #[test]
    fn test_parse_deduplicates() {
        let spec = parse_range(&["192.168.1.0/24".to_string(), "192.168.1.0/24".to_string()])
            .expect("valid CIDRs should parse");
        match spec {
            RangeSpec::Cidrs(networks) => assert_eq!(networks.len(), 1),
            RangeSpec::AutoDetect => panic!("expected explicit CIDRs"),
        }
    }

    #[test]
    fn test_parse_empty_is_auto() {
        assert_eq!(parse_range(&[]).unwrap(), RangeSpec::AutoDetect);
        assert_eq!(
            parse_range(&["auto".to_string()]).unwrap(),
            RangeSpec::AutoDetect
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_range(&["not-a-network".to_string()]).is_err());
    }

    #[test]
    fn test_subnet_hosts_excludes_network_and_broadcast() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let hosts = subnet_hosts(&subnet);
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 0)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
        assert!(hosts.contains(&Ipv4Addr::new(192, 168, 1, 1)));
        assert!(hosts.contains(&Ipv4Addr::new(192, 168, 1, 254)));
    }

    #[test]
    fn test_subnet_hosts_caps_large_networks() {
        let subnet: Ipv4Network = "10.0.0.0/16".parse().unwrap();
        let hosts = subnet_hosts(&subnet);
        assert_eq!(hosts.len(), 254);
    }
}
