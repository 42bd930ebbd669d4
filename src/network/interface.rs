//! Network interface detection
//!
//! Enumerates host interfaces to auto-detect the local subnets a scan
//! should cover. Physical adapters are preferred over virtual ones.

use std::net::IpAddr;

use ipnetwork::Ipv4Network;
use pnet::datalink;

/// Largest prefix auto-detection will expand to; wider interface masks are
/// clamped to a /24 to keep scans bounded.
const AUTO_DETECT_MIN_PREFIX: u8 = 24;

fn is_virtual_adapter_name(name_lower: &str) -> bool {
    name_lower.contains("hyper-v")
        || name_lower.contains("vmware")
        || name_lower.contains("virtualbox")
        || name_lower.contains("docker")
        || name_lower.contains("vethernet")
        || name_lower.contains("wsl")
}

/// Scores an IPv4 address for interface selection priority
pub fn interface_score(ip: &std::net::Ipv4Addr) -> u32 {
    let octets = ip.octets();
    match octets[0] {
        192 if octets[1] == 168 => 100, // typical office LAN
        10 => 90,                       // routed site network
        172 if (16..=31).contains(&octets[1]) => 50, // could be virtual
        _ => 70,
    }
}

/// Auto-detect the local IPv4 subnets to supervise.
///
/// Every non-loopback interface with a usable IPv4 assignment contributes
/// one network, clamped to at most a /24, deduplicated and sorted by
/// interface priority.
pub fn detect_local_networks() -> Vec<Ipv4Network> {
    let mut candidates: Vec<(u32, Ipv4Network)> = Vec::new();

    for iface in datalink::interfaces() {
        if iface.is_loopback() {
            continue;
        }

        let name_lower = iface.name.to_lowercase();
        if is_virtual_adapter_name(&name_lower) {
            tracing::debug!("Skipping virtual adapter: {}", iface.name);
            continue;
        }

        for ip_network in &iface.ips {
            let ipv4 = match ip_network.ip() {
                IpAddr::V4(v4) => v4,
                IpAddr::V6(_) => continue,
            };
            if ipv4.is_unspecified() || ip_network.prefix() == 0 {
                continue;
            }
            // Skip link-local (169.254.x.x)
            if ipv4.octets()[0] == 169 && ipv4.octets()[1] == 254 {
                continue;
            }

            let prefix = ip_network.prefix().max(AUTO_DETECT_MIN_PREFIX);
            if let Ok(network) = Ipv4Network::new(ipv4, prefix) {
                if let Ok(aligned) = Ipv4Network::new(network.network(), prefix) {
                    candidates.push((interface_score(&ipv4), aligned));
                }
            }
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut networks: Vec<Ipv4Network> = Vec::new();
    for (_, network) in candidates {
        if !networks.contains(&network) {
            networks.push(network);
        }
    }

    if networks.is_empty() {
        tracing::warn!("No usable IPv4 interface found for auto-detection");
    }

    networks
}

/// List usable interface names in priority order, for diagnostics.
pub fn list_interfaces() -> Vec<String> {
    let mut scored: Vec<(u32, String)> = Vec::new();

    for iface in datalink::interfaces() {
        if iface.is_loopback() {
            continue;
        }
        let name_lower = iface.name.to_lowercase();
        if is_virtual_adapter_name(&name_lower) {
            continue;
        }
        for ip_network in &iface.ips {
            if let IpAddr::V4(ipv4) = ip_network.ip() {
                if ipv4.is_unspecified() || ip_network.prefix() == 0 {
                    continue;
                }
                if ipv4.octets()[0] == 169 && ipv4.octets()[1] == 254 {
                    continue;
                }
                scored.push((interface_score(&ipv4), iface.name.clone()));
            }
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut names = Vec::new();
    for (_, name) in scored {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
