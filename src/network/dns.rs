//! Reverse DNS hostname resolution

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use dns_lookup::lookup_addr;

/// Reverse lookups are synchronous, so they run on the blocking pool with
/// this timeout.
const DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Blocking reverse lookup for a single address.
///
/// Resolvers that echo the address back are treated as a miss.
pub fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let ip_addr = IpAddr::V4(ip);
    match lookup_addr(&ip_addr) {
        Ok(hostname) if hostname != ip.to_string() => Some(hostname),
        _ => None,
    }
}

/// Async wrapper with timeout; failures resolve to None.
pub async fn reverse_lookup_with_timeout(ip: Ipv4Addr) -> Option<String> {
    let lookup = tokio::time::timeout(
        DNS_TIMEOUT,
        tokio::task::spawn_blocking(move || reverse_lookup(ip)),
    )
    .await;

    match lookup {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::debug!("DNS worker join failed for {}: {}", ip, e);
            None
        }
        Err(_) => None,
    }
}
