//! Host probe engine
//!
//! Probes a single host: ICMP echo for reachability and latency, TCP
//! connects with banner reads for service detection, reverse DNS for the
//! hostname, and the ARP cache for MAC/vendor enrichment.
//!
//! The engine never fails its caller. Every transport error folds into an
//! unreachable probe record with a non-zero error count, so a device's
//! history stays continuous across outages.

pub mod services;

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use surge_ping::{Client, Config as PingConfig, PingIdentifier, PingSequence};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::config::{Settings, BANNER_READ_LIMIT};
use crate::models::HostProbe;
use crate::network::{arp, dns};

/// Boxed future alias for the dyn-compatible prober contract
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = HostProbe> + Send + 'a>>;

/// A single-host prober. The production engine talks to the network; tests
/// swap in scripted implementations.
pub trait Prober: Send + Sync {
    fn probe(&self, ip: Ipv4Addr) -> ProbeFuture<'_>;
}

/// Probe tuning derived from settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub icmp_timeout: Duration,
    pub icmp_attempts: u8,
    pub tcp_timeout: Duration,
    pub ports: Vec<u16>,
    pub service_probes_enabled: bool,
}

impl ProbeConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            icmp_timeout: settings.icmp_timeout(),
            icmp_attempts: settings.icmp_attempts.max(1),
            tcp_timeout: settings.tcp_timeout(),
            ports: settings.probe_ports.clone(),
            service_probes_enabled: settings.service_probes_enabled,
        }
    }
}

/// Production probe engine
pub struct ProbeEngine {
    config: ProbeConfig,
    ping_client: Option<Arc<Client>>,
}

impl ProbeEngine {
    /// Build the engine. An unavailable ICMP socket (missing capability) is
    /// not fatal; affected probes fold into unreachable records.
    pub fn new(config: ProbeConfig) -> Self {
        let ping_client = match Client::new(&PingConfig::default()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("ICMP client unavailable ({}); probes will report unreachable", e);
                None
            }
        };
        Self {
            config,
            ping_client,
        }
    }

    /// Echo the host `icmp_attempts` times. Returns (first RTT, lost count).
    async fn icmp_echo(&self, ip: Ipv4Addr) -> (Option<f64>, u32) {
        let client = match &self.ping_client {
            Some(client) => Arc::clone(client),
            None => return (None, self.config.icmp_attempts as u32),
        };

        let payload = [0u8; 56];
        let mut first_rtt: Option<f64> = None;
        let mut lost: u32 = 0;

        let mut pinger = client
            .pinger(IpAddr::V4(ip), PingIdentifier(ping_identifier()))
            .await;
        pinger.timeout(self.config.icmp_timeout);

        for attempt in 0..self.config.icmp_attempts {
            let started = Instant::now();
            match pinger.ping(PingSequence(attempt as u16), &payload).await {
                Ok((_packet, _rtt)) => {
                    if first_rtt.is_none() {
                        first_rtt = Some(started.elapsed().as_secs_f64() * 1_000.0);
                    }
                }
                Err(e) => {
                    tracing::debug!("ICMP echo {} attempt {} failed: {}", ip, attempt, e);
                    lost += 1;
                }
            }
        }

        (first_rtt, lost)
    }

    /// TCP sweep over the configured ports. Closed ports are not errors.
    async fn service_sweep(&self, ip: Ipv4Addr) -> (Vec<u16>, Vec<String>) {
        let mut open_ports = Vec::new();
        let mut service_labels = Vec::new();

        for &port in &self.config.ports {
            let addr = SocketAddr::new(IpAddr::V4(ip), port);
            let connect = tokio::time::timeout(self.config.tcp_timeout, TcpStream::connect(addr));

            let stream = match connect.await {
                Ok(Ok(stream)) => stream,
                _ => continue,
            };

            open_ports.push(port);

            let banner = if services::banner_expected(port) {
                read_banner(stream, self.config.tcp_timeout).await
            } else {
                None
            };

            service_labels.push(services::describe_service(port, banner.as_deref()));
        }

        (open_ports, service_labels)
    }
}

impl Prober for ProbeEngine {
    fn probe(&self, ip: Ipv4Addr) -> ProbeFuture<'_> {
        Box::pin(async move {
            let started = Instant::now();
            let attempts = self.config.icmp_attempts as u32;

            let (rtt, lost) = self.icmp_echo(ip).await;
            let reachable = lost < attempts;

            if !reachable {
                return HostProbe::unreachable(ip, lost, started.elapsed().as_secs_f64());
            }

            let (open_ports, service_labels) = if self.config.service_probes_enabled {
                self.service_sweep(ip).await
            } else {
                (Vec::new(), Vec::new())
            };

            let hostname = dns::reverse_lookup_with_timeout(ip).await;

            let mac = arp::lookup_mac(ip);
            let mac_vendor = mac.as_deref().and_then(arp::lookup_vendor);

            let os_guess = guess_os(hostname.as_deref(), &open_ports);

            HostProbe {
                ip,
                reachable: true,
                response_time_ms: rtt,
                packet_loss: lost as f64 / attempts as f64,
                scan_duration_secs: started.elapsed().as_secs_f64(),
                error_count: lost,
                hostname,
                mac,
                mac_vendor,
                open_ports,
                services: service_labels,
                os_guess,
            }
        })
    }
}

/// Read a greeting banner from a fresh connection, bounded in size and time.
async fn read_banner(mut stream: TcpStream, timeout: Duration) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; BANNER_READ_LIMIT];
    match tokio::time::timeout(timeout, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => {
            buffer.truncate(n);
            Some(buffer)
        }
        _ => None,
    }
}

/// OS estimate from hostname tokens and open ports.
pub fn guess_os(hostname: Option<&str>, open_ports: &[u16]) -> Option<String> {
    let hostname_lower = hostname.map(|h| h.to_lowercase()).unwrap_or_default();

    let workstation_name = ["pc-", "ws-", "desktop-", "laptop-"]
        .iter()
        .any(|token| hostname_lower.contains(token));
    if workstation_name && (open_ports.contains(&3389) || open_ports.contains(&5985)) {
        return Some("Windows".to_string());
    }

    if open_ports.contains(&22) && open_ports.contains(&80) {
        return Some("Linux".to_string());
    }

    let network_name = ["router", "switch", "gw-"]
        .iter()
        .any(|token| hostname_lower.contains(token));
    if network_name {
        return Some("Network Device".to_string());
    }

    None
}

/// Identifier for echo requests, derived from the clock; uniqueness per
/// process is enough for reply matching.
fn ping_identifier() -> u16 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    ((nanos % 0xFFFF) as u16).wrapping_add(1)
}
