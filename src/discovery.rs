//! Network discovery
//!
//! Expands the configured ranges (or auto-detected subnets) into probe
//! targets and drives the probe engine across them with bounded
//! parallelism. Cancellation-aware: a shutdown flag or the scan-wide soft
//! deadline stops outstanding probes; finished probes are kept.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::config::Settings;
use crate::models::HostProbe;
use crate::network::{parse_range, resolve_networks, subnet_hosts};
use crate::probe::Prober;

/// Resolve the configured ranges to concrete networks and probe targets.
pub fn enumerate_targets(settings: &Settings) -> anyhow::Result<(Vec<Ipv4Network>, Vec<Ipv4Addr>)> {
    let spec = parse_range(&settings.production_networks)?;
    let networks = resolve_networks(&spec);

    let mut targets: Vec<Ipv4Addr> = Vec::new();
    for network in &networks {
        for ip in subnet_hosts(network) {
            if !targets.contains(&ip) {
                targets.push(ip);
            }
        }
    }

    Ok((networks, targets))
}

/// Probe every target once, at most `max_concurrent` in flight.
///
/// Each probe gets a hard per-host deadline; a host that exceeds it yields
/// an unreachable record. The whole pass is bounded by `soft_deadline`;
/// probes still outstanding at that point are aborted and yield nothing.
/// Output order is unspecified.
pub async fn probe_targets(
    prober: Arc<dyn Prober>,
    targets: &[Ipv4Addr],
    max_concurrent: usize,
    per_host_deadline: Duration,
    soft_deadline: Duration,
    cancelled: Arc<AtomicBool>,
) -> Vec<HostProbe> {
    if targets.is_empty() {
        return Vec::new();
    }

    tracing::debug!(
        "Probing {} targets (max {} concurrent, per-host deadline {:?})",
        targets.len(),
        max_concurrent,
        per_host_deadline
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let results: Arc<Mutex<Vec<HostProbe>>> = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = JoinSet::new();

    for &ip in targets {
        let prober = Arc::clone(&prober);
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        let cancelled = Arc::clone(&cancelled);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!("Probe semaphore acquire failed for {}: {}", ip, e);
                    return;
                }
            };

            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let probe = match tokio::time::timeout(per_host_deadline, prober.probe(ip)).await {
                Ok(probe) => probe,
                Err(_) => {
                    tracing::debug!("Probe deadline exceeded for {}", ip);
                    HostProbe::unreachable(ip, 1, per_host_deadline.as_secs_f64())
                }
            };

            results.lock().await.push(probe);
        });
    }

    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    tracing::warn!("Probe task failed: {}", e);
                }
            }
        }
    };

    if tokio::time::timeout(soft_deadline, drain).await.is_err() {
        tracing::warn!(
            "Scan soft deadline ({:?}) reached; cancelling outstanding probes",
            soft_deadline
        );
        cancelled.store(true, Ordering::SeqCst);
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
    }

    let probes = results.lock().await;
    tracing::debug!(
        "Probe pass complete: {}/{} targets produced records",
        probes.len(),
        targets.len()
    );
    probes.clone()
}
