//! Feature extraction
//!
//! Converts a device's observation window and identity attributes into the
//! fixed-length vectors the sub-models consume.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::store::ObservationRecord;

/// Window for classification and anomaly detection
pub const CLASSIFY_ANOMALY_WINDOW: usize = 100;

/// Window for maintenance prediction
pub const MAINTENANCE_WINDOW: usize = 30;

/// Observations considered when labeling a training window as failing
pub const FAILURE_LABEL_WINDOW: usize = 7;

/// Raw per-observation vector for the anomaly detector:
/// [response_time, packet_loss, is_online, scan_duration, error_count]
pub const OBSERVATION_FEATURES: usize = 5;

/// Derived per-window vector length for the maintenance models
pub const MAINTENANCE_FEATURES: usize = 7;

/// Static classification vector length (hostname + vendor + octets)
pub const STATIC_FEATURES: usize = 18;

pub fn observation_vector(observation: &ObservationRecord) -> Vec<f64> {
    vec![
        observation.response_time.unwrap_or(0.0),
        observation.packet_loss,
        if observation.is_online { 1.0 } else { 0.0 },
        observation.scan_duration,
        observation.error_count as f64,
    ]
}

/// Per-observation vectors over the anomaly window, oldest first.
pub fn anomaly_vectors(history: &[ObservationRecord]) -> Vec<Vec<f64>> {
    // History arrives newest-first from the store.
    history
        .iter()
        .take(CLASSIFY_ANOMALY_WINDOW)
        .rev()
        .map(observation_vector)
        .collect()
}

/// Derived statistics over a device's recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    /// Fraction of observations with the device reachable
    pub uptime_ratio: f64,
    /// Mean response time over reachable observations, 0 if none
    pub avg_response_ms: f64,
    /// Max response time over reachable observations, 0 if none
    pub max_response_ms: f64,
    /// Fraction of observations with a non-zero error count
    pub error_ratio: f64,
    /// Longest unreachable run inside the window
    pub max_consecutive_errors: u32,
    /// Observations actually used
    pub window_size: usize,
    /// Total observations ever recorded for the device
    pub device_age: i64,
}

impl WindowFeatures {
    /// Compute over the most recent `window` observations. None when the
    /// history is empty.
    pub fn compute(
        history: &[ObservationRecord],
        window: usize,
        device_age: i64,
    ) -> Option<Self> {
        let recent: Vec<&ObservationRecord> = history.iter().take(window).collect();
        if recent.is_empty() {
            return None;
        }

        let total = recent.len();
        let online = recent.iter().filter(|o| o.is_online).count();

        let response_times: Vec<f64> = recent
            .iter()
            .filter(|o| o.is_online)
            .filter_map(|o| o.response_time)
            .collect();
        let avg_response_ms = if response_times.is_empty() {
            0.0
        } else {
            response_times.iter().sum::<f64>() / response_times.len() as f64
        };
        let max_response_ms = response_times.iter().cloned().fold(0.0, f64::max);

        let errors = recent.iter().filter(|o| o.error_count > 0).count();

        // Longest unreachable run, scanned oldest → newest.
        let mut run: u32 = 0;
        let mut max_run: u32 = 0;
        for observation in recent.iter().rev() {
            if observation.is_online {
                run = 0;
            } else {
                run += 1;
                max_run = max_run.max(run);
            }
        }

        Some(Self {
            uptime_ratio: online as f64 / total as f64,
            avg_response_ms,
            max_response_ms,
            error_ratio: errors as f64 / total as f64,
            max_consecutive_errors: max_run,
            window_size: total,
            device_age,
        })
    }

    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.uptime_ratio,
            self.avg_response_ms,
            self.max_response_ms,
            self.error_ratio,
            self.max_consecutive_errors as f64,
            self.device_age as f64,
            self.window_size as f64,
        ]
    }
}

/// Training label: did the device fail in its most recent observations?
pub fn failure_label(history: &[ObservationRecord]) -> f64 {
    let failed = history
        .iter()
        .take(FAILURE_LABEL_WINDOW)
        .any(|o| !o.is_online);
    if failed {
        1.0
    } else {
        0.0
    }
}

const HOSTNAME_KEYWORD_GROUPS: [&[&str]; 6] = [
    &["server", "srv", "dc"],
    &["router", "gateway", "firewall"],
    &["printer", "print", "hp"],
    &["pc", "workstation", "desktop"],
    &["plc", "automation", "control"],
    &["camera", "ipcam", "surveillance"],
];

const VENDOR_KEYWORD_GROUPS: [&[&str]; 3] = [
    &["cisco", "juniper", "hp", "dell"],
    &["microsoft", "apple", "samsung"],
    &["schneider", "siemens", "rockwell"],
];

/// Static classification features: hostname shape and keyword indicators,
/// vendor keyword indicators, and the four address octets.
pub fn static_features(hostname: &str, mac_vendor: &str, ip: Ipv4Addr) -> Vec<f64> {
    let hostname_lower = hostname.to_lowercase();
    let vendor_lower = mac_vendor.to_lowercase();

    let mut features = Vec::with_capacity(STATIC_FEATURES);

    features.push(hostname.len() as f64);
    features.push(hostname.matches('-').count() as f64);
    features.push(hostname.matches('_').count() as f64);
    features.push(hostname.matches('.').count() as f64);
    for group in HOSTNAME_KEYWORD_GROUPS {
        let hit = group.iter().any(|token| hostname_lower.contains(token));
        features.push(if hit { 1.0 } else { 0.0 });
    }

    features.push(mac_vendor.len() as f64);
    for group in VENDOR_KEYWORD_GROUPS {
        let hit = group.iter().any(|token| vendor_lower.contains(token));
        features.push(if hit { 1.0 } else { 0.0 });
    }

    for octet in ip.octets() {
        features.push(octet as f64);
    }

    features
}
