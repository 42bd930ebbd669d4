//! Configuration for the LANWATCH supervision core
//!
//! Low-level probe tunables are compile-time constants; operator-facing
//! settings load from a JSON file with `LANWATCH_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Hard floor/ceiling for the scan tick period (seconds)
pub const MIN_SCAN_INTERVAL_SECS: u64 = 60;
pub const MAX_SCAN_INTERVAL_SECS: u64 = 86_400;

/// Default scan tick period: 30 minutes
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 1_800;

/// ICMP echo timeout per attempt
pub const DEFAULT_ICMP_TIMEOUT: Duration = Duration::from_secs(3);

/// Echo attempts per probe; packet loss is measured as lost/sent
pub const DEFAULT_ICMP_ATTEMPTS: u8 = 2;

/// TCP connect timeout per port during the service sweep
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Maximum bytes read from a service banner
pub const BANNER_READ_LIMIT: usize = 1_024;

/// Common ports probed for service detection
pub const DEFAULT_PROBE_PORTS: &[u16] = &[
    22, 23, 25, 53, 80, 110, 143, 443, 445, 993, 995, 1433, 3306, 3389, 5432, 5985, 8080, 8443,
    9100,
];

/// Maximum concurrent host probes per scan
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 50;

/// Scan-wide soft deadline: outstanding probes are cancelled past this
pub const DEFAULT_SCAN_SOFT_DEADLINE_SECS: u64 = 600;

/// Daily training tick (local hour)
pub const DEFAULT_TRAINING_HOUR: u32 = 18;

/// Daily report-trigger tick (local hour)
pub const DEFAULT_REPORT_HOUR: u32 = 8;

/// Isolation-forest decision scores below this are anomalies
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = -0.5;

/// Failure probabilities above this are high risk
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 0.6;

/// Health scores below this count as critical on the dashboard
pub const DEFAULT_CRITICAL_HEALTH_THRESHOLD: f64 = 50.0;

/// Notification ring capacity
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 50;

/// Outbound SMTP timeout
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(5);

/// SMTP configuration for outbound alert email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub to_email: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl EmailSettings {
    /// True when every field needed for an SMTP handshake is present.
    pub fn is_configured(&self) -> bool {
        self.enabled
            && !self.smtp_server.is_empty()
            && !self.username.is_empty()
            && !self.password.is_empty()
            && !self.from_email.is_empty()
            && !self.to_email.is_empty()
    }
}

/// Operator-facing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_icmp_timeout_ms")]
    pub icmp_timeout_ms: u64,
    #[serde(default = "default_icmp_attempts")]
    pub icmp_attempts: u8,
    #[serde(default = "default_tcp_timeout_ms")]
    pub tcp_timeout_ms: u64,
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
    #[serde(default = "default_true")]
    pub service_probes_enabled: bool,
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
    /// CIDR ranges to supervise; empty means auto-detect local subnets
    #[serde(default)]
    pub production_networks: Vec<String>,
    #[serde(default = "default_training_hour")]
    pub training_hour: u32,
    #[serde(default = "default_report_hour")]
    pub report_hour: u32,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: f64,
    #[serde(default = "default_critical_health_threshold")]
    pub critical_health_threshold: f64,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    #[serde(default = "default_scan_soft_deadline")]
    pub scan_soft_deadline_secs: u64,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub email: EmailSettings,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}
fn default_icmp_timeout_ms() -> u64 {
    DEFAULT_ICMP_TIMEOUT.as_millis() as u64
}
fn default_icmp_attempts() -> u8 {
    DEFAULT_ICMP_ATTEMPTS
}
fn default_tcp_timeout_ms() -> u64 {
    DEFAULT_TCP_TIMEOUT.as_millis() as u64
}
fn default_probe_ports() -> Vec<u16> {
    DEFAULT_PROBE_PORTS.to_vec()
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent_probes() -> usize {
    DEFAULT_MAX_CONCURRENT_PROBES
}
fn default_training_hour() -> u32 {
    DEFAULT_TRAINING_HOUR
}
fn default_report_hour() -> u32 {
    DEFAULT_REPORT_HOUR
}
fn default_anomaly_threshold() -> f64 {
    DEFAULT_ANOMALY_THRESHOLD
}
fn default_high_risk_threshold() -> f64 {
    DEFAULT_HIGH_RISK_THRESHOLD
}
fn default_critical_health_threshold() -> f64 {
    DEFAULT_CRITICAL_HEALTH_THRESHOLD
}
fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}
fn default_scan_soft_deadline() -> u64 {
    DEFAULT_SCAN_SOFT_DEADLINE_SECS
}
fn default_http_port() -> u16 {
    8080
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            icmp_timeout_ms: default_icmp_timeout_ms(),
            icmp_attempts: default_icmp_attempts(),
            tcp_timeout_ms: default_tcp_timeout_ms(),
            probe_ports: default_probe_ports(),
            service_probes_enabled: true,
            max_concurrent_probes: default_max_concurrent_probes(),
            production_networks: Vec::new(),
            training_hour: default_training_hour(),
            report_hour: default_report_hour(),
            anomaly_threshold: default_anomaly_threshold(),
            high_risk_threshold: default_high_risk_threshold(),
            critical_health_threshold: default_critical_health_threshold(),
            notification_capacity: default_notification_capacity(),
            scan_soft_deadline_secs: default_scan_soft_deadline(),
            http_port: default_http_port(),
            db_path: None,
            email: EmailSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read settings file {}", p.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid settings file {}", p.display()))?
            }
            _ => Settings::default(),
        };
        settings.apply_env();
        settings.clamp();
        Ok(settings)
    }

    /// Environment overrides, `LANWATCH_*` prefixed.
    fn apply_env(&mut self) {
        if let Some(v) = env_parse::<u64>("LANWATCH_SCAN_INTERVAL_SECS") {
            self.scan_interval_secs = v;
        }
        if let Some(v) = env_parse::<u64>("LANWATCH_ICMP_TIMEOUT_MS") {
            self.icmp_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("LANWATCH_TCP_TIMEOUT_MS") {
            self.tcp_timeout_ms = v;
        }
        if let Some(v) = env_parse::<usize>("LANWATCH_MAX_CONCURRENT_PROBES") {
            self.max_concurrent_probes = v;
        }
        if let Some(v) = env_parse::<u16>("LANWATCH_HTTP_PORT") {
            self.http_port = v;
        }
        if let Ok(v) = std::env::var("LANWATCH_NETWORKS") {
            let networks: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !networks.is_empty() {
                self.production_networks = networks;
            }
        }
        if let Ok(v) = std::env::var("LANWATCH_DB_PATH") {
            if !v.is_empty() {
                self.db_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = std::env::var("LANWATCH_ALERT_EMAIL") {
            if !v.is_empty() {
                self.email.to_email = v;
            }
        }
    }

    fn clamp(&mut self) {
        self.scan_interval_secs = self
            .scan_interval_secs
            .clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS);
        if self.icmp_attempts == 0 {
            self.icmp_attempts = 1;
        }
        if self.max_concurrent_probes == 0 {
            self.max_concurrent_probes = 1;
        }
        self.training_hour = self.training_hour.min(23);
        self.report_hour = self.report_hour.min(23);
        if self.notification_capacity == 0 {
            self.notification_capacity = DEFAULT_NOTIFICATION_CAPACITY;
        }
    }

    pub fn icmp_timeout(&self) -> Duration {
        Duration::from_millis(self.icmp_timeout_ms)
    }

    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    /// Per-host probe deadline: `2 × (icmp_timeout + tcp_timeout × |ports|)`.
    pub fn per_host_deadline(&self) -> Duration {
        let ports = if self.service_probes_enabled {
            self.probe_ports.len() as u32
        } else {
            0
        };
        (self.icmp_timeout() + self.tcp_timeout() * ports) * 2
    }

    pub fn scan_soft_deadline(&self) -> Duration {
        Duration::from_secs(self.scan_soft_deadline_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.scan_interval_secs, 1_800);
        assert_eq!(settings.icmp_timeout_ms, 3_000);
        assert_eq!(settings.max_concurrent_probes, 50);
        assert_eq!(settings.anomaly_threshold, -0.5);
        assert_eq!(settings.high_risk_threshold, 0.6);
        assert_eq!(settings.notification_capacity, 50);
        assert!(settings.production_networks.is_empty());
        assert!(!settings.email.is_configured());
    }

    #[test]
    fn test_scan_interval_clamped() {
        let mut settings = Settings {
            scan_interval_secs: 5,
            ..Settings::default()
        };
        settings.clamp();
        assert_eq!(settings.scan_interval_secs, MIN_SCAN_INTERVAL_SECS);

        settings.scan_interval_secs = 1_000_000;
        settings.clamp();
        assert_eq!(settings.scan_interval_secs, MAX_SCAN_INTERVAL_SECS);
    }

    #[test]
    fn test_per_host_deadline_scales_with_ports() {
        let mut settings = Settings::default();
        settings.probe_ports = vec![22, 80];
        settings.icmp_timeout_ms = 1_000;
        settings.tcp_timeout_ms = 500;
        assert_eq!(settings.per_host_deadline(), Duration::from_secs(4));

        settings.service_probes_enabled = false;
        assert_eq!(settings.per_host_deadline(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_settings_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"scan_interval_secs": 300, "http_port": 9000}"#).unwrap();
        assert_eq!(settings.scan_interval_secs, 300);
        assert_eq!(settings.http_port, 9000);
        assert_eq!(settings.icmp_attempts, DEFAULT_ICMP_ATTEMPTS);
        assert_eq!(settings.probe_ports, DEFAULT_PROBE_PORTS.to_vec());
    }
}
