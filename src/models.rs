//! Domain models shared across the supervision pipeline

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Closed set of device classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Router,
    Switch,
    Server,
    Workstation,
    Printer,
    Camera,
    Phone,
    Plc,
    Nas,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "router",
            DeviceType::Switch => "switch",
            DeviceType::Server => "server",
            DeviceType::Workstation => "workstation",
            DeviceType::Printer => "printer",
            DeviceType::Camera => "camera",
            DeviceType::Phone => "phone",
            DeviceType::Plc => "plc",
            DeviceType::Nas => "nas",
            DeviceType::Unknown => "unknown",
        }
    }

    pub const ALL: &'static [DeviceType] = &[
        DeviceType::Router,
        DeviceType::Switch,
        DeviceType::Server,
        DeviceType::Workstation,
        DeviceType::Printer,
        DeviceType::Camera,
        DeviceType::Phone,
        DeviceType::Plc,
        DeviceType::Nas,
        DeviceType::Unknown,
    ];
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "router" => Ok(DeviceType::Router),
            "switch" => Ok(DeviceType::Switch),
            "server" => Ok(DeviceType::Server),
            "workstation" => Ok(DeviceType::Workstation),
            "printer" => Ok(DeviceType::Printer),
            "camera" => Ok(DeviceType::Camera),
            "phone" => Ok(DeviceType::Phone),
            "plc" => Ok(DeviceType::Plc),
            "nas" => Ok(DeviceType::Nas),
            "unknown" => Ok(DeviceType::Unknown),
            _ => Err(format!("Unknown device type: {}", s)),
        }
    }
}

/// Ordinal priority, shared by alerts and recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Maintenance urgency tiers, tied to failure probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Tier boundaries: critical ≥ 0.8, high ≥ 0.6, medium ≥ 0.4, else low.
    pub fn from_failure_probability(probability: f64) -> Self {
        if probability > 0.8 {
            Urgency::Critical
        } else if probability > 0.6 {
            Urgency::High
        } else if probability > 0.4 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(format!("Unknown urgency: {}", s)),
        }
    }
}

/// Outcome of probing a single host.
///
/// An unreachable host still yields a probe record so its history stays
/// continuous; transport errors fold into `error_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostProbe {
    pub ip: Ipv4Addr,
    pub reachable: bool,
    /// Round-trip time of the first successful echo; None if unreachable
    pub response_time_ms: Option<f64>,
    /// Lost echoes over sent echoes, in [0,1]
    pub packet_loss: f64,
    /// Wall time spent probing this host, seconds
    pub scan_duration_secs: f64,
    pub error_count: u32,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub mac_vendor: Option<String>,
    pub open_ports: Vec<u16>,
    /// "port/service" pairs for recognized services
    pub services: Vec<String>,
    pub os_guess: Option<String>,
}

impl HostProbe {
    /// Canonical unreachable record, used by the probe engine's error folds.
    pub fn unreachable(ip: Ipv4Addr, error_count: u32, scan_duration_secs: f64) -> Self {
        Self {
            ip,
            reachable: false,
            response_time_ms: None,
            packet_loss: 1.0,
            scan_duration_secs,
            error_count: error_count.max(1),
            hostname: None,
            mac: None,
            mac_vendor: None,
            open_ports: Vec::new(),
            services: Vec::new(),
            os_guess: None,
        }
    }
}

/// Summary of one full scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub networks: Vec<String>,
    pub targets: usize,
    pub probed: usize,
    pub reachable: usize,
    pub duration_ms: u64,
}
