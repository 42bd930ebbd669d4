//! Database record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::recommend::Recommendation;
use crate::models::{DeviceType, Priority, Urgency};

/// Device row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: i64,
    pub ip: String,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub mac_vendor: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub device_type: DeviceType,
    pub ai_confidence: f64,
    pub health_score: f64,
    pub failure_probability: f64,
    pub anomaly_score: f64,
    pub maintenance_urgency: Urgency,
    pub ai_recommendations: Vec<Recommendation>,
    pub response_time: Option<f64>,
    pub system_info: Option<String>,
    pub open_ports: Vec<u16>,
    pub services: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One probe outcome as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: i64,
    pub device_id: i64,
    pub is_online: bool,
    pub response_time: Option<f64>,
    pub packet_loss: f64,
    pub scan_duration: f64,
    pub error_count: i64,
    pub ai_snapshot: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields for appending one observation
#[derive(Debug, Clone, Default)]
pub struct ObservationInsert {
    pub is_online: bool,
    pub response_time: Option<f64>,
    pub packet_loss: f64,
    pub scan_duration: f64,
    pub error_count: i64,
    pub ai_snapshot: Option<String>,
}

/// Alert kinds the generator emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Offline,
    AiCritical,
    AiWarning,
    Anomaly,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Offline => "offline",
            AlertKind::AiCritical => "ai_critical",
            AlertKind::AiWarning => "ai_warning",
            AlertKind::Anomaly => "anomaly",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(AlertKind::Offline),
            "ai_critical" => Ok(AlertKind::AiCritical),
            "ai_warning" => Ok(AlertKind::AiWarning),
            "anomaly" => Ok(AlertKind::Anomaly),
            _ => Err(format!("Unknown alert kind: {}", s)),
        }
    }
}

/// Alert row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub device_id: i64,
    pub alert_type: AlertKind,
    pub message: String,
    pub priority: Priority,
    pub ai_confidence: f64,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Outcome of an alert upsert under the dedup invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertUpsert {
    /// No unresolved alert of this kind existed; a new row was created
    Created(i64),
    /// Priority strictly increased; the existing row was updated in place
    Escalated(i64),
    /// An unresolved alert of equal or higher priority already exists
    Suppressed(i64),
}

impl AlertUpsert {
    pub fn is_new(&self) -> bool {
        matches!(self, AlertUpsert::Created(_))
    }

    /// True when the alert surface changed (new row or escalation)
    pub fn changed(&self) -> bool {
        !matches!(self, AlertUpsert::Suppressed(_))
    }
}

/// Fleet-wide aggregates for the statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub total_devices: i64,
    pub online_devices: i64,
    pub offline_devices: i64,
    pub uptime_percentage: f64,
}

/// Aggregates for the assessment dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub avg_health_score: f64,
    pub critical_devices: i64,
    pub high_risk_devices_count: i64,
    pub anomaly_devices_count: i64,
}
