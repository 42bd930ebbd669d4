//! Maintenance recommendations
//!
//! Pure derivation from the assessment outputs. Rules fire independently;
//! the list is sorted by priority and bounded.

use serde::{Deserialize, Serialize};

use crate::models::{DeviceType, Priority};

/// Upper bound on recommendations carried per device
pub const MAX_RECOMMENDATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    CriticalFailure,
    HighFailure,
    MediumFailure,
    AnomalyDetected,
    PerformanceDegradation,
    ServerMaintenance,
    PlcMaintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub priority: Priority,
    pub actions: Vec<String>,
    pub confidence: f64,
}

fn actions(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Derive the ordered recommendation list for one device.
pub fn derive_recommendations(
    failure_probability: f64,
    anomaly_score: f64,
    uptime_prediction: f64,
    device_type: DeviceType,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if failure_probability > 0.8 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::CriticalFailure,
            message: "Critical failure risk: immediate intervention required".to_string(),
            priority: Priority::Critical,
            actions: actions(&["preventive_maintenance", "full_check", "replace_if_needed"]),
            confidence: failure_probability,
        });
    } else if failure_probability > 0.6 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::HighFailure,
            message: "Elevated failure risk: preventive maintenance recommended".to_string(),
            priority: Priority::High,
            actions: actions(&["preventive_maintenance", "reinforced_monitoring"]),
            confidence: failure_probability,
        });
    } else if failure_probability > 0.4 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::MediumFailure,
            message: "Failure risk trending up: schedule a check".to_string(),
            priority: Priority::Medium,
            actions: actions(&["periodic_check", "standard_monitoring"]),
            confidence: failure_probability,
        });
    }

    if anomaly_score < -0.5 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::AnomalyDetected,
            message: "Abnormal behavior detected: investigation required".to_string(),
            priority: Priority::High,
            actions: actions(&["log_analysis", "network_check", "deep_diagnostic"]),
            confidence: anomaly_score.abs().min(1.0),
        });
    }

    if uptime_prediction < 0.7 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::PerformanceDegradation,
            message: "Availability degrading: optimization recommended".to_string(),
            priority: Priority::Medium,
            actions: actions(&["network_optimization", "firmware_update", "system_cleanup"]),
            confidence: 1.0 - uptime_prediction,
        });
    }

    if device_type == DeviceType::Server && failure_probability > 0.5 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::ServerMaintenance,
            message: "Server at risk: system check recommended".to_string(),
            priority: Priority::High,
            actions: actions(&["disk_check", "system_log_analysis", "security_update"]),
            confidence: failure_probability,
        });
    }

    if device_type == DeviceType::Plc && failure_probability > 0.4 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::PlcMaintenance,
            message: "PLC at risk: automation check recommended".to_string(),
            priority: Priority::High,
            actions: actions(&["program_check", "safety_test", "config_backup"]),
            confidence: failure_probability,
        });
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}
