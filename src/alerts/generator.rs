//! Alert rules and delivery
//!
//! Evaluation is pure: a device's previous state plus its new assessment
//! yield a list of events. Delivery applies the store's dedup invariant,
//! publishes notifications and hands high-priority alerts to SMTP.

use crate::ai::Assessment;
use crate::config::DEFAULT_ANOMALY_THRESHOLD;
use crate::models::Priority;
use crate::notify::email::EmailSender;
use crate::notify::{NotificationBus, NotificationKind};
use crate::store::{AlertKind, Database, DeviceRecord};

/// One decision out of the emission rules
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// Persist (or escalate) an alert and notify
    Raise {
        kind: AlertKind,
        priority: Priority,
        message: String,
        confidence: f64,
    },
    /// Reachability restored: resolve open offline alerts, notify success
    Recovered { message: String },
}

fn display_name(device: &DeviceRecord) -> String {
    match &device.hostname {
        Some(hostname) if !hostname.is_empty() => format!("{} ({})", hostname, device.ip),
        _ => device.ip.clone(),
    }
}

/// Apply the emission rules for one device after assessment.
///
/// `was_online` is the device's online flag before this scan; None for a
/// device first seen in this scan.
pub fn evaluate_device(
    device: &DeviceRecord,
    was_online: Option<bool>,
    now_online: bool,
    assessment: &Assessment,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    let name = display_name(device);

    // Reachability transitions first.
    if was_online == Some(true) && !now_online {
        events.push(AlertEvent::Raise {
            kind: AlertKind::Offline,
            priority: Priority::High,
            message: format!("Device {} went offline", name),
            confidence: assessment.ai_confidence,
        });
    } else if was_online == Some(false) && now_online {
        events.push(AlertEvent::Recovered {
            message: format!("Device {} is back online", name),
        });
    }

    // Assessment-derived alerts.
    let failure_probability = assessment.maintenance.failure_probability;
    if failure_probability > 0.8 {
        events.push(AlertEvent::Raise {
            kind: AlertKind::AiCritical,
            priority: Priority::Critical,
            message: format!(
                "Critical failure risk on {}: failure probability {:.0}%",
                name,
                failure_probability * 100.0
            ),
            confidence: assessment.ai_confidence,
        });
    } else if failure_probability > 0.6 {
        events.push(AlertEvent::Raise {
            kind: AlertKind::AiWarning,
            priority: Priority::Medium,
            message: format!(
                "Maintenance recommended for {}: failure probability {:.0}%",
                name,
                failure_probability * 100.0
            ),
            confidence: assessment.ai_confidence,
        });
    }

    if assessment.anomaly.is_anomaly && assessment.anomaly.score < DEFAULT_ANOMALY_THRESHOLD {
        events.push(AlertEvent::Raise {
            kind: AlertKind::Anomaly,
            priority: Priority::High,
            message: format!(
                "Abnormal behavior on {}: anomaly score {:.3}",
                name, assessment.anomaly.score
            ),
            confidence: assessment.ai_confidence,
        });
    }

    events
}

fn notification_kind(kind: AlertKind) -> NotificationKind {
    match kind {
        AlertKind::Offline | AlertKind::AiCritical => NotificationKind::Danger,
        AlertKind::AiWarning | AlertKind::Anomaly => NotificationKind::Warning,
    }
}

/// Persist, notify and (for priority ≥ medium) email the evaluated events.
///
/// Storage failures for one event are logged and skip that event; SMTP
/// failures downgrade to a warning notification. Nothing here aborts the
/// scan.
pub async fn deliver_events(
    db: &Database,
    bus: &NotificationBus,
    mailer: Option<&EmailSender>,
    device: &DeviceRecord,
    events: &[AlertEvent],
) {
    for event in events {
        match event {
            AlertEvent::Recovered { message } => {
                match db.resolve_open_alerts_of_kind(device.id, AlertKind::Offline) {
                    Ok(resolved) if resolved > 0 => {
                        tracing::info!(
                            "Resolved {} offline alert(s) for {}",
                            resolved,
                            device.ip
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(
                            "Failed to auto-resolve offline alerts for {}: {:#}",
                            device.ip,
                            e
                        );
                    }
                }
                bus.publish(
                    message.clone(),
                    NotificationKind::Success,
                    Priority::Low,
                    Some(device.ip.clone()),
                );
            }
            AlertEvent::Raise {
                kind,
                priority,
                message,
                confidence,
            } => {
                let upsert = match db.upsert_alert(device.id, *kind, message, *priority, *confidence)
                {
                    Ok(upsert) => upsert,
                    Err(e) => {
                        tracing::error!("Failed to persist {} alert for {}: {:#}", kind, device.ip, e);
                        continue;
                    }
                };

                // Suppressed duplicates stay silent.
                if !upsert.changed() {
                    continue;
                }

                bus.publish(
                    message.clone(),
                    notification_kind(*kind),
                    *priority,
                    Some(device.ip.clone()),
                );

                if *priority >= Priority::Medium {
                    if let Some(mailer) = mailer {
                        let subject = format!("{} alert - {}", kind, display_name(device));
                        if let Err(e) = mailer.send_alert(&subject, message, *priority).await {
                            tracing::debug!("Email delivery failed: {:#}", e);
                            bus.publish(
                                format!("Email delivery failed for: {}", message),
                                NotificationKind::Warning,
                                *priority,
                                Some(device.ip.clone()),
                            );
                        }
                    }
                }
            }
        }
    }
}
