//! Alert generation, deduplication and delivery against a real store and
//! notification ring, with assessments injected at the values a trained
//! model would produce for degraded devices.

use lanwatch::ai::{AnomalyAnalysis, Assessment, MaintenanceAnalysis};
use lanwatch::config::EmailSettings;
use lanwatch::notify::email::EmailSender;
use lanwatch::notify::{NotificationBus, NotificationKind};
use lanwatch::store::{AlertKind, AlertUpsert, Database, DeviceUpsert};
use lanwatch::{deliver_events, evaluate_device, AlertEvent, Priority, Urgency};

fn store_with_device(ip: &str, hostname: Option<&str>) -> (Database, lanwatch::DeviceRecord) {
    let db = Database::in_memory().expect("in-memory db should initialize");
    let id = db
        .upsert_device(&DeviceUpsert {
            ip,
            reachable: true,
            hostname,
            ..DeviceUpsert::default()
        })
        .unwrap();
    let device = db.get_device(id).unwrap().unwrap();
    (db, device)
}

fn assessment(failure_probability: f64, anomaly_score: f64, is_anomaly: bool) -> Assessment {
    let mut assessment = Assessment::neutral();
    assessment.maintenance = MaintenanceAnalysis {
        failure_probability,
        uptime_prediction: 0.85,
        urgency: Urgency::from_failure_probability(failure_probability),
        confidence: 0.75,
    };
    assessment.anomaly = AnomalyAnalysis {
        is_anomaly,
        score: anomaly_score,
        confidence: anomaly_score.abs().min(1.0),
        recent_anomalies: if is_anomaly { 3 } else { 0 },
    };
    assessment.ai_confidence = 0.75;
    assessment
}

/// S5 — critical failure prediction: one ai_critical alert at critical
/// priority, urgency tier critical, notification produced even though no
/// email can be delivered.
#[tokio::test]
async fn test_s5_critical_failure_prediction() {
    let (db, device) = store_with_device("192.168.1.20", Some("press-line-2"));
    let bus = NotificationBus::new(50);

    let crafted = assessment(0.85, 0.0, false);
    assert_eq!(crafted.maintenance.urgency, Urgency::Critical);

    let events = evaluate_device(&device, Some(true), true, &crafted);
    deliver_events(&db, &bus, None, &device, &events).await;

    let alerts = db.open_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertKind::AiCritical);
    assert_eq!(alerts[0].priority, Priority::Critical);

    let (notifications, _) = bus.snapshot();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Danger);
}

/// S5 (SMTP leg) — a failing SMTP endpoint downgrades to a warning
/// notification and never blocks persistence.
#[tokio::test]
async fn test_s5_smtp_failure_downgrades_to_notification() {
    let (db, device) = store_with_device("192.168.1.20", Some("press-line-2"));
    let bus = NotificationBus::new(50);

    // Nothing listens on this port; the send fails fast.
    let mailer = EmailSender::from_settings(&EmailSettings {
        enabled: true,
        smtp_server: "127.0.0.1".to_string(),
        smtp_port: 1,
        username: "supervisor".to_string(),
        password: "secret".to_string(),
        from_email: "alerts@example.com".to_string(),
        to_email: "ops@example.com".to_string(),
    })
    .expect("complete settings should build a sender");

    let events = evaluate_device(&device, Some(true), true, &assessment(0.85, 0.0, false));
    deliver_events(&db, &bus, Some(&mailer), &device, &events).await;

    // Alert persisted despite the failed send.
    assert_eq!(db.open_alerts().unwrap().len(), 1);

    let (notifications, _) = bus.snapshot();
    assert_eq!(notifications.len(), 2, "alert notification plus downgrade");
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Warning
            && n.message.contains("Email delivery failed")));
}

/// S6 — anomaly without failure: exactly one anomaly alert, no ai_critical.
#[tokio::test]
async fn test_s6_anomaly_without_failure() {
    let (db, device) = store_with_device("192.168.1.30", Some("mixer-7"));
    let bus = NotificationBus::new(50);

    let events = evaluate_device(&device, Some(true), true, &assessment(0.1, -0.8, true));
    deliver_events(&db, &bus, None, &device, &events).await;

    let alerts = db.open_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertKind::Anomaly);
    assert_eq!(alerts[0].priority, Priority::High);
    assert!(!alerts
        .iter()
        .any(|a| a.alert_type == AlertKind::AiCritical));
}

/// Invariant 3 under repeated delivery: one unresolved alert per
/// (device, kind), across kinds.
#[tokio::test]
async fn test_one_unresolved_alert_per_kind() {
    let (db, device) = store_with_device("192.168.1.40", None);
    let bus = NotificationBus::new(50);

    for _ in 0..4 {
        let events = evaluate_device(&device, Some(true), true, &assessment(0.85, -0.9, true));
        deliver_events(&db, &bus, None, &device, &events).await;
    }

    let alerts = db.open_alerts().unwrap();
    assert_eq!(alerts.len(), 2, "one ai_critical and one anomaly");
    let critical = alerts
        .iter()
        .filter(|a| a.alert_type == AlertKind::AiCritical)
        .count();
    let anomalies = alerts
        .iter()
        .filter(|a| a.alert_type == AlertKind::Anomaly)
        .count();
    assert_eq!((critical, anomalies), (1, 1));
}

/// Escalation path: a higher-priority emission updates the open row in
/// place instead of creating a second one.
#[tokio::test]
async fn test_escalation_updates_in_place() {
    let (db, device) = store_with_device("192.168.1.50", None);
    let bus = NotificationBus::new(50);

    let warn = AlertEvent::Raise {
        kind: AlertKind::Anomaly,
        priority: Priority::Medium,
        message: "anomaly (moderate)".to_string(),
        confidence: 0.4,
    };
    let escalate = AlertEvent::Raise {
        kind: AlertKind::Anomaly,
        priority: Priority::Critical,
        message: "anomaly (severe)".to_string(),
        confidence: 0.9,
    };

    deliver_events(&db, &bus, None, &device, &[warn.clone()]).await;
    deliver_events(&db, &bus, None, &device, &[escalate]).await;

    let alerts = db.open_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, Priority::Critical);
    assert_eq!(alerts[0].message, "anomaly (severe)");

    // De-escalation is suppressed: the row keeps its critical priority.
    deliver_events(&db, &bus, None, &device, &[warn]).await;
    let alerts = db.open_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].priority, Priority::Critical);
}

/// Resolving and re-raising starts a fresh row; the resolved row keeps its
/// resolution instant.
#[tokio::test]
async fn test_resolved_alert_allows_new_emission() {
    let (db, device) = store_with_device("192.168.1.60", None);
    let bus = NotificationBus::new(50);

    let events = evaluate_device(&device, Some(true), true, &assessment(0.9, 0.0, false));
    deliver_events(&db, &bus, None, &device, &events).await;

    let open = db.open_alerts().unwrap();
    assert_eq!(open.len(), 1);
    assert!(db.resolve_alert(open[0].id).unwrap());
    assert!(db.open_alerts().unwrap().is_empty());

    deliver_events(&db, &bus, None, &device, &events).await;
    let reopened = db.open_alerts().unwrap();
    assert_eq!(reopened.len(), 1);
    assert_ne!(reopened[0].id, open[0].id, "a new row, not a reopened one");
}

/// Store-level dedup outcome reporting used by the delivery layer.
#[test]
fn test_upsert_reports_created_then_suppressed() {
    let (db, device) = store_with_device("192.168.1.70", None);

    let first = db
        .upsert_alert(device.id, AlertKind::Offline, "down", Priority::High, 0.3)
        .unwrap();
    assert!(matches!(first, AlertUpsert::Created(_)));

    let second = db
        .upsert_alert(device.id, AlertKind::Offline, "down", Priority::High, 0.3)
        .unwrap();
    assert!(matches!(second, AlertUpsert::Suppressed(_)));
}

/// Notifications mirror alert priority so the feed can be filtered.
#[tokio::test]
async fn test_notification_priorities_mirror_alerts() {
    let (db, device) = store_with_device("192.168.1.80", None);
    let bus = NotificationBus::new(50);

    let events = evaluate_device(&device, Some(true), true, &assessment(0.85, 0.0, false));
    deliver_events(&db, &bus, None, &device, &events).await;

    let (notifications, unread) = bus.snapshot();
    assert_eq!(unread, 1);
    assert_eq!(notifications[0].priority, Priority::Critical);
    assert_eq!(
        notifications[0].device_ip.as_deref(),
        Some("192.168.1.80")
    );
}
