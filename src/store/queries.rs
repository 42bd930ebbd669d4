//! Store queries
//!
//! All functions take a borrowed connection; serialization is the caller's
//! concern (the `Database` wrapper holds the single mutex). Timestamps are
//! stored as RFC 3339 UTC text.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::*;
use crate::ai::Assessment;
use crate::models::{DeviceType, Priority, Urgency};

/// Maximum window a history query may request
pub const MAX_HISTORY_WINDOW: usize = 500;

/// Fields for inserting or refreshing a device from a probe
#[derive(Debug, Clone, Default)]
pub struct DeviceUpsert<'a> {
    pub ip: &'a str,
    pub reachable: bool,
    pub hostname: Option<&'a str>,
    pub mac: Option<&'a str>,
    pub mac_vendor: Option<&'a str>,
    pub response_time: Option<f64>,
    pub system_info: Option<&'a str>,
    pub open_ports: &'a [u16],
    pub services: &'a [String],
}

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

/// Insert-or-update a device by IP. Returns the device id.
///
/// Identity fields only improve: a probe that lost the hostname or MAC does
/// not erase what a previous probe learned.
pub fn upsert_device(conn: &Connection, fields: &DeviceUpsert<'_>) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM device WHERE ip = ?1",
            params![fields.ip],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to look up device by ip")?;

    let now = now_text();
    let ports_json = serde_json::to_string(fields.open_ports).unwrap_or_else(|_| "[]".to_string());
    let services_json = serde_json::to_string(fields.services).unwrap_or_else(|_| "[]".to_string());

    if let Some(id) = existing {
        if fields.reachable {
            conn.execute(
                r#"
                UPDATE device SET
                    is_online = 1,
                    last_seen = ?2,
                    hostname = COALESCE(?3, hostname),
                    mac = COALESCE(?4, mac),
                    mac_vendor = COALESCE(?5, mac_vendor),
                    response_time = ?6,
                    system_info = COALESCE(?7, system_info),
                    open_ports = ?8,
                    services = ?9,
                    updated_at = ?2
                WHERE id = ?1
                "#,
                params![
                    id,
                    now,
                    fields.hostname,
                    fields.mac,
                    fields.mac_vendor,
                    fields.response_time,
                    fields.system_info,
                    ports_json,
                    services_json,
                ],
            )
            .context("Failed to update device")?;
        } else {
            conn.execute(
                "UPDATE device SET is_online = 0, updated_at = ?2 WHERE id = ?1",
                params![id, now],
            )
            .context("Failed to mark device offline")?;
        }
        return Ok(id);
    }

    conn.execute(
        r#"
        INSERT INTO device (
            ip, mac, hostname, mac_vendor, is_online, last_seen,
            response_time, system_info, open_ports, services,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?6, ?6)
        "#,
        params![
            fields.ip,
            fields.mac,
            fields.hostname,
            fields.mac_vendor,
            fields.reachable,
            now,
            fields.response_time,
            fields.system_info,
            ports_json,
            services_json,
        ],
    )
    .context("Failed to insert device")?;

    Ok(conn.last_insert_rowid())
}

/// Append one observation. Append-only by construction.
pub fn append_observation(
    conn: &Connection,
    device_id: i64,
    observation: &ObservationInsert,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO scan_history (
            device_id, is_online, response_time, packet_loss,
            scan_duration, error_count, ai_snapshot, timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            device_id,
            observation.is_online,
            observation.response_time,
            observation.packet_loss,
            observation.scan_duration,
            observation.error_count,
            observation.ai_snapshot,
            now_text(),
        ],
    )
    .context("Failed to append observation")?;

    Ok(conn.last_insert_rowid())
}

/// Last `n` observations for a device, newest first. `n` is clamped to
/// [1, 500].
pub fn recent_observations(
    conn: &Connection,
    device_id: i64,
    n: usize,
) -> Result<Vec<ObservationRecord>> {
    let limit = n.clamp(1, MAX_HISTORY_WINDOW) as i64;

    let mut stmt = conn.prepare(
        r#"
        SELECT id, device_id, is_online, response_time, packet_loss,
               scan_duration, error_count, ai_snapshot, timestamp
        FROM scan_history
        WHERE device_id = ?1
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;

    let observations = stmt
        .query_map(params![device_id, limit], |row| {
            Ok(ObservationRecord {
                id: row.get(0)?,
                device_id: row.get(1)?,
                is_online: row.get::<_, i64>(2)? == 1,
                response_time: row.get(3)?,
                packet_loss: row.get(4)?,
                scan_duration: row.get(5)?,
                error_count: row.get(6)?,
                ai_snapshot: row.get(7)?,
                timestamp: parse_datetime_column(row.get::<_, String>(8)?, 8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(observations)
}

/// Total observations ever recorded for a device (the device-age feature).
pub fn observation_count(conn: &Connection, device_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM scan_history WHERE device_id = ?1",
        params![device_id],
        |row| row.get(0),
    )
    .context("Failed to count observations")
}

const DEVICE_COLUMNS: &str = r#"
    id, ip, mac, hostname, mac_vendor, is_online, last_seen, device_type,
    ai_confidence, health_score, failure_probability, anomaly_score,
    maintenance_urgency, ai_recommendations, response_time, system_info,
    open_ports, services, created_at, updated_at
"#;

fn map_device_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRecord> {
    let device_type_raw: String = row.get(7)?;
    let urgency_raw: String = row.get(12)?;
    let recommendations_raw: String = row.get(13)?;
    let ports_raw: String = row.get(16)?;
    let services_raw: String = row.get(17)?;

    Ok(DeviceRecord {
        id: row.get(0)?,
        ip: row.get(1)?,
        mac: row.get(2)?,
        hostname: row.get(3)?,
        mac_vendor: row.get(4)?,
        is_online: row.get::<_, i64>(5)? == 1,
        last_seen: parse_datetime_column(row.get::<_, String>(6)?, 6)?,
        device_type: parse_device_type_or_default(&device_type_raw),
        ai_confidence: row.get(8)?,
        health_score: row.get(9)?,
        failure_probability: row.get(10)?,
        anomaly_score: row.get(11)?,
        maintenance_urgency: parse_urgency_or_default(&urgency_raw),
        ai_recommendations: parse_json_or_default(&recommendations_raw, "ai_recommendations"),
        response_time: row.get(14)?,
        system_info: row.get(15)?,
        open_ports: parse_json_or_default(&ports_raw, "open_ports"),
        services: parse_json_or_default(&services_raw, "services"),
        created_at: parse_datetime_column(row.get::<_, String>(18)?, 18)?,
        updated_at: parse_datetime_column(row.get::<_, String>(19)?, 19)?,
    })
}

/// All devices, most recently seen first.
pub fn all_devices(conn: &Connection) -> Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM device ORDER BY last_seen DESC",
        DEVICE_COLUMNS
    ))?;

    let devices = stmt
        .query_map([], map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

pub fn get_device(conn: &Connection, device_id: i64) -> Result<Option<DeviceRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM device WHERE id = ?1", DEVICE_COLUMNS),
        params![device_id],
        map_device_row,
    )
    .optional()
    .context("Failed to load device")
}

pub fn get_device_by_ip(conn: &Connection, ip: &str) -> Result<Option<DeviceRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM device WHERE ip = ?1", DEVICE_COLUMNS),
        params![ip],
        map_device_row,
    )
    .optional()
    .context("Failed to load device by ip")
}

/// Project an assessment onto the device row in one atomic update, so
/// readers never observe a half-written assessment.
pub fn update_device_assessment(
    conn: &Connection,
    device_id: i64,
    assessment: &Assessment,
) -> Result<()> {
    let recommendations = serde_json::to_string(&assessment.recommendations)
        .context("Failed to serialize recommendations")?;

    conn.execute(
        r#"
        UPDATE device SET
            device_type = ?2,
            ai_confidence = ?3,
            health_score = ?4,
            failure_probability = ?5,
            anomaly_score = ?6,
            maintenance_urgency = ?7,
            ai_recommendations = ?8,
            updated_at = ?9
        WHERE id = ?1
        "#,
        params![
            device_id,
            assessment.classification.device_type.as_str(),
            assessment.ai_confidence,
            assessment.health_score,
            assessment.maintenance.failure_probability,
            assessment.anomaly.score,
            assessment.maintenance.urgency.as_str(),
            recommendations,
            now_text(),
        ],
    )
    .context("Failed to update device assessment")?;

    Ok(())
}

/// Apply the dedup invariant for one (device, kind) emission.
pub fn upsert_alert(
    conn: &Connection,
    device_id: i64,
    kind: AlertKind,
    message: &str,
    priority: Priority,
    ai_confidence: f64,
) -> Result<AlertUpsert> {
    let existing: Option<(i64, String)> = conn
        .query_row(
            r#"
            SELECT id, priority FROM alert
            WHERE device_id = ?1 AND alert_type = ?2 AND is_resolved = 0
            ORDER BY id DESC
            LIMIT 1
            "#,
            params![device_id, kind.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("Failed to look up open alert")?;

    if let Some((id, existing_priority_raw)) = existing {
        let existing_priority = parse_priority_or_default(&existing_priority_raw);
        if priority > existing_priority {
            conn.execute(
                r#"
                UPDATE alert SET priority = ?2, message = ?3, ai_confidence = ?4, created_at = ?5
                WHERE id = ?1
                "#,
                params![id, priority.as_str(), message, ai_confidence, now_text()],
            )
            .context("Failed to escalate alert")?;
            return Ok(AlertUpsert::Escalated(id));
        }
        return Ok(AlertUpsert::Suppressed(id));
    }

    conn.execute(
        r#"
        INSERT INTO alert (device_id, alert_type, message, priority, ai_confidence, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            device_id,
            kind.as_str(),
            message,
            priority.as_str(),
            ai_confidence,
            now_text()
        ],
    )
    .context("Failed to insert alert")?;

    Ok(AlertUpsert::Created(conn.last_insert_rowid()))
}

fn map_alert_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRecord> {
    let kind_raw: String = row.get(2)?;
    let priority_raw: String = row.get(4)?;
    let resolved_at_raw: Option<String> = row.get(8)?;

    let resolved_at = match resolved_at_raw {
        Some(raw) => Some(parse_datetime_column(raw, 8)?),
        None => None,
    };

    Ok(AlertRecord {
        id: row.get(0)?,
        device_id: row.get(1)?,
        alert_type: parse_alert_kind_or_default(&kind_raw),
        message: row.get(3)?,
        priority: parse_priority_or_default(&priority_raw),
        ai_confidence: row.get(5)?,
        is_resolved: row.get::<_, i64>(6)? == 1,
        created_at: parse_datetime_column(row.get::<_, String>(7)?, 7)?,
        resolved_at,
    })
}

const ALERT_COLUMNS: &str = r#"
    id, device_id, alert_type, message, priority, ai_confidence,
    is_resolved, created_at, resolved_at
"#;

/// Unresolved alerts, newest first.
pub fn open_alerts(conn: &Connection) -> Result<Vec<AlertRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM alert WHERE is_resolved = 0 ORDER BY created_at DESC, id DESC",
        ALERT_COLUMNS
    ))?;

    let alerts = stmt
        .query_map([], map_alert_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(alerts)
}

/// Unresolved alerts for one device, newest first.
pub fn open_alerts_for(conn: &Connection, device_id: i64) -> Result<Vec<AlertRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM alert WHERE is_resolved = 0 AND device_id = ?1 ORDER BY created_at DESC, id DESC",
        ALERT_COLUMNS
    ))?;

    let alerts = stmt
        .query_map(params![device_id], map_alert_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(alerts)
}

/// Mark an alert resolved. Idempotent: an already-resolved alert keeps its
/// original resolution instant.
pub fn resolve_alert(conn: &Connection, alert_id: i64) -> Result<bool> {
    let updated = conn
        .execute(
            r#"
            UPDATE alert SET is_resolved = 1, resolved_at = COALESCE(resolved_at, ?2)
            WHERE id = ?1
            "#,
            params![alert_id, now_text()],
        )
        .context("Failed to resolve alert")?;

    Ok(updated > 0)
}

/// Resolve every open alert of one kind for a device (offline recovery).
pub fn resolve_open_alerts_of_kind(
    conn: &Connection,
    device_id: i64,
    kind: AlertKind,
) -> Result<usize> {
    let updated = conn
        .execute(
            r#"
            UPDATE alert SET is_resolved = 1, resolved_at = ?3
            WHERE device_id = ?1 AND alert_type = ?2 AND is_resolved = 0
            "#,
            params![device_id, kind.as_str(), now_text()],
        )
        .context("Failed to auto-resolve alerts")?;

    Ok(updated)
}

/// Fleet totals for the statistics endpoint.
pub fn network_statistics(conn: &Connection) -> Result<NetworkStatistics> {
    let total_devices: i64 = conn.query_row("SELECT COUNT(*) FROM device", [], |row| row.get(0))?;
    let online_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device WHERE is_online = 1",
        [],
        |row| row.get(0),
    )?;

    let offline_devices = total_devices - online_devices;
    let uptime_percentage = if total_devices > 0 {
        (online_devices as f64 / total_devices as f64) * 100.0
    } else {
        0.0
    };

    Ok(NetworkStatistics {
        total_devices,
        online_devices,
        offline_devices,
        uptime_percentage: (uptime_percentage * 10.0).round() / 10.0,
    })
}

/// Aggregates for the assessment dashboard.
pub fn dashboard_stats(
    conn: &Connection,
    critical_health_threshold: f64,
    high_risk_threshold: f64,
    anomaly_threshold: f64,
) -> Result<DashboardStats> {
    let avg_health_score: f64 = conn
        .query_row(
            "SELECT COALESCE(AVG(health_score), 0.0) FROM device",
            [],
            |row| row.get(0),
        )
        .context("Failed to compute average health")?;

    let critical_devices: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device WHERE health_score < ?1",
        params![critical_health_threshold],
        |row| row.get(0),
    )?;

    let high_risk_devices_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device WHERE failure_probability > ?1",
        params![high_risk_threshold],
        |row| row.get(0),
    )?;

    let anomaly_devices_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device WHERE anomaly_score < ?1",
        params![anomaly_threshold],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        avg_health_score: (avg_health_score * 10.0).round() / 10.0,
        critical_devices,
        high_risk_devices_count,
        anomaly_devices_count,
    })
}

/// Devices above the failure-probability threshold, riskiest first.
pub fn high_risk_devices(
    conn: &Connection,
    threshold: f64,
    limit: usize,
) -> Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM device WHERE failure_probability > ?1 ORDER BY failure_probability DESC LIMIT ?2",
        DEVICE_COLUMNS
    ))?;

    let devices = stmt
        .query_map(params![threshold, limit as i64], map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

/// Devices below the anomaly threshold, most anomalous first.
pub fn anomaly_devices(
    conn: &Connection,
    threshold: f64,
    limit: usize,
) -> Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM device WHERE anomaly_score < ?1 ORDER BY anomaly_score ASC LIMIT ?2",
        DEVICE_COLUMNS
    ))?;

    let devices = stmt
        .query_map(params![threshold, limit as i64], map_device_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(devices)
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_device_type_or_default(s: &str) -> DeviceType {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown device type in database: {}", s);
            DeviceType::Unknown
        }
    }
}

fn parse_urgency_or_default(s: &str) -> Urgency {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown urgency in database: {}", s);
            Urgency::Low
        }
    }
}

fn parse_priority_or_default(s: &str) -> Priority {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown priority in database: {}", s);
            Priority::Low
        }
    }
}

fn parse_alert_kind_or_default(s: &str) -> AlertKind {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown alert kind in database: {}", s);
            AlertKind::Anomaly
        }
    }
}

fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(raw: &str, what: &str) -> T {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Invalid {} JSON in database: {}", what, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn upsert_fields(ip: &str, reachable: bool) -> DeviceUpsert<'_> {
        DeviceUpsert {
            ip,
            reachable,
            ..DeviceUpsert::default()
        }
    }

    #[test]
    fn test_upsert_device_insert_then_update() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let fields = DeviceUpsert {
            ip: "192.168.1.10",
            reachable: true,
            hostname: Some("plc-line1"),
            mac: Some("A4:91:B1:0A:22:01"),
            mac_vendor: Some("Siemens AG"),
            response_time: Some(4.2),
            ..DeviceUpsert::default()
        };

        let id = upsert_device(&conn, &fields).unwrap();
        let again = upsert_device(&conn, &fields).unwrap();
        assert_eq!(id, again, "same IP must map to the same device");

        let device = get_device(&conn, id).unwrap().unwrap();
        assert_eq!(device.ip, "192.168.1.10");
        assert_eq!(device.hostname.as_deref(), Some("plc-line1"));
        assert!(device.is_online);
    }

    #[test]
    fn test_upsert_preserves_enrichment_on_degraded_probe() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let rich = DeviceUpsert {
            ip: "192.168.1.11",
            reachable: true,
            hostname: Some("srv-db-01"),
            mac: Some("00:1C:B3:11:22:33"),
            ..DeviceUpsert::default()
        };
        let id = upsert_device(&conn, &rich).unwrap();

        // Later probe that resolved nothing must not erase the hostname.
        upsert_device(&conn, &upsert_fields("192.168.1.11", true)).unwrap();

        let device = get_device(&conn, id).unwrap().unwrap();
        assert_eq!(device.hostname.as_deref(), Some("srv-db-01"));
        assert_eq!(device.mac.as_deref(), Some("00:1C:B3:11:22:33"));
    }

    #[test]
    fn test_recent_observations_newest_first_and_clamped() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let id = upsert_device(&conn, &upsert_fields("10.0.0.2", true)).unwrap();
        for i in 0..10 {
            append_observation(
                &conn,
                id,
                &ObservationInsert {
                    is_online: true,
                    response_time: Some(i as f64),
                    ..ObservationInsert::default()
                },
            )
            .unwrap();
        }

        let recent = recent_observations(&conn, id, 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].response_time, Some(9.0));
        assert_eq!(recent[2].response_time, Some(7.0));

        // n = 0 clamps to 1
        let one = recent_observations(&conn, id, 0).unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_alert_dedup_and_escalation() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let id = upsert_device(&conn, &upsert_fields("10.0.0.3", true)).unwrap();

        let first = upsert_alert(&conn, id, AlertKind::Offline, "down", Priority::High, 0.9).unwrap();
        assert!(first.is_new());

        // Same kind while unresolved: suppressed.
        let second =
            upsert_alert(&conn, id, AlertKind::Offline, "down again", Priority::High, 0.9).unwrap();
        assert!(matches!(second, AlertUpsert::Suppressed(_)));
        assert_eq!(open_alerts_for(&conn, id).unwrap().len(), 1);

        // Strictly higher priority: escalated in place, still one row.
        let third = upsert_alert(
            &conn,
            id,
            AlertKind::Offline,
            "down hard",
            Priority::Critical,
            0.9,
        )
        .unwrap();
        assert!(matches!(third, AlertUpsert::Escalated(_)));
        let open = open_alerts_for(&conn, id).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].priority, Priority::Critical);
        assert_eq!(open[0].message, "down hard");
    }

    #[test]
    fn test_resolve_alert_idempotent() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let id = upsert_device(&conn, &upsert_fields("10.0.0.4", true)).unwrap();
        let upsert =
            upsert_alert(&conn, id, AlertKind::Anomaly, "odd", Priority::High, 0.5).unwrap();
        let alert_id = match upsert {
            AlertUpsert::Created(aid) => aid,
            _ => panic!("expected a new alert"),
        };

        assert!(resolve_alert(&conn, alert_id).unwrap());
        let resolved_at = open_alerts_for(&conn, id).unwrap();
        assert!(resolved_at.is_empty());

        let first_instant: Option<String> = conn
            .query_row(
                "SELECT resolved_at FROM alert WHERE id = ?1",
                params![alert_id],
                |row| row.get(0),
            )
            .unwrap();

        assert!(resolve_alert(&conn, alert_id).unwrap());
        let second_instant: Option<String> = conn
            .query_row(
                "SELECT resolved_at FROM alert WHERE id = ?1",
                params![alert_id],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(first_instant, second_instant, "resolution instant is stable");
    }

    #[test]
    fn test_network_statistics() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        upsert_device(&conn, &upsert_fields("10.0.0.5", true)).unwrap();
        upsert_device(&conn, &upsert_fields("10.0.0.6", true)).unwrap();
        let offline = upsert_device(&conn, &upsert_fields("10.0.0.7", true)).unwrap();
        upsert_device(&conn, &upsert_fields("10.0.0.7", false)).unwrap();

        let stats = network_statistics(&conn).unwrap();
        assert_eq!(stats.total_devices, 3);
        assert_eq!(stats.online_devices, 2);
        assert_eq!(stats.offline_devices, 1);
        assert!((stats.uptime_percentage - 66.7).abs() < 0.1);

        let record = get_device(&conn, offline).unwrap().unwrap();
        assert!(!record.is_online);
    }

    #[test]
    fn test_empty_store_statistics() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let conn = conn.lock().unwrap();

        let stats = network_statistics(&conn).unwrap();
        assert_eq!(stats.total_devices, 0);
        assert_eq!(stats.uptime_percentage, 0.0);

        let dashboard = dashboard_stats(&conn, 50.0, 0.6, -0.5).unwrap();
        assert_eq!(dashboard.avg_health_score, 0.0);
        assert_eq!(dashboard.critical_devices, 0);
    }
}
