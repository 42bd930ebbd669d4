//! Database schema
//!
//! Creates and migrates the SQLite tables. Schema evolution is additive:
//! new columns arrive as nullable/defaulted ALTERs probed via PRAGMA.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables and indexes
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Devices: one row per supervised host, identity = IPv4 address
        CREATE TABLE IF NOT EXISTS device (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip TEXT UNIQUE NOT NULL,
            mac TEXT,
            hostname TEXT,
            mac_vendor TEXT,
            is_online INTEGER NOT NULL DEFAULT 1,
            last_seen TEXT NOT NULL,
            device_type TEXT NOT NULL DEFAULT 'unknown',
            ai_confidence REAL NOT NULL DEFAULT 0.0,
            health_score REAL NOT NULL DEFAULT 100.0,
            failure_probability REAL NOT NULL DEFAULT 0.0,
            anomaly_score REAL NOT NULL DEFAULT 0.0,
            maintenance_urgency TEXT NOT NULL DEFAULT 'low',
            ai_recommendations TEXT NOT NULL DEFAULT '[]',
            response_time REAL,
            system_info TEXT,
            open_ports TEXT NOT NULL DEFAULT '[]',
            services TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Scan history: append-only, one row per probe of one device
        CREATE TABLE IF NOT EXISTS scan_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            is_online INTEGER NOT NULL DEFAULT 1,
            response_time REAL,
            packet_loss REAL NOT NULL DEFAULT 0.0,
            scan_duration REAL NOT NULL DEFAULT 0.0,
            error_count INTEGER NOT NULL DEFAULT 0,
            ai_snapshot TEXT,
            timestamp TEXT NOT NULL,
            FOREIGN KEY (device_id) REFERENCES device(id) ON DELETE CASCADE
        );

        -- Alerts: at most one unresolved row per (device, kind)
        CREATE TABLE IF NOT EXISTS alert (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            alert_type TEXT NOT NULL,
            message TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            ai_confidence REAL NOT NULL DEFAULT 0.0,
            is_resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            FOREIGN KEY (device_id) REFERENCES device(id) ON DELETE CASCADE
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_device_ip ON device(ip);
        CREATE INDEX IF NOT EXISTS idx_device_failure ON device(failure_probability);
        CREATE INDEX IF NOT EXISTS idx_device_anomaly ON device(anomaly_score);
        CREATE INDEX IF NOT EXISTS idx_history_device ON scan_history(device_id, id);
        CREATE INDEX IF NOT EXISTS idx_alert_open ON alert(is_resolved) WHERE is_resolved = 0;
        CREATE INDEX IF NOT EXISTS idx_alert_device_kind ON alert(device_id, alert_type, is_resolved);
        "#,
    )
    .context("Failed to create database tables")?;

    migrate_additive_columns(conn)?;

    Ok(())
}

/// Probe for columns added after the first release and backfill them.
fn migrate_additive_columns(conn: &Connection) -> Result<()> {
    if !has_column(conn, "scan_history", "ai_snapshot")? {
        conn.execute("ALTER TABLE scan_history ADD COLUMN ai_snapshot TEXT", [])
            .context("Failed to migrate scan_history with ai_snapshot column")?;
    }

    if !has_column(conn, "device", "system_info")? {
        conn.execute("ALTER TABLE device ADD COLUMN system_info TEXT", [])
            .context("Failed to migrate device with system_info column")?;
    }

    if !has_column(conn, "device", "services")? {
        conn.execute(
            "ALTER TABLE device ADD COLUMN services TEXT NOT NULL DEFAULT '[]'",
            [],
        )
        .context("Failed to migrate device with services column")?;
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.prepare(&format!("PRAGMA table_info({})", table))
        .and_then(|mut stmt| {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let name: String = row.get(1)?;
                if name == column {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .with_context(|| format!("Failed to inspect {} table schema", table))
}

/// Drop all tables (for testing/reset)
#[allow(dead_code)]
pub fn drop_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS alert;
        DROP TABLE IF EXISTS scan_history;
        DROP TABLE IF EXISTS device;
        "#,
    )
    .context("Failed to drop tables")?;

    Ok(())
}
