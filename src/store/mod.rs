//! Observation store
//!
//! SQLite-backed persistence for devices, observations and alerts. A single
//! connection behind a mutex keeps all mutations serialized; the scan
//! pipeline is the only writer, readers share the same handle.

pub mod models;
pub mod queries;
pub mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;

use crate::ai::Assessment;
use crate::models::Priority;
pub use models::{
    AlertKind, AlertRecord, AlertUpsert, DashboardStats, DeviceRecord, NetworkStatistics,
    ObservationInsert, ObservationRecord,
};
pub use queries::DeviceUpsert;

/// Backoff schedule for transient storage errors
const RETRY_DELAYS: &[Duration] = &[
    Duration::from_millis(100),
    Duration::from_millis(400),
    Duration::from_millis(1_600),
];

/// Database wrapper with thread-safe connection
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path`.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        db.initialize()?;

        Ok(db)
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };

        db.initialize()?;

        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned during initialization"))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        schema::create_tables(&conn)?;
        Ok(())
    }

    /// Get a reference to the connection
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Default database path for the application
    pub fn default_path() -> PathBuf {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("lanwatch").join("supervision.db")
    }

    /// Run `op` with the connection, retrying transient failures with
    /// exponential backoff. Non-transient errors fail immediately.
    fn with_retry<T>(
        &self,
        op_name: &str,
        op: impl Fn(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0usize;
        loop {
            let result = {
                let conn = self
                    .conn
                    .lock()
                    .map_err(|_| anyhow!("Database connection lock poisoned"))?;
                op(&conn)
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < RETRY_DELAYS.len() && is_transient(&e) => {
                    tracing::warn!(
                        "Storage operation {} failed (attempt {}): {}; retrying",
                        op_name,
                        attempt + 1,
                        e
                    );
                    std::thread::sleep(RETRY_DELAYS[attempt]);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── Devices ──────────────────────────────────────────────────────────

    pub fn upsert_device(&self, fields: &DeviceUpsert<'_>) -> Result<i64> {
        self.with_retry("upsert_device", |conn| queries::upsert_device(conn, fields))
    }

    pub fn all_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.with_retry("all_devices", queries::all_devices)
    }

    pub fn get_device(&self, device_id: i64) -> Result<Option<DeviceRecord>> {
        self.with_retry("get_device", |conn| queries::get_device(conn, device_id))
    }

    pub fn get_device_by_ip(&self, ip: &str) -> Result<Option<DeviceRecord>> {
        self.with_retry("get_device_by_ip", |conn| {
            queries::get_device_by_ip(conn, ip)
        })
    }

    pub fn update_device_assessment(&self, device_id: i64, assessment: &Assessment) -> Result<()> {
        self.with_retry("update_device_assessment", |conn| {
            queries::update_device_assessment(conn, device_id, assessment)
        })
    }

    // ── Observations ─────────────────────────────────────────────────────

    pub fn append_observation(
        &self,
        device_id: i64,
        observation: &ObservationInsert,
    ) -> Result<i64> {
        self.with_retry("append_observation", |conn| {
            queries::append_observation(conn, device_id, observation)
        })
    }

    pub fn recent_observations(&self, device_id: i64, n: usize) -> Result<Vec<ObservationRecord>> {
        self.with_retry("recent_observations", |conn| {
            queries::recent_observations(conn, device_id, n)
        })
    }

    pub fn observation_count(&self, device_id: i64) -> Result<i64> {
        self.with_retry("observation_count", |conn| {
            queries::observation_count(conn, device_id)
        })
    }

    // ── Alerts ───────────────────────────────────────────────────────────

    pub fn upsert_alert(
        &self,
        device_id: i64,
        kind: AlertKind,
        message: &str,
        priority: Priority,
        ai_confidence: f64,
    ) -> Result<AlertUpsert> {
        self.with_retry("upsert_alert", |conn| {
            queries::upsert_alert(conn, device_id, kind, message, priority, ai_confidence)
        })
    }

    pub fn open_alerts(&self) -> Result<Vec<AlertRecord>> {
        self.with_retry("open_alerts", queries::open_alerts)
    }

    pub fn open_alerts_for(&self, device_id: i64) -> Result<Vec<AlertRecord>> {
        self.with_retry("open_alerts_for", |conn| {
            queries::open_alerts_for(conn, device_id)
        })
    }

    pub fn resolve_alert(&self, alert_id: i64) -> Result<bool> {
        self.with_retry("resolve_alert", |conn| {
            queries::resolve_alert(conn, alert_id)
        })
    }

    pub fn resolve_open_alerts_of_kind(&self, device_id: i64, kind: AlertKind) -> Result<usize> {
        self.with_retry("resolve_open_alerts_of_kind", |conn| {
            queries::resolve_open_alerts_of_kind(conn, device_id, kind)
        })
    }

    // ── Aggregates ───────────────────────────────────────────────────────

    pub fn network_statistics(&self) -> Result<NetworkStatistics> {
        self.with_retry("network_statistics", queries::network_statistics)
    }

    pub fn dashboard_stats(
        &self,
        critical_health_threshold: f64,
        high_risk_threshold: f64,
        anomaly_threshold: f64,
    ) -> Result<DashboardStats> {
        self.with_retry("dashboard_stats", |conn| {
            queries::dashboard_stats(
                conn,
                critical_health_threshold,
                high_risk_threshold,
                anomaly_threshold,
            )
        })
    }

    pub fn high_risk_devices(&self, threshold: f64, limit: usize) -> Result<Vec<DeviceRecord>> {
        self.with_retry("high_risk_devices", |conn| {
            queries::high_risk_devices(conn, threshold, limit)
        })
    }

    pub fn anomaly_devices(&self, threshold: f64, limit: usize) -> Result<Vec<DeviceRecord>> {
        self.with_retry("anomaly_devices", |conn| {
            queries::anomaly_devices(conn, threshold, limit)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}

/// Busy/locked sqlite states are worth retrying; everything else is not.
fn is_transient(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
