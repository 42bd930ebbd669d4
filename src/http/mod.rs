//! HTTP API surface
//!
//! Read endpoints for the dashboard collaborator and write endpoints for
//! operator actions. Instants are stored UTC and rendered in local time
//! here, at the boundary. Errors surface as structured JSON
//! `{kind, message}`; nothing on this surface aborts the process.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::monitor::Scheduler;
use crate::notify::NotificationBus;
use crate::store::{AlertRecord, Database, DeviceRecord};

/// Devices returned by the top-N risk endpoints
const RISK_LIST_LIMIT: usize = 10;

/// Observations embedded in the device-details response
const DEVICE_DETAIL_HISTORY: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub bus: Arc<NotificationBus>,
    pub scheduler: Arc<Scheduler>,
    pub settings: Settings,
}

/// Structured API error
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: format!("{} not found", what),
        }
    }

    fn busy(message: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            kind: "busy",
            message: message.to_string(),
        }
    }

    fn internal(error: anyhow::Error) -> Self {
        tracing::error!("API internal error: {:#}", error);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: format!("{:#}", error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "kind": self.kind, "message": self.message }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error)
    }
}

fn local(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).to_rfc3339()
}

fn device_json(device: &DeviceRecord) -> serde_json::Value {
    json!({
        "id": device.id,
        "ip": device.ip,
        "hostname": device.hostname,
        "mac": device.mac,
        "mac_vendor": device.mac_vendor,
        "is_online": device.is_online,
        "last_seen": local(device.last_seen),
        "device_type": device.device_type.as_str(),
        "ai_confidence": device.ai_confidence,
        "health_score": device.health_score,
        "failure_probability": device.failure_probability,
        "anomaly_score": device.anomaly_score,
        "maintenance_urgency": device.maintenance_urgency.as_str(),
        "ai_recommendations": device.ai_recommendations,
        "response_time": device.response_time,
        "system_info": device.system_info,
        "open_ports": device.open_ports,
        "services": device.services,
        "created_at": local(device.created_at),
        "updated_at": local(device.updated_at),
    })
}

fn alert_json(alert: &AlertRecord, device: Option<&DeviceRecord>) -> serde_json::Value {
    json!({
        "id": alert.id,
        "device_id": alert.device_id,
        "device_ip": device.map(|d| d.ip.clone()),
        "device_hostname": device.and_then(|d| d.hostname.clone()),
        "alert_type": alert.alert_type.as_str(),
        "message": alert.message,
        "priority": alert.priority.as_str(),
        "ai_confidence": alert.ai_confidence,
        "is_resolved": alert.is_resolved,
        "created_at": local(alert.created_at),
        "resolved_at": alert.resolved_at.map(local),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", get(list_devices))
        .route("/api/devices/:id", get(device_details))
        .route("/api/statistics", get(statistics))
        .route("/api/alerts", get(list_alerts))
        .route("/api/notifications", get(notifications))
        .route("/api/ai/dashboard-stats", get(dashboard_stats))
        .route("/api/ai/high-risk-devices", get(high_risk_devices))
        .route("/api/ai/anomaly-devices", get(anomaly_devices))
        .route("/api/scan", post(request_scan))
        .route("/api/ai/train", post(request_training))
        .route("/api/alert/:id/resolve", post(resolve_alert))
        .route("/api/alerts/bulk-resolve", post(bulk_resolve_alerts))
        .route("/api/notifications/mark-read/:id", post(mark_notification_read))
        .route("/api/notifications/clear", post(clear_notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the task is aborted.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener on {}: {}", addr, e))?;
    tracing::info!("HTTP API listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn list_devices(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let devices = state.db.all_devices()?;
    let body: Vec<serde_json::Value> = devices.iter().map(device_json).collect();
    Ok(Json(json!(body)))
}

async fn device_details(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let device = state
        .db
        .get_device(device_id)?
        .ok_or_else(|| ApiError::not_found("device"))?;

    let history = state
        .db
        .recent_observations(device_id, DEVICE_DETAIL_HISTORY)?;
    let alerts = state.db.open_alerts_for(device_id)?;

    let mut body = device_json(&device);
    body["scan_history"] = json!(history
        .iter()
        .map(|o| json!({
            "timestamp": local(o.timestamp),
            "is_online": o.is_online,
            "response_time": o.response_time,
            "packet_loss": o.packet_loss,
            "scan_duration": o.scan_duration,
            "error_count": o.error_count,
        }))
        .collect::<Vec<_>>());
    body["active_alerts"] = json!(alerts
        .iter()
        .map(|a| alert_json(a, Some(&device)))
        .collect::<Vec<_>>());

    Ok(Json(body))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.db.network_statistics()?;
    Ok(Json(json!({
        "total_devices": stats.total_devices,
        "online_devices": stats.online_devices,
        "offline_devices": stats.offline_devices,
        "uptime_percentage": stats.uptime_percentage,
    })))
}

async fn list_alerts(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let alerts = state.db.open_alerts()?;

    let mut body = Vec::with_capacity(alerts.len());
    for alert in &alerts {
        let device = state.db.get_device(alert.device_id)?;
        body.push(alert_json(alert, device.as_ref()));
    }

    Ok(Json(json!(body)))
}

async fn notifications(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (items, unread) = state.bus.snapshot();
    Json(json!({
        "unread_count": unread,
        "notifications": items,
    }))
}

async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.db.dashboard_stats(
        state.settings.critical_health_threshold,
        state.settings.high_risk_threshold,
        state.settings.anomaly_threshold,
    )?;
    Ok(Json(json!({
        "avg_health_score": stats.avg_health_score,
        "critical_devices": stats.critical_devices,
        "high_risk_devices_count": stats.high_risk_devices_count,
        "anomaly_devices_count": stats.anomaly_devices_count,
    })))
}

async fn high_risk_devices(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let devices = state
        .db
        .high_risk_devices(state.settings.high_risk_threshold, RISK_LIST_LIMIT)?;
    let body: Vec<serde_json::Value> = devices
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "ip": d.ip,
                "hostname": d.hostname,
                "device_type": d.device_type.as_str(),
                "failure_probability": d.failure_probability,
                "health_score": d.health_score,
            })
        })
        .collect();
    Ok(Json(json!(body)))
}

async fn anomaly_devices(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let devices = state
        .db
        .anomaly_devices(state.settings.anomaly_threshold, RISK_LIST_LIMIT)?;
    let body: Vec<serde_json::Value> = devices
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "ip": d.ip,
                "hostname": d.hostname,
                "device_type": d.device_type.as_str(),
                "anomaly_score": d.anomaly_score,
                "health_score": d.health_score,
            })
        })
        .collect();
    Ok(Json(json!(body)))
}

async fn request_scan(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .scheduler
        .trigger_scan()
        .map_err(|_| ApiError::busy("a scan is already in progress"))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "message": "scan started" })),
    ))
}

async fn request_training(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .scheduler
        .trigger_training()
        .map_err(|_| ApiError::busy("a training batch is already in progress"))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "message": "training started" })),
    ))
}

async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.resolve_alert(alert_id)? {
        return Err(ApiError::not_found("alert"));
    }
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
struct BulkResolveRequest {
    alert_ids: Vec<i64>,
}

async fn bulk_resolve_alerts(
    State(state): State<AppState>,
    Json(request): Json<BulkResolveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut resolved = 0usize;
    for alert_id in &request.alert_ids {
        if state.db.resolve_alert(*alert_id)? {
            resolved += 1;
        }
    }
    Ok(Json(json!({ "status": "success", "resolved": resolved })))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.bus.mark_read(notification_id) {
        return Err(ApiError::not_found("notification"));
    }
    Ok(Json(json!({ "status": "success" })))
}

async fn clear_notifications(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.bus.clear();
    Json(json!({ "status": "success" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AssessmentEngine;
    use crate::models::{HostProbe, Priority};
    use crate::notify::NotificationKind;
    use crate::pipeline::Pipeline;
    use crate::probe::{ProbeFuture, Prober};
    use crate::store::{AlertKind, DeviceUpsert};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Finds nothing, slowly — keeps a triggered scan in flight long enough
    /// for the busy path to be observable.
    struct SilentProber;

    impl Prober for SilentProber {
        fn probe(&self, ip: std::net::Ipv4Addr) -> ProbeFuture<'_> {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                HostProbe::unreachable(ip, 1, 0.0)
            })
        }
    }

    fn test_state() -> AppState {
        let settings = Settings {
            production_networks: vec!["192.0.2.0/30".to_string()],
            ..Settings::default()
        };
        let db = Database::in_memory().unwrap();
        let bus = Arc::new(NotificationBus::new(50));
        let pipeline = Arc::new(Pipeline {
            settings: settings.clone(),
            db: db.clone(),
            engine: Arc::new(AssessmentEngine::new(-0.5, None)),
            bus: Arc::clone(&bus),
            prober: Arc::new(SilentProber),
            mailer: None,
        });
        AppState {
            db,
            bus,
            scheduler: Scheduler::new(pipeline),
            settings,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn request(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Response {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(axum::body::Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(axum::body::Body::empty()).unwrap(),
        };
        router(state.clone()).oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_device_list() {
        let state = test_state();
        let response = request(&state, "GET", "/api/devices", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_device_details_includes_history_and_alerts() {
        let state = test_state();
        let id = state
            .db
            .upsert_device(&DeviceUpsert {
                ip: "192.168.1.10",
                reachable: true,
                hostname: Some("plc-line1"),
                ..DeviceUpsert::default()
            })
            .unwrap();
        state
            .db
            .append_observation(id, &crate::store::ObservationInsert {
                is_online: true,
                response_time: Some(3.2),
                ..crate::store::ObservationInsert::default()
            })
            .unwrap();
        state
            .db
            .upsert_alert(id, AlertKind::Offline, "down", Priority::High, 0.4)
            .unwrap();

        let response = request(&state, "GET", &format!("/api/devices/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ip"], "192.168.1.10");
        assert_eq!(body["scan_history"].as_array().unwrap().len(), 1);
        assert_eq!(body["active_alerts"].as_array().unwrap().len(), 1);
        assert_eq!(body["active_alerts"][0]["alert_type"], "offline");
    }

    #[tokio::test]
    async fn test_unknown_device_is_structured_404() {
        let state = test_state();
        let response = request(&state, "GET", "/api/devices/999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_scan_busy_returns_conflict() {
        let state = test_state();
        state
            .scheduler
            .trigger_scan()
            .expect("first scan request should start");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(state.scheduler.scan_in_progress());

        let response = request(&state, "POST", "/api/scan", None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "busy");
    }

    #[tokio::test]
    async fn test_resolve_alert_idempotent_and_bulk() {
        let state = test_state();
        let id = state
            .db
            .upsert_device(&DeviceUpsert {
                ip: "10.0.0.1",
                reachable: true,
                ..DeviceUpsert::default()
            })
            .unwrap();
        let upsert = state
            .db
            .upsert_alert(id, AlertKind::AiCritical, "risk", Priority::Critical, 0.9)
            .unwrap();
        let alert_id = match upsert {
            crate::store::AlertUpsert::Created(aid) => aid,
            _ => panic!("expected new alert"),
        };

        let first = request(
            &state,
            "POST",
            &format!("/api/alert/{}/resolve", alert_id),
            None,
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = request(
            &state,
            "POST",
            &format!("/api/alert/{}/resolve", alert_id),
            None,
        )
        .await;
        assert_eq!(second.status(), StatusCode::OK, "resolve is idempotent");

        let bulk = request(
            &state,
            "POST",
            "/api/alerts/bulk-resolve",
            Some(json!({ "alert_ids": [alert_id, 4242] })),
        )
        .await;
        assert_eq!(bulk.status(), StatusCode::OK);
        let body = body_json(bulk).await;
        assert_eq!(body["resolved"], 1);
    }

    #[tokio::test]
    async fn test_notifications_snapshot_and_clear() {
        let state = test_state();
        let id = state
            .bus
            .publish("hello", NotificationKind::Info, Priority::Low, None);

        let response = request(&state, "GET", "/api/notifications", None).await;
        let body = body_json(response).await;
        assert_eq!(body["unread_count"], 1);
        assert_eq!(body["notifications"].as_array().unwrap().len(), 1);

        let mark = request(
            &state,
            "POST",
            &format!("/api/notifications/mark-read/{}", id),
            None,
        )
        .await;
        assert_eq!(mark.status(), StatusCode::OK);
        assert_eq!(state.bus.unread_count(), 0);

        let clear = request(&state, "POST", "/api/notifications/clear", None).await;
        assert_eq!(clear.status(), StatusCode::OK);
        assert!(state.bus.snapshot().0.is_empty());
    }

    #[tokio::test]
    async fn test_high_risk_endpoint_sorts_descending() {
        let state = test_state();
        for (ip, fp) in [("10.0.0.1", 0.7), ("10.0.0.2", 0.9), ("10.0.0.3", 0.3)] {
            let id = state
                .db
                .upsert_device(&DeviceUpsert {
                    ip,
                    reachable: true,
                    ..DeviceUpsert::default()
                })
                .unwrap();
            let mut assessment = crate::ai::Assessment::neutral();
            assessment.maintenance.failure_probability = fp;
            state.db.update_device_assessment(id, &assessment).unwrap();
        }

        let response = request(&state, "GET", "/api/ai/high-risk-devices", None).await;
        let body = body_json(response).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2, "only devices above the 0.6 threshold");
        assert_eq!(list[0]["ip"], "10.0.0.2");
        assert_eq!(list[1]["ip"], "10.0.0.1");
    }
}
