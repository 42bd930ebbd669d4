//! Scan pipeline
//!
//! One scan pass: enumerate targets, probe them concurrently, then fold the
//! results into the store serially — upsert device, append observation,
//! assess, update the device row, emit alerts. This fold is the single
//! writer; per-device failures are logged and skipped so one bad device
//! never blocks the scan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::ai::features::CLASSIFY_ANOMALY_WINDOW;
use crate::ai::{AssessmentEngine, AssessmentInput, TrainingReport, TrainingSample};
use crate::alerts::{deliver_events, evaluate_device};
use crate::config::Settings;
use crate::discovery::{enumerate_targets, probe_targets};
use crate::models::{HostProbe, Priority, ScanSummary};
use crate::notify::email::EmailSender;
use crate::notify::{NotificationBus, NotificationKind};
use crate::probe::Prober;
use crate::store::{Database, DeviceUpsert, ObservationInsert};

/// Everything one scan or training pass needs
pub struct Pipeline {
    pub settings: Settings,
    pub db: Database,
    pub engine: Arc<AssessmentEngine>,
    pub bus: Arc<NotificationBus>,
    pub prober: Arc<dyn Prober>,
    pub mailer: Option<Arc<EmailSender>>,
}

impl Pipeline {
    /// Run one full scan pass. Cancellation-aware via `cancelled`.
    pub async fn run_scan(&self, cancelled: Arc<AtomicBool>) -> Result<ScanSummary> {
        let started = Instant::now();

        let (networks, targets) =
            enumerate_targets(&self.settings).context("Failed to enumerate scan targets")?;

        tracing::info!(
            "Scan started: {} network(s), {} target(s)",
            networks.len(),
            targets.len()
        );

        let probes = probe_targets(
            Arc::clone(&self.prober),
            &targets,
            self.settings.max_concurrent_probes,
            self.settings.per_host_deadline(),
            self.settings.scan_soft_deadline(),
            Arc::clone(&cancelled),
        )
        .await;

        let mut probed_ips: Vec<String> = Vec::with_capacity(probes.len());
        let mut reachable = 0usize;

        // Single-writer fold.
        for probe in &probes {
            probed_ips.push(probe.ip.to_string());
            if probe.reachable {
                reachable += 1;
            }
            if let Err(e) = self.process_probe(probe).await {
                tracing::error!("Skipping device {} after storage failure: {:#}", probe.ip, e);
            }
        }

        // Devices known to the store but not covered by this scan's probe
        // records are marked offline — unless the scan was cut short, in
        // which case their state is simply unknown.
        if !cancelled.load(Ordering::SeqCst) {
            if let Err(e) = self.sweep_unprobed(&probed_ips).await {
                tracing::error!("Offline sweep failed: {:#}", e);
            }
        }

        let summary = ScanSummary {
            networks: networks.iter().map(|n| n.to_string()).collect(),
            targets: targets.len(),
            probed: probes.len(),
            reachable,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Scan finished: {}/{} reachable in {}ms",
            summary.reachable,
            summary.probed,
            summary.duration_ms
        );
        self.bus.publish(
            format!(
                "Scan finished: {} device(s) reachable of {} probed",
                summary.reachable, summary.probed
            ),
            NotificationKind::Info,
            Priority::Low,
            None,
        );

        Ok(summary)
    }

    /// Fold one probe into the store and run assessment + alerting.
    async fn process_probe(&self, probe: &HostProbe) -> Result<()> {
        let ip = probe.ip.to_string();
        let previous = self.db.get_device_by_ip(&ip)?;

        // Devices are created on first successful probe; an unreachable
        // address with no history yields no record.
        if previous.is_none() && !probe.reachable {
            return Ok(());
        }
        let was_online = previous.as_ref().map(|d| d.is_online);

        let device_id = self.db.upsert_device(&DeviceUpsert {
            ip: &ip,
            reachable: probe.reachable,
            hostname: probe.hostname.as_deref(),
            mac: probe.mac.as_deref(),
            mac_vendor: probe.mac_vendor.as_deref(),
            response_time: probe.response_time_ms,
            system_info: probe.os_guess.as_deref(),
            open_ports: &probe.open_ports,
            services: &probe.services,
        })?;

        let observation_id = self.db.append_observation(
            device_id,
            &ObservationInsert {
                is_online: probe.reachable,
                response_time: probe.response_time_ms,
                packet_loss: probe.packet_loss,
                scan_duration: probe.scan_duration_secs,
                error_count: probe.error_count as i64,
                ai_snapshot: None,
            },
        )?;

        self.assess_and_alert(device_id, was_online, probe.reachable, Some(observation_id))
            .await
    }

    /// Assess a device from its stored history, project the assessment onto
    /// the device row, and emit alerts for the transition.
    async fn assess_and_alert(
        &self,
        device_id: i64,
        was_online: Option<bool>,
        now_online: bool,
        observation_id: Option<i64>,
    ) -> Result<()> {
        let device = self
            .db
            .get_device(device_id)?
            .context("Device vanished during scan fold")?;

        let history = self
            .db
            .recent_observations(device_id, CLASSIFY_ANOMALY_WINDOW)?;
        let device_age = self.db.observation_count(device_id)?;

        let ip: std::net::Ipv4Addr = device
            .ip
            .parse()
            .with_context(|| format!("Invalid device ip {}", device.ip))?;

        let assessment = self.engine.assess(&AssessmentInput {
            ip,
            hostname: device.hostname.as_deref().unwrap_or(""),
            mac_vendor: device.mac_vendor.as_deref().unwrap_or(""),
            history: &history,
            device_age,
        });

        self.db.update_device_assessment(device_id, &assessment)?;

        if let Some(observation_id) = observation_id {
            if let Ok(snapshot) = serde_json::to_string(&assessment) {
                if let Err(e) = self.set_observation_snapshot(observation_id, &snapshot) {
                    tracing::debug!("Failed to attach assessment snapshot: {:#}", e);
                }
            }
        }

        let events = evaluate_device(&device, was_online, now_online, &assessment);
        deliver_events(
            &self.db,
            &self.bus,
            self.mailer.as_deref(),
            &device,
            &events,
        )
        .await;

        Ok(())
    }

    fn set_observation_snapshot(&self, observation_id: i64, snapshot: &str) -> Result<()> {
        let conn = self.db.connection();
        let conn = conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
        conn.execute(
            "UPDATE scan_history SET ai_snapshot = ?2 WHERE id = ?1",
            rusqlite::params![observation_id, snapshot],
        )
        .context("Failed to store assessment snapshot")?;
        Ok(())
    }

    /// Mark known devices that this scan did not reach as offline, with an
    /// unreachable observation for history continuity.
    async fn sweep_unprobed(&self, probed_ips: &[String]) -> Result<()> {
        let devices = self.db.all_devices()?;

        for device in devices {
            if probed_ips.contains(&device.ip) {
                continue;
            }

            let was_online = Some(device.is_online);

            if let Err(e) = self.db.upsert_device(&DeviceUpsert {
                ip: &device.ip,
                reachable: false,
                ..DeviceUpsert::default()
            }) {
                tracing::error!("Skipping unprobed device {}: {:#}", device.ip, e);
                continue;
            }

            let observation_id = match self.db.append_observation(
                device.id,
                &ObservationInsert {
                    is_online: false,
                    response_time: None,
                    packet_loss: 1.0,
                    scan_duration: 0.0,
                    error_count: 1,
                    ai_snapshot: None,
                },
            ) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("Skipping unprobed device {}: {:#}", device.ip, e);
                    continue;
                }
            };

            if let Err(e) = self
                .assess_and_alert(device.id, was_online, false, Some(observation_id))
                .await
            {
                tracing::error!("Assessment failed for {}: {:#}", device.ip, e);
            }
        }

        Ok(())
    }

    /// Assemble the fleet's training data and run one training batch on the
    /// blocking pool (model fitting is CPU-bound).
    pub async fn run_training(&self) -> Result<TrainingReport> {
        let devices = self.db.all_devices()?;

        let mut fleet = Vec::with_capacity(devices.len());
        for device in devices {
            let history = self
                .db
                .recent_observations(device.id, CLASSIFY_ANOMALY_WINDOW)?;
            if history.is_empty() {
                continue;
            }
            let device_age = self.db.observation_count(device.id)?;
            let ip = match device.ip.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    tracing::warn!("Skipping device with invalid ip {}", device.ip);
                    continue;
                }
            };

            fleet.push(TrainingSample {
                ip,
                hostname: device.hostname.clone().unwrap_or_default(),
                mac_vendor: device.mac_vendor.clone().unwrap_or_default(),
                history,
                device_age,
            });
        }

        let engine = Arc::clone(&self.engine);
        let report = tokio::task::spawn_blocking(move || engine.train(&fleet))
            .await
            .context("Training task panicked")??;

        self.bus.publish(
            format!(
                "Model training finished over {} device(s)",
                report.devices
            ),
            NotificationKind::Info,
            Priority::Low,
            None,
        );

        Ok(report)
    }
}
