//! Scheduler
//!
//! Single supervisor task firing the scan, training and report-trigger
//! ticks. Each tick carries a compare-and-set re-entrancy guard: a firing
//! that lands while its predecessor still runs is dropped with a warning,
//! never queued. Manual invocations from the HTTP surface share the same
//! guards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use crate::models::Priority;
use crate::notify::NotificationKind;
use crate::pipeline::Pipeline;

/// Supervisor poll cadence; also bounds shutdown latency.
const TICK_POLL: Duration = Duration::from_secs(1);

/// A tick or manual request landed while the previous one still runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy;

impl std::fmt::Display for Busy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("operation already in progress")
    }
}

impl std::error::Error for Busy {}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    scan_in_progress: AtomicBool,
    train_in_progress: AtomicBool,
    shutdown: AtomicBool,
    scan_cancel: Mutex<Arc<AtomicBool>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            scan_in_progress: AtomicBool::new(false),
            train_in_progress: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            scan_cancel: Mutex::new(Arc::new(AtomicBool::new(false))),
        })
    }

    pub fn scan_in_progress(&self) -> bool {
        self.scan_in_progress.load(Ordering::SeqCst)
    }

    pub fn train_in_progress(&self) -> bool {
        self.train_in_progress.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Request cooperative shutdown: stop the tick loop and cancel the
    /// scan in flight.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Ok(cancel) = self.scan_cancel.lock() {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    fn acquire(flag: &AtomicBool) -> bool {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Run one guarded scan; assumes the scan flag is held.
    async fn scan_locked(&self) {
        let cancel = Arc::new(AtomicBool::new(false));
        if let Ok(mut slot) = self.scan_cancel.lock() {
            *slot = Arc::clone(&cancel);
        }
        if self.is_shutting_down() {
            cancel.store(true, Ordering::SeqCst);
        }

        if let Err(e) = self.pipeline.run_scan(cancel).await {
            tracing::error!("Scan failed: {:#}", e);
            self.pipeline.bus.publish(
                format!("Scan failed: {:#}", e),
                NotificationKind::Danger,
                Priority::High,
                None,
            );
        }

        self.scan_in_progress.store(false, Ordering::SeqCst);
    }

    async fn train_locked(&self) {
        if let Err(e) = self.pipeline.run_training().await {
            tracing::error!("Training failed: {:#}", e);
            self.pipeline.bus.publish(
                format!("Model training failed: {:#}", e),
                NotificationKind::Warning,
                Priority::Medium,
                None,
            );
        }
        self.train_in_progress.store(false, Ordering::SeqCst);
    }

    /// Start a scan now, on its own task. Fails with `Busy` if one runs.
    pub fn trigger_scan(self: &Arc<Self>) -> Result<(), Busy> {
        if !Self::acquire(&self.scan_in_progress) {
            return Err(Busy);
        }
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.scan_locked().await;
        });
        Ok(())
    }

    /// Start a training batch now, on its own task.
    pub fn trigger_training(self: &Arc<Self>) -> Result<(), Busy> {
        if !Self::acquire(&self.train_in_progress) {
            return Err(Busy);
        }
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.train_locked().await;
        });
        Ok(())
    }

    /// Supervisor loop. Returns when shutdown is requested.
    pub async fn run(self: Arc<Self>) {
        let scan_interval = Duration::from_secs(self.pipeline.settings.scan_interval_secs);
        let mut next_scan = tokio::time::Instant::now();
        let mut next_train = next_daily_occurrence(self.pipeline.settings.training_hour);
        let mut next_report = next_daily_occurrence(self.pipeline.settings.report_hour);

        tracing::info!(
            "Scheduler started: scan every {}s, training daily at {:02}:00, reports daily at {:02}:00",
            scan_interval.as_secs(),
            self.pipeline.settings.training_hour,
            self.pipeline.settings.report_hour
        );

        while !self.is_shutting_down() {
            let now_instant = tokio::time::Instant::now();
            let now_local = Local::now();

            if now_instant >= next_scan {
                next_scan = now_instant + scan_interval;
                if Self::acquire(&self.scan_in_progress) {
                    self.scan_locked().await;
                } else {
                    tracing::warn!("Scan tick dropped: previous scan still in progress");
                }
            }

            if now_local >= next_train {
                next_train = next_daily_occurrence(self.pipeline.settings.training_hour);
                if Self::acquire(&self.train_in_progress) {
                    self.train_locked().await;
                } else {
                    tracing::warn!("Training tick dropped: previous batch still in progress");
                }
            }

            if now_local >= next_report {
                next_report = next_daily_occurrence(self.pipeline.settings.report_hour);
                tracing::info!("Report trigger fired");
                self.pipeline.bus.publish(
                    "Daily report due",
                    NotificationKind::Info,
                    Priority::Low,
                    None,
                );
            }

            tokio::time::sleep(TICK_POLL).await;
        }

        tracing::info!("Scheduler stopped");
    }
}

/// Next local occurrence of `hour`:00, strictly in the future.
fn next_daily_occurrence(hour: u32) -> DateTime<Local> {
    let now = Local::now();
    let today = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| now.naive_local());

    let candidate = match Local.from_local_datetime(&today).earliest() {
        Some(dt) => dt,
        None => now,
    };

    if candidate > now {
        candidate
    } else {
        let tomorrow = today + chrono::Duration::days(1);
        Local
            .from_local_datetime(&tomorrow)
            .earliest()
            .unwrap_or(now)
    }
}
