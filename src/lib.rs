//! LANWATCH Core Engine — Industrial LAN Supervision
//!
//! Continuous supervision of IP-reachable devices on local subnets:
//! - Network discovery and bounded-parallel host probing (ICMP/TCP/DNS/ARP)
//! - SQLite observation store with per-device history
//! - Per-device assessment: classification, anomaly detection, failure
//!   prediction, health scoring and recommendations
//! - Deduplicated, prioritized alerting with notification and email fan-out
//! - Single-writer scheduler for scan/training/report ticks
//! - HTTP API surface for the dashboard collaborator

pub mod ai;
pub mod alerts;
pub mod config;
pub mod discovery;
pub mod http;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod network;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod store;

pub use ai::{
    Assessment, AssessmentEngine, AssessmentInput, TrainingReport, TrainingSample,
};
pub use alerts::{deliver_events, evaluate_device, AlertEvent};
pub use config::{EmailSettings, Settings};
pub use models::{DeviceType, HostProbe, Priority, ScanSummary, Urgency};
pub use monitor::Scheduler;
pub use notify::{Notification, NotificationBus, NotificationKind};
pub use pipeline::Pipeline;
pub use probe::{ProbeConfig, ProbeEngine, Prober};
pub use store::{
    AlertKind, AlertRecord, AlertUpsert, Database, DeviceRecord, DeviceUpsert, NetworkStatistics,
    ObservationInsert, ObservationRecord,
};
