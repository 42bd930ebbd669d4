//! Alert generation
//!
//! Turns device state transitions and fresh assessments into deduplicated,
//! prioritized alerts, and fans them out to the store, the notification bus
//! and (best-effort) email.

pub mod generator;

pub use generator::{deliver_events, evaluate_device, AlertEvent};
