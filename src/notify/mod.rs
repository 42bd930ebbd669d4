//! Notification bus
//!
//! In-memory ring of recent notifications with monotonic ids. Overflow
//! evicts the oldest entry. Deliberately not persisted: alerts in the store
//! are the durable record, notifications are the live feed.

pub mod email;

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Priority;

/// Visual notification kinds, mirroring the dashboard styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Danger,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub device_ip: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

struct Ring {
    items: VecDeque<Notification>,
    next_id: u64,
}

/// Lock-guarded notification ring
pub struct NotificationBus {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                items: VecDeque::with_capacity(capacity),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        match self.ring.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Publish a notification; drops the oldest entry on overflow.
    pub fn publish(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        priority: Priority,
        device_ip: Option<String>,
    ) -> u64 {
        let mut ring = self.lock();
        let id = ring.next_id;
        ring.next_id += 1;

        let message = message.into();
        tracing::info!("Notification: {}", message);

        ring.items.push_back(Notification {
            id,
            message,
            kind,
            priority,
            device_ip,
            timestamp: Utc::now(),
            read: false,
        });

        while ring.items.len() > self.capacity {
            ring.items.pop_front();
        }

        id
    }

    /// Unread notifications, oldest first.
    pub fn unread(&self) -> Vec<Notification> {
        self.lock().items.iter().filter(|n| !n.read).cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().items.iter().filter(|n| !n.read).count()
    }

    /// The `k` most recent notifications, oldest first.
    pub fn recent(&self, k: usize) -> Vec<Notification> {
        let ring = self.lock();
        let skip = ring.items.len().saturating_sub(k);
        ring.items.iter().skip(skip).cloned().collect()
    }

    /// Full ring snapshot plus unread count, for the API surface.
    pub fn snapshot(&self) -> (Vec<Notification>, usize) {
        let ring = self.lock();
        let items: Vec<Notification> = ring.items.iter().cloned().collect();
        let unread = items.iter().filter(|n| !n.read).count();
        (items, unread)
    }

    /// Mark one notification read. Returns false for unknown ids.
    pub fn mark_read(&self, id: u64) -> bool {
        let mut ring = self.lock();
        for notification in ring.items.iter_mut() {
            if notification.id == id {
                notification.read = true;
                return true;
            }
        }
        false
    }

    pub fn clear(&self) {
        self.lock().items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> NotificationBus {
        NotificationBus::new(3)
    }

    #[test]
    fn test_ids_are_monotonic() {
        let bus = bus();
        let a = bus.publish("a", NotificationKind::Info, Priority::Low, None);
        let b = bus.publish("b", NotificationKind::Info, Priority::Low, None);
        assert!(b > a);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let bus = bus();
        for i in 0..5 {
            bus.publish(format!("n{}", i), NotificationKind::Info, Priority::Low, None);
        }
        let (items, _) = bus.snapshot();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].message, "n2");
        assert_eq!(items[2].message, "n4");
    }

    #[test]
    fn test_ids_keep_growing_after_eviction() {
        let bus = bus();
        for _ in 0..5 {
            bus.publish("x", NotificationKind::Info, Priority::Low, None);
        }
        let next = bus.publish("y", NotificationKind::Info, Priority::Low, None);
        assert_eq!(next, 6);
    }

    #[test]
    fn test_mark_read_and_unread_count() {
        let bus = bus();
        let id = bus.publish("a", NotificationKind::Warning, Priority::High, None);
        bus.publish("b", NotificationKind::Danger, Priority::Critical, None);

        assert_eq!(bus.unread_count(), 2);
        assert!(bus.mark_read(id));
        assert_eq!(bus.unread_count(), 1);
        assert!(!bus.mark_read(999));

        let unread = bus.unread();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "b");
    }

    #[test]
    fn test_recent_returns_tail() {
        let bus = NotificationBus::new(10);
        for i in 0..6 {
            bus.publish(format!("n{}", i), NotificationKind::Info, Priority::Low, None);
        }
        let recent = bus.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "n4");
        assert_eq!(recent[1].message, "n5");
    }

    #[test]
    fn test_clear_empties_ring() {
        let bus = bus();
        bus.publish("a", NotificationKind::Info, Priority::Low, None);
        bus.clear();
        let (items, unread) = bus.snapshot();
        assert!(items.is_empty());
        assert_eq!(unread, 0);
    }
}
