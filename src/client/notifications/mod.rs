//! # Notification Center
//!
//! Queues user-facing alerts and hands them out one at a time.
//!
//! ## Features
//!
//! - **De-duplication**: the same (message, severity) raised again inside
//!   the dedupe window is dropped; the key history holds the 50 most recent keys
//! - **Priority**: higher priority first, arrival order within a priority
//! - **Serial delivery**: the next notification is only handed out after
//!   the previous one was acknowledged, and each is acknowledged once
//! - **Visibility**: persistent notifications stay until dismissed,
//!   transient ones expire after the configured duration
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use vcms_sync::client::notifications::{NotificationCenter, NotificationRequest, Severity};
//! use vcms_sync::client::sync::ManualClock;
//! use vcms_sync::shared::SyncConfig;
//!
//! let mut center = NotificationCenter::new(&SyncConfig::default(), Arc::new(ManualClock::new()));
//! center.notify(NotificationRequest::new("Connected", Severity::Info));
//!
//! let delivered = center.next_delivery().unwrap();
//! center.acknowledge(delivered.id).unwrap();
//! ```

pub mod policy;

pub use policy::{connection_notification, notice_notification, push_notification};

use crate::client::sync::scheduler::Clock;
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Size of the de-duplication key history
pub const DEDUPE_HISTORY_LIMIT: usize = 50;

/// Priority used when a request does not set one
pub const DEFAULT_PRIORITY: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// What a caller asks the center to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub priority: u8,
    pub persistent: bool,
}

impl NotificationRequest {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: None,
            message: message.into(),
            severity,
            priority: DEFAULT_PRIORITY,
            persistent: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

/// A queued or delivered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: Option<String>,
    pub message: String,
    pub severity: Severity,
    pub priority: u8,
    pub persistent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Shown {
    notification: Notification,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
pub struct NotificationCenter {
    clock: Arc<dyn Clock>,
    enabled: bool,
    duration: Duration,
    dedupe_window: Duration,
    /// (message, severity) keys with the instant they were last raised, oldest first
    history: VecDeque<((String, Severity), Instant)>,
    queue: VecDeque<Notification>,
    in_flight: Option<Uuid>,
    shown: Vec<Shown>,
}

impl NotificationCenter {
    pub fn new(config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            enabled: true,
            duration: config.notification_duration(),
            dedupe_window: config.dedupe_window(),
            history: VecDeque::with_capacity(DEDUPE_HISTORY_LIMIT),
            queue: VecDeque::new(),
            in_flight: None,
            shown: Vec::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        tracing::info!("[Notify] Notifications {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queue a notification. Returns `None` when disabled or de-duplicated.
    pub fn notify(&mut self, request: NotificationRequest) -> Option<Uuid> {
        if !self.enabled {
            tracing::debug!("[Notify] Disabled, dropping '{}'", request.message);
            return None;
        }

        let now = self.clock.now();
        let key = (request.message.clone(), request.severity);
        if let Some(pos) = self.history.iter().position(|(k, _)| *k == key) {
            let last = self.history[pos].1;
            if now.saturating_duration_since(last) < self.dedupe_window {
                tracing::debug!("[Notify] Suppressing duplicate '{}' ({})", key.0, key.1);
                return None;
            }
            self.history.remove(pos);
        }
        self.history.push_back((key, now));
        while self.history.len() > DEDUPE_HISTORY_LIMIT {
            self.history.pop_front();
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            title: request.title,
            message: request.message,
            severity: request.severity,
            priority: request.priority,
            persistent: request.persistent,
            created_at: Utc::now(),
        };
        let id = notification.id;

        // Insert based on priority (higher priority first, FIFO within a level)
        let position = self
            .queue
            .iter()
            .position(|queued| queued.priority < notification.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(position, notification);
        Some(id)
    }

    /// Hand out the next notification, unless one is still unacknowledged
    pub fn next_delivery(&mut self) -> Option<Notification> {
        if self.in_flight.is_some() {
            return None;
        }
        let notification = self.queue.pop_front()?;
        let expires_at = if notification.persistent {
            None
        } else {
            Some(self.clock.now() + self.duration)
        };
        self.in_flight = Some(notification.id);
        self.shown.push(Shown {
            notification: notification.clone(),
            expires_at,
        });
        Some(notification)
    }

    /// Acknowledge the delivered notification
    pub fn acknowledge(&mut self, id: Uuid) -> Result<(), SyncError> {
        match self.in_flight {
            Some(current) if current == id => {
                self.in_flight = None;
                Ok(())
            }
            _ => Err(SyncError::validation(
                "notification",
                format!("{} is not awaiting acknowledgement", id),
            )),
        }
    }

    /// Remove a notification from the visible list
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.shown.len();
        self.shown.retain(|s| s.notification.id != id);
        self.shown.len() != before
    }

    /// Delivered notifications that are still on screen, oldest first
    pub fn visible(&self) -> Vec<&Notification> {
        let now = self.clock.now();
        self.shown
            .iter()
            .filter(|s| s.expires_at.map_or(true, |at| at > now))
            .map(|s| &s.notification)
            .collect()
    }

    /// Forget expired transient notifications
    pub fn prune_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.shown.len();
        self.shown
            .retain(|s| s.expires_at.map_or(true, |at| at > now));
        before - self.shown.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn peek_queue(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    pub fn awaiting_ack(&self) -> Option<Uuid> {
        self.in_flight
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop everything queued and shown; history is kept
    pub fn clear(&mut self) {
        self.queue.clear();
        self.shown.clear();
        self.in_flight = None;
    }
}
