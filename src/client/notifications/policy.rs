//! Mapping from connection changes, push messages and reconciliation
//! notices to notification requests.

use super::{NotificationRequest, Severity};
use crate::client::connection::state::{ConnectionState, StatusChange};
use crate::client::store::SyncNotice;
use crate::client::sync::conflict_resolver::ConflictReason;
use crate::shared::event::{PushEventType, PushMessage};

/// Notification for a connection state change; `Connecting` raises none
pub fn connection_notification(change: &StatusChange) -> Option<NotificationRequest> {
    let request = match change.to {
        ConnectionState::Connecting => return None,
        ConnectionState::Connected => {
            NotificationRequest::new("Real-time updates connected", Severity::Info)
                .title("Connection")
                .priority(3)
        }
        ConnectionState::Reconnecting => NotificationRequest::new(
            format!("Connection lost, reconnecting (attempt {})", change.attempt),
            Severity::Info,
        )
        .title("Connection")
        .priority(1),
        ConnectionState::Disconnected => {
            NotificationRequest::new("Real-time updates disconnected", Severity::Warning)
                .title("Connection")
                .priority(5)
                .persistent(true)
        }
        ConnectionState::Error => NotificationRequest::new(
            "Real-time updates unavailable; reconnect manually",
            Severity::Warning,
        )
        .title("Connection")
        .priority(5)
        .persistent(true),
    };
    Some(request)
}

fn payload_str<'a>(message: &'a PushMessage, field: &str) -> Option<&'a str> {
    message.payload.get(field).and_then(|v| v.as_str())
}

/// Notification for a remote change
pub fn push_notification(message: &PushMessage) -> NotificationRequest {
    let vessel = payload_str(message, "vesselName").unwrap_or("Unknown vessel");
    let status = payload_str(message, "status").unwrap_or("UPDATED");
    match message.event_type {
        PushEventType::VesselUpdate => {
            NotificationRequest::new(format!("{} is now {}", vessel, status), Severity::Info)
                .title("Vessel Update")
                .priority(3)
        }
        PushEventType::BerthChange => {
            let berth = payload_str(message, "berthName").unwrap_or("berth");
            NotificationRequest::new(
                format!("{} allocation at {} changed ({})", vessel, berth, status),
                Severity::Warning,
            )
            .title("Berth Change")
            .priority(4)
        }
        PushEventType::ServiceStatus => {
            let service = payload_str(message, "serviceType").unwrap_or("Service");
            NotificationRequest::new(
                format!("{} for {} is {}", service, vessel, status),
                Severity::Info,
            )
            .title("Service Status")
            .priority(3)
        }
        PushEventType::ClearanceUpdate => {
            let kind = payload_str(message, "type").unwrap_or("Clearance");
            NotificationRequest::new(
                format!("{} clearance for {} is {}", kind, vessel, status),
                Severity::Success,
            )
            .title("Clearance Update")
            .priority(5)
            .persistent(true)
        }
    }
}

/// Notification for a reconciliation side effect
pub fn notice_notification(notice: &SyncNotice) -> NotificationRequest {
    match notice {
        SyncNotice::ConflictDetected { kind, record } => {
            let ConflictReason::TimeOverlap { resource } = &record.reason;
            NotificationRequest::new(
                format!("{} {} and {} overlap on {}", kind, record.a, record.b, resource),
                Severity::Warning,
            )
            .title("Scheduling Conflict")
            .priority(4)
            .persistent(true)
        }
        SyncNotice::ConflictCleared { kind, record } => NotificationRequest::new(
            format!("{} {} and {} no longer overlap", kind, record.a, record.b),
            Severity::Info,
        )
        .title("Conflict Resolved")
        .priority(2),
        SyncNotice::MutationRejected { kind, id, reason } => NotificationRequest::new(
            format!("Change to {} {} was rejected: {}", kind, id, reason),
            Severity::Error,
        )
        .title("Update Failed")
        .priority(5)
        .persistent(true),
    }
}
