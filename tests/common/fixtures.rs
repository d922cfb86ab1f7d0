//! Entity builders and wiring shared by the integration suites

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use vcms_sync::client::sync::{Clock, ManualClock};
use vcms_sync::client::{ScriptedTransport, SyncContext};
use vcms_sync::shared::models::{
    BerthAllocation, BerthAllocationStatus, Clearance, ClearanceStatus, ClearanceType,
};
use vcms_sync::shared::SyncConfig;

/// 2024-03-01 at `hour`:00 UTC
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

pub fn allocation(id: i64, berth_id: i64, start: u32, end: u32) -> BerthAllocation {
    BerthAllocation {
        id,
        vessel_call_id: 100 + id,
        vessel_name: format!("Vessel {}", id),
        berth_id,
        berth_name: format!("Berth {}", berth_id),
        start_time: at(start),
        end_time: at(end),
        status: BerthAllocationStatus::Scheduled,
        created_at: at(0),
        updated_at: at(1),
    }
}

pub fn clearance(id: i64, status: ClearanceStatus) -> Clearance {
    Clearance {
        id,
        vessel_call_id: 7,
        vessel_name: "Nordic Star".to_string(),
        clearance_type: ClearanceType::Customs,
        status,
        reference_number: format!("CU-{}", id),
        submitted_by: "agent".to_string(),
        approved_by: None,
        remarks: None,
        submitted_at: at(1),
        approved_at: None,
        valid_until: None,
        created_at: at(1),
        updated_at: at(1),
    }
}

/// Fast timings: 1s base backoff, 3 retries, 30s heartbeat
pub fn test_config(api_base_url: &str) -> SyncConfig {
    SyncConfig::builder()
        .api_base_url(api_base_url)
        .push_channel_url("ws://push.test/ws")
        .reconnect_base_delay_ms(1000)
        .max_reconnect_attempts(3)
        .heartbeat_interval_ms(30_000)
        .request_timeout_ms(2_000)
        .build()
        .unwrap()
}

/// Context over a scripted channel and a manual clock
pub fn scripted_context(
    api_base_url: &str,
) -> (SyncContext<ScriptedTransport>, ScriptedTransport, ManualClock) {
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let context =
        SyncContext::with_transport(test_config(api_base_url), transport.clone(), shared).unwrap();
    (context, transport, clock)
}
