//! Push channel lifecycle over a scripted transport

use crate::common::init_tracing;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use vcms_sync::client::connection::{Activity, ConnectionManager, Frame, StatusChange, TransportError};
use vcms_sync::client::sync::ManualClock;
use vcms_sync::client::{ConnectionState, ScriptedTransport};
use vcms_sync::shared::{PushEventType, PushMessage, SyncError};

fn manager() -> (ConnectionManager<ScriptedTransport>, ScriptedTransport, ManualClock) {
    init_tracing();
    let transport = ScriptedTransport::new();
    let clock = ManualClock::new();
    let manager = ConnectionManager::with_clock(
        transport.clone(),
        &crate::common::test_config("http://api.test"),
        Arc::new(clock.clone()),
    );
    (manager, transport, clock)
}

fn record(manager: &mut ConnectionManager<ScriptedTransport>) -> Rc<RefCell<Vec<StatusChange>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    manager.on_status(move |change| sink.borrow_mut().push(*change));
    seen
}

#[tokio::test]
async fn test_backoff_doubles_until_budget_is_spent() {
    let (mut manager, transport, clock) = manager();
    let changes = record(&mut manager);
    transport.fail_next_opens(4);

    assert_err!(manager.connect().await, SyncError::Connection { .. });

    for delay_ms in [1000u64, 2000, 4000] {
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        clock.advance(Duration::from_millis(delay_ms - 1));
        assert_eq!(manager.fire_due_timers().await, 0, "fired early at {}ms", delay_ms - 1);
        clock.advance(Duration::from_millis(1));
        assert_eq!(manager.fire_due_timers().await, 1);
    }

    assert_eq!(manager.state(), ConnectionState::Error);
    assert!(!manager.reconnect_pending());
    assert_eq!(transport.open_count(), 4);

    let retries: Vec<u32> = changes
        .borrow()
        .iter()
        .filter(|c| c.to == ConnectionState::Reconnecting)
        .map(|c| c.attempt)
        .collect();
    assert_eq!(retries, vec![1, 2, 3]);
    assert_eq!(changes.borrow().last().map(|c| c.to), Some(ConnectionState::Error));
}

#[tokio::test]
async fn test_connect_after_error_starts_a_new_budget() {
    let (mut manager, transport, clock) = manager();
    transport.fail_next_opens(4);
    let _ = manager.connect().await;
    for delay_ms in [1000u64, 2000, 4000] {
        clock.advance(Duration::from_millis(delay_ms));
        manager.fire_due_timers().await;
    }
    assert_eq!(manager.state(), ConnectionState::Error);

    assert_ok!(manager.connect().await);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.attempts(), 0);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (mut manager, transport, _clock) = manager();
    let changes = record(&mut manager);

    assert_ok!(manager.connect().await);
    assert_ok!(manager.connect().await);
    assert_ok!(manager.connect().await);

    assert_eq!(transport.open_count(), 1);
    let connected = changes
        .borrow()
        .iter()
        .filter(|c| c.to == ConnectionState::Connected)
        .count();
    assert_eq!(connected, 1);
}

#[tokio::test]
async fn test_subscriptions_survive_reconnect() {
    let (mut manager, transport, clock) = manager();
    assert_ok!(manager.connect().await);

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    assert_ok!(
        manager
            .subscribe("entity-updates", PushEventType::ClearanceUpdate, move |m| {
                sink.borrow_mut().push(m.id.clone())
            })
            .await
    );
    transport.take_sent();

    transport.push_error(TransportError::Closed);
    assert_eq!(manager.run_once().await, Activity::ChannelLost);
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    clock.advance(Duration::from_millis(1000));
    assert_eq!(manager.fire_due_timers().await, 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(transport.sent().contains(&Frame::Subscribe {
        topic: "entity-updates".to_string()
    }));

    let mut message = PushMessage::new(PushEventType::ClearanceUpdate, serde_json::json!({"id": 1}));
    message.id = "after-reconnect".to_string();
    transport.push_message("entity-updates", message);
    assert_eq!(manager.run_once().await, Activity::Frame);
    assert_eq!(*received.borrow(), vec!["after-reconnect".to_string()]);
}

#[tokio::test]
async fn test_unsubscribe_announces_only_when_topic_is_unused() {
    let (mut manager, transport, _clock) = manager();
    assert_ok!(manager.connect().await);

    let first = assert_ok!(manager.subscribe("entity-updates", PushEventType::BerthChange, |_| {}).await);
    let second = assert_ok!(manager.subscribe("entity-updates", PushEventType::VesselUpdate, |_| {}).await);
    let subscribes = transport
        .take_sent()
        .into_iter()
        .filter(|f| matches!(f, Frame::Subscribe { .. }))
        .count();
    assert_eq!(subscribes, 1);

    assert!(manager.unsubscribe(first).await);
    assert!(transport.take_sent().is_empty());
    assert!(manager.unsubscribe(second).await);
    assert_eq!(
        transport.take_sent(),
        vec![Frame::Unsubscribe {
            topic: "entity-updates".to_string()
        }]
    );
    assert!(!manager.unsubscribe(second).await);
    assert!(manager.active_topics().is_empty());
}

#[tokio::test]
async fn test_disconnect_stops_pending_retry() {
    let (mut manager, transport, clock) = manager();
    transport.fail_next_opens(1);
    let _ = manager.connect().await;
    assert!(manager.reconnect_pending());

    manager.disconnect().await;
    clock.advance(Duration::from_secs(60));
    assert_eq!(manager.fire_due_timers().await, 0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_count(), 1);
}
