//! Whole-client flows: push channel, REST and notifications wired together

use crate::common::{at, clearance, init_tracing, scripted_context};
use mockito::Server;
use vcms_sync::client::connection::Activity;
use vcms_sync::client::{ConnectionState, Severity};
use vcms_sync::shared::models::{Clearance, ClearanceChanges, ClearanceStatus};
use vcms_sync::shared::{PageRequest, PushEventType, PushMessage, SyncError};

const TOPIC: &str = "entity-updates";

fn clearance_push(entity: &Clearance) -> PushMessage {
    PushMessage::new(
        PushEventType::ClearanceUpdate,
        serde_json::to_value(entity).unwrap(),
    )
}

#[tokio::test]
async fn test_bind_requires_connection() {
    init_tracing();
    let (mut context, _transport, _clock) = scripted_context("http://api.test");
    let clearances = context.collection::<Clearance>();

    assert_err!(context.bind(TOPIC, &clearances).await, SyncError::NotConnected { .. });
}

#[tokio::test]
async fn test_push_lands_in_bound_collection() {
    init_tracing();
    let (mut context, transport, _clock) = scripted_context("http://api.test");
    let clearances = context.collection::<Clearance>();
    assert_ok!(context.connect().await);
    assert_ok!(context.bind(TOPIC, &clearances).await);

    let mut approved = clearance(4, ClearanceStatus::Approved);
    approved.updated_at = at(3);
    transport.push_message(TOPIC, clearance_push(&approved));
    assert_eq!(context.connection_mut().run_once().await, Activity::Frame);

    assert_eq!(clearances.borrow().get(4), Some(&approved));

    let center = context.notifications();
    let mut center = center.borrow_mut();
    let first = center.next_delivery().unwrap();
    assert_eq!(first.severity, Severity::Success);
    assert_eq!(first.message, "CUSTOMS clearance for Nordic Star is APPROVED");
    assert!(first.persistent);

    transport.push_message(TOPIC, PushMessage::deletion(PushEventType::ClearanceUpdate, 4));
    drop(center);
    assert_eq!(context.connection_mut().run_once().await, Activity::Frame);
    assert!(clearances.borrow().store().is_empty());
}

#[tokio::test]
async fn test_pushes_for_other_types_are_ignored() {
    init_tracing();
    let (mut context, transport, _clock) = scripted_context("http://api.test");
    let clearances = context.collection::<Clearance>();
    assert_ok!(context.connect().await);
    assert_ok!(context.bind(TOPIC, &clearances).await);

    transport.push_message(
        TOPIC,
        PushMessage::new(PushEventType::VesselUpdate, serde_json::json!({"id": 9})),
    );
    assert_eq!(context.connection_mut().run_once().await, Activity::Frame);
    assert!(clearances.borrow().store().is_empty());
}

#[tokio::test]
async fn test_status_changes_raise_notifications() {
    init_tracing();
    let (mut context, transport, _clock) = scripted_context("http://api.test");
    transport.fail_next_opens(1);

    assert_err!(context.connect().await, SyncError::Connection { .. });
    assert_eq!(context.connection().state(), ConnectionState::Reconnecting);

    let center = context.notifications();
    let queued: Vec<String> = center.borrow().peek_queue().map(|n| n.message.clone()).collect();
    assert_eq!(queued.len(), 1);
    assert_contains!(queued[0], "attempt 1");
}

#[tokio::test]
async fn test_rejected_update_rolls_back_after_load() {
    init_tracing();
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "data": [clearance(5, ClearanceStatus::InProgress)],
        "totalItems": 1
    });
    server
        .mock("GET", "/clearances")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;
    server
        .mock("PUT", "/clearances/5")
        .with_status(409)
        .with_body(r#"{"message":"reviewed elsewhere"}"#)
        .create_async()
        .await;

    let (context, _transport, _clock) = scripted_context(&server.url());
    let clearances = context.collection::<Clearance>();
    assert_ok!(context.load(&clearances, &PageRequest::default()).await);
    assert_eq!(clearances.borrow().store().len(), 1);

    let changes = ClearanceChanges {
        status: Some(ClearanceStatus::Approved),
        ..Default::default()
    };
    assert_err!(context.update(&clearances, 5, changes).await, SyncError::Conflict { .. });

    let collection = clearances.borrow();
    assert_eq!(collection.get(5).unwrap().status, ClearanceStatus::InProgress);
    assert!(!collection.store().has_pending(5));

    let center = context.notifications();
    let errors = center
        .borrow()
        .peek_queue()
        .filter(|n| n.severity == Severity::Error)
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_confirmed_create_takes_server_id() {
    init_tracing();
    let mut server = Server::new_async().await;
    let mut created = clearance(42, ClearanceStatus::Pending);
    created.updated_at = at(2);
    server
        .mock("POST", "/clearances")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "data": created }).to_string())
        .create_async()
        .await;

    let (context, _transport, _clock) = scripted_context(&server.url());
    let clearances = context.collection::<Clearance>();
    let draft = clearance(0, ClearanceStatus::Pending);

    let confirmed = assert_ok!(context.create(&clearances, draft).await);
    assert_eq!(confirmed.id, 42);

    let collection = clearances.borrow();
    assert_eq!(collection.store().ids(), &[42]);
    assert_eq!(collection.store().pending_count(), 0);
}

#[tokio::test]
async fn test_push_during_update_is_rebased_under_local_change() {
    init_tracing();
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "data": [clearance(5, ClearanceStatus::InProgress)],
        "totalItems": 1
    });
    server
        .mock("GET", "/clearances")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let mut remote = clearance(5, ClearanceStatus::InProgress);
    remote.remarks = Some("awaiting port health".to_string());
    remote.updated_at = at(4);
    let mut saved = remote.clone();
    saved.status = ClearanceStatus::Approved;
    saved.updated_at = at(5);
    server
        .mock("PUT", "/clearances/5")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "data": saved }).to_string())
        .create_async()
        .await;

    let (mut context, transport, _clock) = scripted_context(&server.url());
    let clearances = context.collection::<Clearance>();
    assert_ok!(context.connect().await);
    assert_ok!(context.bind(TOPIC, &clearances).await);
    assert_ok!(context.load(&clearances, &PageRequest::default()).await);

    let changes = ClearanceChanges {
        status: Some(ClearanceStatus::Approved),
        ..Default::default()
    };
    let update = context.update(&clearances, 5, changes);
    tokio::pin!(update);
    assert!(futures_util::poll!(&mut update).is_pending());
    assert!(clearances.borrow().store().has_pending(5));

    transport.push_message(TOPIC, clearance_push(&remote));
    assert_eq!(context.connection_mut().run_once().await, Activity::Frame);
    {
        let collection = clearances.borrow();
        let visible = collection.get(5).unwrap();
        assert_eq!(visible.status, ClearanceStatus::Approved);
        assert_eq!(visible.remarks.as_deref(), Some("awaiting port health"));
        assert!(collection.store().has_pending(5));
    }

    let confirmed = assert_ok!(update.await);
    assert_eq!(confirmed, saved);
    let collection = clearances.borrow();
    assert_eq!(collection.get(5), Some(&saved));
    assert!(!collection.store().has_pending(5));
}
