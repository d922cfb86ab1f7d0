//! REST client against a mock HTTP server

use crate::common::{at, clearance, init_tracing, test_config};
use mockito::{Matcher, Server};
use vcms_sync::client::{ApiClient, EntityApi};
use vcms_sync::shared::models::{Clearance, ClearanceChanges, ClearanceStatus};
use vcms_sync::shared::{PageRequest, SyncConfig, SyncError};

fn client(url: &str) -> ApiClient {
    init_tracing();
    ApiClient::new(&test_config(url)).unwrap()
}

#[tokio::test]
async fn test_list_sends_paging_and_filters() {
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "data": [clearance(1, ClearanceStatus::Pending), clearance(2, ClearanceStatus::Approved)],
        "totalItems": 12,
        "totalPages": 6,
        "currentPage": 1,
        "pageSize": 2,
        "hasNext": true,
        "hasPrevious": true
    });
    let mock = server
        .mock("GET", "/clearances")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("pageSize".into(), "2".into()),
            Matcher::UrlEncoded("status".into(), "PENDING".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let api = client(&server.url());
    let request = PageRequest::new(1, 2).with_status("PENDING");
    let page = assert_ok!(<ApiClient as EntityApi<Clearance>>::list(&api, &request).await);

    mock.assert_async().await;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.total_items, 12);
    assert!(page.has_next);
}

#[tokio::test]
async fn test_update_unwraps_envelope() {
    let mut server = Server::new_async().await;
    let mut approved = clearance(5, ClearanceStatus::Approved);
    approved.updated_at = at(9);
    let mock = server
        .mock("PUT", "/clearances/5")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJson(serde_json::json!({"status": "APPROVED"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({"data": approved, "status": "OK"}).to_string())
        .create_async()
        .await;

    let mut api = client(&server.url());
    api.set_auth_token(Some("secret".to_string()));
    let changes = ClearanceChanges {
        status: Some(ClearanceStatus::Approved),
        ..Default::default()
    };
    let updated = assert_ok!(<ApiClient as EntityApi<Clearance>>::update(&api, 5, &changes).await);

    mock.assert_async().await;
    assert_eq!(updated, approved);
}

#[tokio::test]
async fn test_conflict_status_maps_to_conflict() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/clearances/5")
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"clearance already reviewed"}"#)
        .create_async()
        .await;

    let api = client(&server.url());
    let result = <ApiClient as EntityApi<Clearance>>::update(&api, 5, &ClearanceChanges::default()).await;
    match result {
        Err(SyncError::Conflict { message }) => assert_contains!(message, "already reviewed"),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_and_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/clearances/3")
        .with_status(204)
        .create_async()
        .await;
    server
        .mock("DELETE", "/clearances/4")
        .with_status(503)
        .create_async()
        .await;

    let api = client(&server.url());
    assert_ok!(<ApiClient as EntityApi<Clearance>>::delete(&api, 3).await);
    assert_err!(
        <ApiClient as EntityApi<Clearance>>::delete(&api, 4).await,
        SyncError::Http { status: 503, .. }
    );
}

#[tokio::test]
async fn test_silent_server_times_out() {
    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hold connections without ever answering
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let config = SyncConfig::builder()
        .api_base_url(format!("http://{}", addr))
        .push_channel_url("ws://push.test/ws")
        .request_timeout_ms(200)
        .build()
        .unwrap();
    let api = ApiClient::new(&config).unwrap();

    let result = <ApiClient as EntityApi<Clearance>>::list(&api, &PageRequest::default()).await;
    match result {
        Err(SyncError::Timeout { operation, elapsed_ms }) => {
            assert_eq!(operation, "GET /clearances");
            assert_eq!(elapsed_ms, 200);
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    silent.abort();
}
