#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetcon_api::{DeviceClient, Error, TransportConfig};

async fn setup(token: Option<&str>) -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let token = token.map(|t| SecretString::from(t.to_owned()));
    let client = DeviceClient::new(&server.uri(), token.as_ref(), &TransportConfig::default())
        .unwrap();
    (server, client)
}

fn fleet() -> serde_json::Value {
    json!([
        { "id": "dev-1", "name": "edge-gw", "status": "online", "model": "EG-4" },
        { "id": "dev-2", "name": "lab-pi", "status": "offline", "site": "lab" }
    ])
}

// ── list_devices ────────────────────────────────────────────────────

#[tokio::test]
async fn list_devices_sends_bearer_token() {
    let (server, client) = setup(Some("tok-123")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fleet()))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "dev-1");
    assert_eq!(devices[0].model.as_deref(), Some("EG-4"));
    assert_eq!(devices[1].status.as_deref(), Some("offline"));
    assert_eq!(devices[1].extra.get("site"), Some(&json!("lab")));
}

#[tokio::test]
async fn list_devices_unwraps_items_envelope() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": fleet() })))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
}

#[tokio::test]
async fn unauthorized_is_authentication_error() {
    let (server, client) = setup(Some("stale")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
}

#[tokio::test]
async fn server_error_is_api_error_with_body() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_deserialization_error() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    let Error::Deserialization { body, .. } = err else {
        panic!("expected Deserialization error, got: {err:?}");
    };
    assert_eq!(body, "<html>proxy</html>");
}

// ── find_device ─────────────────────────────────────────────────────

#[tokio::test]
async fn find_device_by_id_or_name() {
    let (server, client) = setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fleet()))
        .mount(&server)
        .await;

    assert_eq!(client.find_device("dev-2").await.unwrap().id, "dev-2");
    assert_eq!(client.find_device("edge-gw").await.unwrap().id, "dev-1");

    let err = client.find_device("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, Error::DeviceNotFound { ref identifier } if identifier == "nope"));
}
