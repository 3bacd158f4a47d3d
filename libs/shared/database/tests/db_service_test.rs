use std::time::Duration;

use assert_matches::assert_matches;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{DbError, DbServiceClient};

fn config_for(server: &MockServer, timeout_ms: u64) -> AppConfig {
    AppConfig {
        database_service_url: server.uri(),
        jwt_secret: "test-secret".to_string(),
        request_timeout_ms: timeout_ms,
        port: 3000,
        embedded_seed_path: String::new(),
    }
}

#[tokio::test]
async fn test_unwraps_success_envelope() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "_id": "u1", "name": "Ada" }
        })))
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 1_000)).unwrap();
    let user: Value = client.request(Method::GET, "/api/users/u1", None).await.unwrap();

    assert_eq!(user["name"], "Ada");
}

#[tokio::test]
async fn test_maps_not_found_and_conflict_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/doctors/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "Doctor not found"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/doctors/d1/slots/reserve"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "message": "Slot already held"
        })))
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 1_000)).unwrap();

    let missing = client.request::<Value>(Method::GET, "/api/doctors/missing", None).await;
    assert_matches!(missing, Err(DbError::NotFound(msg)) if msg == "Doctor not found");

    let taken = client
        .request::<Value>(Method::POST, "/api/doctors/d1/slots/reserve", Some(json!({})))
        .await;
    assert_matches!(taken, Err(DbError::Conflict(_)));
}

#[tokio::test]
async fn test_maps_precondition_failed_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/doctors/d1/slots/reserve"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "success": false,
            "message": "Doctor not available"
        })))
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 1_000)).unwrap();

    let result = client
        .request::<Value>(Method::POST, "/api/doctors/d1/slots/reserve", Some(json!({})))
        .await;
    assert_matches!(result, Err(DbError::PreconditionFailed(msg)) if msg == "Doctor not available");
}

#[tokio::test]
async fn test_success_false_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "validation failed"
        })))
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 1_000)).unwrap();
    let result = client
        .request::<Value>(Method::POST, "/api/appointments", Some(json!({})))
        .await;

    assert_matches!(result, Err(DbError::Rejected(msg)) if msg == "validation failed");
}

#[tokio::test]
async fn test_slow_response_times_out_without_leaking_address() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "data": {} }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 50)).unwrap();
    let result = client.request::<Value>(Method::GET, "/api/users/slow", None).await;

    let err = result.unwrap_err();
    assert_matches!(err, DbError::Timeout);
    assert!(!err.to_string().contains(&mock_server.uri()));
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = DbServiceClient::new(&config_for(&mock_server, 1_000)).unwrap();
    let result = client.request::<Value>(Method::GET, "/api/users/u1", None).await;

    assert_matches!(result, Err(DbError::Status { status: 503, message }) if message == "maintenance");
}
