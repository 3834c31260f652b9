use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use tokio::sync::mpsc;
use wbc_lib::config::models::HttpSettings;
use wbc_lib::control::GatewayRegistry;
use wbc_lib::mqtt::{GatewayRequest, GetConfigsResponse, SinkConfigReport, SinkConfigUpdate};
use wbc_lib::routes::create_router;
use wbc_lib::state::AppState;

fn http_settings(test_mode: bool) -> HttpSettings {
    HttpSettings {
        host: "127.0.0.1".to_string(),
        port: 8000,
        debug_comms: true,
        test_mode,
    }
}

fn sink(sink_id: &str, node_address: u32, seq: u8) -> SinkConfigReport {
    SinkConfigReport {
        sink_id: Some(sink_id.to_string()),
        started: Some(true),
        app_config_seq: Some(seq),
        app_config_diag: Some(60),
        app_config_data: Some(vec![0x01, 0x02]),
        node_address: Some(node_address),
        network_address: Some(0x00ab_cdef),
    }
}

fn populated_registry() -> GatewayRegistry {
    let registry = GatewayRegistry::new();
    registry.apply(&GetConfigsResponse {
        gw_id: "gw-1".to_string(),
        configs: vec![sink("sink0", 100, 3), sink("sink1", 101, 254)],
    });
    registry.apply(&GetConfigsResponse {
        gw_id: "gw-2".to_string(),
        configs: vec![sink("sink0", 200, 1)],
    });
    registry
}

fn setup(
    registry: GatewayRegistry,
    test_mode: bool,
) -> (TestServer, mpsc::Receiver<GatewayRequest>) {
    let (tx, rx) = mpsc::channel(100);
    let state = Arc::new(AppState::new(&http_settings(test_mode), registry, Some(tx)));
    let server = TestServer::new(create_router(state)).expect("Failed to create TestServer");
    (server, rx)
}

fn drain(rx: &mut mpsc::Receiver<GatewayRequest>) -> Vec<GatewayRequest> {
    let mut requests = Vec::new();
    while let Ok(request) = rx.try_recv() {
        requests.push(request);
    }
    requests
}

#[tokio::test]
async fn test_health_check() {
    let (server, _rx) = setup(GatewayRegistry::new(), false);
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("Working!");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (server, _rx) = setup(GatewayRegistry::new(), false);
    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["paths"]["/health"].is_object());
    assert!(body["paths"]["/{command}"].is_object());
}

#[tokio::test]
async fn test_root_path_defaults_to_info() {
    let (server, mut rx) = setup(GatewayRegistry::new(), false);
    let response = server.get("/").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["command"], "info");
    assert_eq!(body["text"], "info ok!");
    assert_eq!(body["code"], 200);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_responses_disable_caching() {
    let (server, _rx) = setup(GatewayRegistry::new(), false);
    let response = server.get("/info").await;

    assert_eq!(
        response.header("cache-control"),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(response.header("pragma"), "no-cache");
    assert_eq!(response.header("expires"), "0");
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server.get("/reboot").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json();
    assert_eq!(body["text"], "Unknown command");
    assert_eq!(body["code"], 500);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_datatx_missing_field() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server
        .get("/datatx")
        .add_query_param("destination", "5")
        .add_query_param("source_ep", "1")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json();
    assert_eq!(body["text"], "Missing field: dest_ep");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_datatx_count_is_capped() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server
        .get("/datatx")
        .add_query_param("destination", "5")
        .add_query_param("source_ep", "1")
        .add_query_param("dest_ep", "2")
        .add_query_param("payload", "00")
        .add_query_param("count", "4294967295")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json();
    assert_eq!(body["text"], "Invalid field: count");
    assert_eq!(body["code"], 500);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_repeated_parameter_is_a_json_error() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server
        .get("/datatx")
        .add_raw_query_param("destination=5&source_ep=1&dest_ep=2&payload=00&count=1&count=2")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.header("cache-control"),
        "no-cache, no-store, must-revalidate"
    );

    let body: Value = response.json();
    assert_eq!(body["text"], "Invalid field: count");
    assert_eq!(body["command"], "datatx");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_datatx_is_sent_through_every_sink() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server
        .get("/datatx")
        .add_query_param("destination", "5")
        .add_query_param("source_ep", "1")
        .add_query_param("dest_ep", "2")
        .add_query_param("payload", "0a0b")
        .add_query_param("fast", "Yes")
        .add_query_param("count", "2")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["text"], "datatx ok!");
    assert_eq!(body["params"]["payload"], "0a0b");
    assert_eq!(body["gateways_and_sinks"]["gw-1"]["sink1"]["app_config_seq"], 254);

    let requests = drain(&mut rx);
    assert_eq!(requests.len(), 6);
    for request in &requests {
        match request {
            GatewayRequest::SendData {
                destination_address,
                payload,
                is_unack_csma_ca,
                hop_limit,
                ..
            } => {
                assert_eq!(*destination_address, 5);
                assert_eq!(payload, &vec![0x0a, 0x0b]);
                assert!(*is_unack_csma_ca);
                assert_eq!(*hop_limit, 0);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_datatx_to_a_sink_uses_only_that_sink() {
    let (server, mut rx) = setup(populated_registry(), false);
    server
        .post("/datatx")
        .add_query_param("destination", "200")
        .add_query_param("source_ep", "1")
        .add_query_param("dest_ep", "1")
        .add_query_param("payload", "ff")
        .await
        .assert_status_ok();

    let requests = drain(&mut rx);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].gw_id(), "gw-2");
}

#[tokio::test]
async fn test_setconfig_wraps_sequence_and_refreshes() {
    let (server, mut rx) = setup(populated_registry(), false);
    server
        .get("/setconfig")
        .add_query_param("data", "beef")
        .await
        .assert_status_ok();

    let requests = drain(&mut rx);
    // three set_config requests, then one get_configs per gateway
    assert_eq!(requests.len(), 5);

    let updates: Vec<&SinkConfigUpdate> = requests
        .iter()
        .filter_map(|request| match request {
            GatewayRequest::SetConfig { new_config, .. } => Some(new_config),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|update| update.app_config_data == Some(vec![0xbe, 0xef])));
    assert!(updates.iter().all(|update| update.app_config_diag == Some(60)));
    assert!(updates.iter().any(|update| update.app_config_seq == Some(1)));
    assert!(updates.iter().any(|update| update.app_config_seq == Some(4)));

    assert_eq!(
        requests[3..].to_vec(),
        vec![
            GatewayRequest::GetConfigs {
                gw_id: "gw-1".to_string()
            },
            GatewayRequest::GetConfigs {
                gw_id: "gw-2".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_info_lists_sinks_and_refreshes() {
    let (server, mut rx) = setup(populated_registry(), false);
    let response = server.get("/info").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let sinks = body["sinks"].as_array().unwrap();
    assert_eq!(sinks.len(), 3);
    assert_eq!(sinks[0]["gw_id"], "gw-1");
    assert_eq!(sinks[0]["node_address"], 100);

    let requests = drain(&mut rx);
    assert_eq!(requests.len(), 2);
    assert!(
        requests
            .iter()
            .all(|request| matches!(request, GatewayRequest::GetConfigs { .. }))
    );
}

#[tokio::test]
async fn test_test_mode_publishes_nothing() {
    let (server, mut rx) = setup(populated_registry(), true);
    let response = server.get("/stop").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["text"], "stop ok!");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_other_methods_are_not_allowed() {
    let (server, _rx) = setup(populated_registry(), false);
    server
        .delete("/start")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
