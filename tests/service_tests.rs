//! Tests against live MySQL and Mosquitto containers. Run with
//! `cargo test -- --ignored`.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mosquitto::Mosquitto;
use testcontainers_modules::mysql::Mysql;
use tokio::sync::mpsc;
use wbc_lib::config::models::{MqttSettings, MySqlSettings};
use wbc_lib::messages::{AdvertiserMessage, Message, ReceivedData};
use wbc_lib::storage::schema::TABLES;
use wbc_lib::mqtt::MqttObserver;
use wbc_lib::runtime::ExitSignal;
use wbc_lib::storage::{MessageStore, MySqlStore};

async fn setup_store() -> (MySqlStore, ContainerAsync<Mysql>) {
    let container = Mysql::default()
        .start()
        .await
        .expect("Failed to start MySQL container");
    let port = container
        .get_host_port_ipv4(3306)
        .await
        .expect("Failed to get container port");

    let settings = MySqlSettings {
        hostname: Some("127.0.0.1".to_string()),
        port,
        username: Some("root".to_string()),
        password: Some(String::new()),
        database: Some("test".to_string()),
        workers: 2,
        parallel: true,
    };
    let store = MySqlStore::connect(&settings)
        .await
        .expect("Failed to connect to test DB");
    (store, container)
}

fn received_data(source_endpoint: u8, payload: Vec<u8>) -> ReceivedData {
    ReceivedData {
        gw_id: "gw-1".to_string(),
        sink_id: "sink0".to_string(),
        network_id: 0x00ab_cdef,
        source_address: 42,
        destination_address: 1,
        source_endpoint,
        destination_endpoint: source_endpoint,
        qos: 1,
        travel_time_ms: 120,
        rx_time_ms_epoch: 1_570_000_000_000,
        hop_count: Some(3),
        data_payload: payload,
    }
}

async fn count(store: &MySqlStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_create_tables_is_idempotent() {
    let (store, _container) = setup_store().await;
    store.create_tables().await.unwrap();
    store.create_tables().await.unwrap();

    for (table, _) in TABLES {
        count(&store, table).await;
    }
    assert!(store.has_column("received_packets", "hop_count").await.unwrap());
    assert!(count(&store, "diagnostic_event_codes").await > 0);
}

#[tokio::test]
#[ignore]
async fn test_received_packet_insert() {
    let (store, _container) = setup_store().await;
    store.create_tables().await.unwrap();

    let first = store
        .put_to_received_packets(&received_data(1, vec![1, 2, 3]))
        .await
        .unwrap();
    let second = store
        .put_to_received_packets(&received_data(1, vec![4]))
        .await
        .unwrap();
    assert!(second > first);

    let (num_bytes, hop_count): (u16, Option<u16>) =
        sqlx::query_as("SELECT num_bytes, hop_count FROM received_packets WHERE id = ?")
            .bind(first)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(num_bytes, 3);
    assert_eq!(hop_count, Some(3));
}

#[tokio::test]
#[ignore]
async fn test_advertiser_samples_are_stored() {
    let (store, _container) = setup_store().await;
    store.create_tables().await.unwrap();

    let payload = vec![0x02, 0x00, 1, 0, 0, 200, 2, 0, 0, 0, 1, 0, 0, 180];
    let message = AdvertiserMessage::decode(received_data(200, payload)).unwrap();
    let inserted = store.put_advertiser(std::slice::from_ref(&message)).await.unwrap();
    assert_eq!(inserted, 3);

    store.store(&Message::Advertiser(message)).await.unwrap();
    assert_eq!(count(&store, "advertiser").await, 6);
    assert_eq!(count(&store, "received_packets").await, 0);
}

/// A client standing in for a gateway: publishes events and collects the
/// requests addressed to the gateways.
async fn gateway_client(port: u16) -> (AsyncClient, mpsc::UnboundedReceiver<rumqttc::Publish>) {
    let options = MqttOptions::new("gateway-stub", "127.0.0.1", port);
    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if tx.send(publish).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    });
    client
        .subscribe("gw-request/#", QoS::ExactlyOnce)
        .await
        .unwrap();
    (client, rx)
}

#[tokio::test]
#[ignore]
async fn test_observer_against_mosquitto() {
    let container = Mosquitto::default()
        .start()
        .await
        .expect("Failed to start Mosquitto container");
    let port = container
        .get_host_port_ipv4(1883)
        .await
        .expect("Failed to get container port");

    let exit = ExitSignal::new();
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();
    let (configs_tx, _configs_rx) = mpsc::unbounded_channel();
    let settings = MqttSettings {
        hostname: Some("127.0.0.1".to_string()),
        port: Some(port),
        force_unsecure: true,
        ..Default::default()
    };
    let observer = MqttObserver::new(settings, exit.clone())
        .with_messages(message_tx)
        .with_configs(configs_tx);
    let handle = tokio::spawn(observer.run());
    let (gateway, mut requests) = gateway_client(port).await;

    let payload = serde_json::json!({
        "gw_id": "gw-1",
        "sink_id": "sink0",
        "network_id": 100,
        "source_address": 42,
        "destination_address": 1,
        "source_endpoint": 200,
        "destination_endpoint": 200,
        "rx_time_ms_epoch": 1_570_000_000_000u64,
        "data_payload": "0200010000c8",
    })
    .to_string();

    // Until the observer has subscribed, publishes are lost.
    let message = tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            gateway
                .publish(
                    "gw-event/received_data/gw-1/sink0/100/200/200",
                    QoS::AtLeastOnce,
                    false,
                    payload.clone(),
                )
                .await
                .unwrap();
            if let Ok(Some(message)) =
                tokio::time::timeout(Duration::from_millis(500), message_rx.recv()).await
            {
                return message;
            }
        }
    })
    .await
    .expect("observer never forwarded a packet");
    assert!(matches!(message, Message::Advertiser(_)));

    gateway
        .publish(
            "gw-event/status/gw-1",
            QoS::AtLeastOnce,
            false,
            r#"{"gw_id":"gw-1","state":"ONLINE"}"#,
        )
        .await
        .unwrap();
    let request = tokio::time::timeout(Duration::from_secs(10), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.topic, "gw-request/get_configs/gw-1");
    assert_eq!(request.qos, QoS::ExactlyOnce);

    exit.set();
    assert!(handle.await.unwrap().is_ok());
}
