use std::collections::HashSet;
use std::time::Duration;

use chrono::Local;
use serde_json::Value;
use tokio::sync::mpsc;
use wbc_lib::config::models::InventorySettings;
use wbc_lib::config::Settings;
use wbc_lib::inventory::{
    fetch_reports, report_path, write_run_information, AdvertiserManager, InventoryTargets,
};
use wbc_lib::messages::Message;
use wbc_lib::mqtt::{route_publish, Incoming};
use wbc_lib::runtime::ExitSignal;

fn advertiser_publish(payload: &str) -> Vec<u8> {
    serde_json::json!({
        "gw_id": "gw-1",
        "sink_id": "sink0",
        "network_id": 100,
        "source_address": 42,
        "destination_address": 1,
        "source_endpoint": 200,
        "destination_endpoint": 200,
        "travel_time_ms": 15,
        "rx_time_ms_epoch": 1_570_000_000_000u64,
        "data_payload": payload,
    })
    .to_string()
    .into_bytes()
}

fn decode(payload: &str) -> Message {
    let allowed: HashSet<u8> = [200].into_iter().collect();
    match route_publish(
        "gw-event/received_data/gw-1/sink0/100/200/200",
        &advertiser_publish(payload),
        &allowed,
    )
    .unwrap()
    {
        Incoming::Message(message) => message,
        other => panic!("unexpected {:?}", other),
    }
}

fn settings(duration_secs: u64) -> InventorySettings {
    InventorySettings {
        duration_secs,
        delay_secs: Some(0),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_inventory_completes_from_broker_payloads() {
    let (tx, rx) = mpsc::unbounded_channel();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let targets = InventoryTargets {
        nodes: [1, 2, 3].into_iter().collect(),
        ..Default::default()
    };
    let manager = AdvertiserManager::new(
        targets,
        &settings(30),
        Duration::ZERO,
        rx,
        report_tx,
        ExitSignal::new(),
    )
    .with_poll_timeout(Duration::from_millis(20));
    let handle = tokio::spawn(manager.run(1));

    tokio::time::sleep(Duration::from_millis(50)).await;
    // otap sequence 7 from nodes 1 and 2
    tx.send(decode("03000100000702000007")).unwrap();
    // rss from node 3
    tx.send(decode("0200030000c8")).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), report_rx.recv())
        .await
        .unwrap()
        .unwrap();
    handle.await.unwrap();

    assert_eq!(report.title, "test_advertiser:0");
    assert!(report.difference.is_empty());
    assert_eq!(report.observed_total, 3);
    assert_eq!(report.observed[&1].otap, Some(7));
    assert_eq!(report.observed[&3].rss, Some(-27.0));
    assert_eq!(report.frequency_by_value.get(&1), Some(&3));
}

#[tokio::test]
async fn test_non_advertiser_endpoint_is_ignored() {
    let allowed: HashSet<u8> = [200].into_iter().collect();
    let payload = serde_json::json!({
        "gw_id": "gw-1",
        "sink_id": "sink0",
        "network_id": 100,
        "source_address": 42,
        "destination_address": 1,
        "source_endpoint": 10,
        "destination_endpoint": 10,
        "rx_time_ms_epoch": 1u64,
        "data_payload": "00",
    })
    .to_string();

    let routed = route_publish(
        "gw-event/received_data/gw-1/sink0/100/10/10",
        payload.as_bytes(),
        &allowed,
    )
    .unwrap();
    assert!(matches!(routed, Incoming::Ignored));
}

#[tokio::test]
async fn test_fetch_reports_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");

    let (tx, rx) = mpsc::unbounded_channel();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let manager = AdvertiserManager::new(
        InventoryTargets::default(),
        &settings(0),
        Duration::ZERO,
        rx,
        report_tx,
        ExitSignal::new(),
    )
    .with_poll_timeout(Duration::from_millis(10));
    tokio::spawn(manager.run(2));

    let reports = fetch_reports(
        &mut report_rx,
        Duration::from_secs(5),
        2,
        &ExitSignal::new(),
        &output,
    )
    .await
    .unwrap();
    drop(tx);
    assert_eq!(reports.len(), 2);

    let written: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(written["0"]["title"], "test_advertiser:0");
    assert_eq!(written["1"]["title"], "test_advertiser:1");
    assert_eq!(written["1"]["observed_total"], 0);
}

#[tokio::test]
async fn test_fetch_reports_stops_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");
    let (_report_tx, mut report_rx) = mpsc::unbounded_channel();
    let exit = ExitSignal::new();
    exit.set();

    let result = fetch_reports(
        &mut report_rx,
        Duration::from_millis(10),
        1,
        &exit,
        &output,
    )
    .await;
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_run_information_is_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.mqtt.password = Some("broker-password".to_string());

    let path = write_run_information(&settings, dir.path(), Local::now()).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("run_information_"));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains("broker-password"));
    assert!(contents.contains("inventory"));
}

#[test]
fn test_report_path_keeps_directory() {
    let path = report_path("out/adv.json", true, Local::now());
    assert_eq!(path.parent().unwrap(), std::path::Path::new("out"));
    assert!(path.to_string_lossy().ends_with("_adv.json"));
}
