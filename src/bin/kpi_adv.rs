use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use wbc_lib::config::constants::settings_path;
use wbc_lib::config::validation::validate_settings;
use wbc_lib::config::{read_target_nodes, Settings};
use wbc_lib::inventory::{
    fetch_reports, report_path, report_timeout, start_delay, write_run_information,
    AdvertiserManager, InventoryTargets,
};
use wbc_lib::logging::init_logging;
use wbc_lib::messages::advertiser::ADVERTISER_SOURCE_ENDPOINT;
use wbc_lib::mqtt::MqttObserver;
use wbc_lib::runtime::ExitSignal;
use wbc_lib::storage::{MySqlStore, StorageObserver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let config_path = settings_path();
    info!("Loading settings from {}", config_path);
    let mut settings = Settings::load_or_env(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load settings from {}: {}", config_path, e))?;
    settings.mqtt.allowed_endpoints = [ADVERTISER_SOURCE_ENDPOINT].into_iter().collect();
    settings.inventory.normalize();

    if let Err(errors) = validate_settings(&settings) {
        for message in &errors {
            error!("{}", message);
        }
        return Err(anyhow::anyhow!("Invalid settings: {} error(s)", errors.len()));
    }

    let inventory = settings.inventory.clone();
    let targets = InventoryTargets {
        nodes: match &inventory.nodes_file {
            Some(path) => read_target_nodes(path)?,
            None => Default::default(),
        },
        otap_sequence: inventory.target_otap,
        frequency: inventory.target_frequency,
    };
    info!(
        target_nodes = targets.nodes.len(),
        target_otap = ?targets.otap_sequence,
        target_frequency = ?targets.frequency,
        runs = inventory.number_of_runs,
        "Starting advertiser inventory"
    );

    let now = Local::now();
    let output = report_path(&inventory.output, inventory.output_time, now);
    let report_dir = output
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(report_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", report_dir.display(), e))?;
    match write_run_information(&settings, report_dir, now) {
        Ok(path) => info!("Run information written to {}", path.display()),
        Err(e) => warn!("Could not write run information: {}", e),
    }

    let exit = ExitSignal::new();
    exit.set_on_ctrl_c();

    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();

    let observer = MqttObserver::new(settings.mqtt.clone(), exit.clone()).with_messages(message_tx);
    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        if let Err(e) = observer.run().await {
            error!("MQTT observer stopped: {}", e);
        }
    });

    let delay = start_delay(&inventory);
    let mut manager = AdvertiserManager::new(
        targets,
        &inventory,
        delay,
        message_rx,
        report_tx,
        exit.clone(),
    );

    match settings.database.as_ref().filter(|database| database.sanity()) {
        Some(database) => {
            let store = MySqlStore::connect(database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to MySQL: {}", e))?;
            store
                .create_tables()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to prepare MySQL schema: {}", e))?;
            let (storage_tx, storage_rx) = mpsc::unbounded_channel();
            manager = manager.with_storage(storage_tx);
            let storage = StorageObserver::new(Arc::new(store), storage_rx, exit.clone())
                .with_workers(database.parallel, database.workers);
            tasks.spawn(storage.run());
        }
        None => info!("Skipping Storage module"),
    }

    let runs = inventory.number_of_runs;
    tasks.spawn(manager.run(runs));

    let timeout = report_timeout(&inventory, delay);
    let result = fetch_reports(&mut report_rx, timeout, runs, &exit, &output).await;
    exit.set();

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Task ended abnormally: {}", e);
        }
    }

    let reports = result?;
    info!(
        runs = reports.len(),
        output = %output.display(),
        "Advertiser inventory finished"
    );
    Ok(())
}
