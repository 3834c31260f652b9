use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use wbc_lib::config::constants::settings_path;
use wbc_lib::config::validation::validate_settings;
use wbc_lib::config::Settings;
use wbc_lib::control::{run_status_observer, GatewayRegistry};
use wbc_lib::logging::init_logging;
use wbc_lib::mqtt::MqttObserver;
use wbc_lib::routes;
use wbc_lib::runtime::ExitSignal;
use wbc_lib::state::AppState;
use wbc_lib::storage::{MySqlStore, StorageObserver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    info!("Starting Wirepas backend client...");

    let config_path = settings_path();
    info!("Loading settings from {}", config_path);
    let settings = Settings::load_or_env(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load settings from {}: {}", config_path, e))?;

    if let Err(errors) = validate_settings(&settings) {
        for message in &errors {
            error!("{}", message);
        }
        return Err(anyhow::anyhow!("Invalid settings: {} error(s)", errors.len()));
    }
    info!("Settings validated successfully.");

    let exit = ExitSignal::new();
    exit.set_on_ctrl_c();

    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let (configs_tx, configs_rx) = mpsc::unbounded_channel();

    let mut observer = MqttObserver::new(settings.mqtt.clone(), exit.clone()).with_messages(message_tx);
    if settings.http.is_some() {
        observer = observer.with_configs(configs_tx);
    }
    let requests = observer.requests();

    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        if let Err(e) = observer.run().await {
            error!("MQTT observer stopped: {}", e);
        }
    });

    match settings.database.as_ref().filter(|database| database.sanity()) {
        Some(database) => {
            let store = MySqlStore::connect(database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to MySQL: {}", e))?;
            store
                .create_tables()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to prepare MySQL schema: {}", e))?;
            info!("Connected to MySQL, schema ready.");

            let storage = StorageObserver::new(Arc::new(store), message_rx, exit.clone())
                .with_workers(database.parallel, database.workers);
            tasks.spawn(storage.run());
        }
        None => {
            info!("Skipping Storage module");
            // Keep draining so the observer never sees a closed channel.
            let mut message_rx = message_rx;
            let drain_exit = exit.clone();
            tasks.spawn(async move {
                loop {
                    tokio::select! {
                        _ = drain_exit.wait() => break,
                        received = message_rx.recv() => {
                            if received.is_none() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    }

    if let Some(http) = settings.http.clone() {
        let registry = GatewayRegistry::new();
        tasks.spawn(run_status_observer(configs_rx, registry.clone(), exit.clone()));

        let app_state = Arc::new(AppState::new(&http, registry, Some(requests)));
        let router = routes::create_router(app_state);

        let address = format!("{}:{}", http.host, http.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", address, e))?;
        info!("HTTP control server is running on {}", address);

        let shutdown = exit.clone();
        tasks.spawn(async move {
            let server = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move { shutdown.wait().await });
            if let Err(e) = server.await {
                error!("HTTP server stopped: {}", e);
            }
        });
    } else {
        info!("Skipping HTTP control module");
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Task ended abnormally: {}", e);
        }
        exit.set();
    }

    info!("Wirepas backend client stopped.");
    Ok(())
}
