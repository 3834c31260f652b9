use tokio::sync::mpsc;

use crate::config::models::HttpSettings;
use crate::control::GatewayRegistry;
use crate::mqtt::GatewayRequest;

#[derive(Clone)]
pub struct AppState {
    pub registry: GatewayRegistry,
    /// Publishing side of the MQTT observer. `None` when running without a broker.
    pub requests: Option<mpsc::Sender<GatewayRequest>>,
    pub debug_comms: bool,
    pub test_mode: bool,
}

impl AppState {
    pub fn new(
        settings: &HttpSettings,
        registry: GatewayRegistry,
        requests: Option<mpsc::Sender<GatewayRequest>>,
    ) -> Self {
        Self {
            registry,
            requests,
            debug_comms: settings.debug_comms,
            test_mode: settings.test_mode,
        }
    }
}
