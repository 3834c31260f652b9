use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::messages::hex_bytes_opt;
use crate::mqtt::GetConfigsResponse;
use crate::runtime::ExitSignal;

const STATUS_IDLE_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Last known configuration of one sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SinkState {
    pub started: Option<bool>,
    pub app_config_seq: Option<u8>,
    pub app_config_diag: Option<u16>,
    #[serde(with = "hex_bytes_opt")]
    #[schema(value_type = Option<String>)]
    pub app_config_data: Option<Vec<u8>>,
    pub node_address: Option<u32>,
    pub network_address: Option<u64>,
    #[serde(skip)]
    pub present: bool,
}

/// A sink together with the gateway it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SinkEntry {
    pub gw_id: String,
    pub sink_id: String,
    #[serde(flatten)]
    pub state: SinkState,
}

pub type GatewayMap = BTreeMap<String, BTreeMap<String, SinkState>>;

/// Gateways and their sinks, kept current from `get_configs` responses.
#[derive(Debug, Clone, Default)]
pub struct GatewayRegistry {
    gateways: Arc<RwLock<GatewayMap>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, response: &GetConfigsResponse) {
        let mut gateways = match self.gateways.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let sinks = gateways.entry(response.gw_id.clone()).or_insert_with(|| {
            info!(gw_id = %response.gw_id, "New gateway detected");
            BTreeMap::new()
        });
        for sink in sinks.values_mut() {
            sink.present = false;
        }

        for config in &response.configs {
            let Some(sink_id) = &config.sink_id else {
                continue;
            };
            let sink = sinks.entry(sink_id.clone()).or_default();

            match (
                config.started,
                config.app_config_seq,
                config.app_config_diag,
                &config.app_config_data,
                config.node_address,
            ) {
                (Some(started), Some(seq), Some(diag), Some(data), Some(node_address)) => {
                    sink.started = Some(started);
                    sink.app_config_seq = Some(seq);
                    sink.app_config_diag = Some(diag);
                    sink.app_config_data = Some(data.clone());
                    sink.node_address = Some(node_address);
                    sink.network_address = config.network_address.or(sink.network_address);
                    sink.present = true;
                }
                _ => {
                    warn!(
                        gw_id = %response.gw_id,
                        sink_id = %sink_id,
                        "Mandatory fields missing from get_configs response"
                    );
                    // A sink seen before keeps its previous values.
                    sink.present = sink.started.is_some();
                }
            }
        }

        sinks.retain(|sink_id, sink| {
            if !sink.present {
                warn!(gw_id = %response.gw_id, sink_id = %sink_id, "Sink removed");
            }
            sink.present
        });
        debug!(gateways = ?*gateways, "Gateway registry updated");
    }

    pub fn snapshot(&self) -> GatewayMap {
        match self.gateways.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// All known sinks ordered by gateway then sink id.
    pub fn sinks(&self) -> Vec<SinkEntry> {
        self.snapshot()
            .into_iter()
            .flat_map(|(gw_id, sinks)| {
                sinks.into_iter().map(move |(sink_id, state)| SinkEntry {
                    gw_id: gw_id.clone(),
                    sink_id,
                    state,
                })
            })
            .collect()
    }

    pub fn gateway_ids(&self) -> Vec<String> {
        self.snapshot().into_keys().collect()
    }
}

/// Applies gateway configuration responses until exit.
pub async fn run_status_observer(
    mut rx: mpsc::UnboundedReceiver<GetConfigsResponse>,
    registry: GatewayRegistry,
    exit: ExitSignal,
) {
    loop {
        tokio::select! {
            _ = exit.wait() => break,
            received = tokio::time::timeout(STATUS_IDLE_LOG_INTERVAL, rx.recv()) => match received {
                Ok(Some(response)) => {
                    info!(gw_id = %response.gw_id, sinks = response.configs.len(), "Gateway configuration received");
                    registry.apply(&response);
                }
                Ok(None) => break,
                Err(_) => info!("Gateway status observer running"),
            },
        }
    }
    info!("Gateway status observer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::SinkConfigReport;

    fn full_sink(sink_id: &str, node_address: u32) -> SinkConfigReport {
        SinkConfigReport {
            sink_id: Some(sink_id.to_string()),
            started: Some(true),
            app_config_seq: Some(4),
            app_config_diag: Some(60),
            app_config_data: Some(vec![0xaa]),
            node_address: Some(node_address),
            network_address: Some(77),
        }
    }

    fn partial_sink(sink_id: &str) -> SinkConfigReport {
        SinkConfigReport {
            sink_id: Some(sink_id.to_string()),
            ..Default::default()
        }
    }

    fn response(gw_id: &str, configs: Vec<SinkConfigReport>) -> GetConfigsResponse {
        GetConfigsResponse {
            gw_id: gw_id.to_string(),
            configs,
        }
    }

    #[test]
    fn test_apply_adds_complete_sinks() {
        let registry = GatewayRegistry::new();
        registry.apply(&response("gw1", vec![full_sink("sink0", 1), full_sink("sink1", 2)]));

        let sinks = registry.sinks();
        assert_eq!(sinks.len(), 2);
        assert_eq!(sinks[0].state.node_address, Some(1));
        assert_eq!(sinks[1].sink_id, "sink1");
    }

    #[test]
    fn test_new_incomplete_sink_is_not_kept() {
        let registry = GatewayRegistry::new();
        registry.apply(&response("gw1", vec![partial_sink("sink0")]));

        assert!(registry.sinks().is_empty());
        assert_eq!(registry.gateway_ids(), vec!["gw1".to_string()]);
    }

    #[test]
    fn test_known_sink_survives_incomplete_report() {
        let registry = GatewayRegistry::new();
        registry.apply(&response("gw1", vec![full_sink("sink0", 1)]));
        registry.apply(&response("gw1", vec![partial_sink("sink0")]));

        let sinks = registry.sinks();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].state.app_config_seq, Some(4));
    }

    #[test]
    fn test_missing_sinks_are_removed() {
        let registry = GatewayRegistry::new();
        registry.apply(&response("gw1", vec![full_sink("sink0", 1), full_sink("sink1", 2)]));
        registry.apply(&response("gw1", vec![full_sink("sink1", 2)]));
        registry.apply(&response("gw2", vec![full_sink("sink0", 3)]));

        let ids: Vec<(String, String)> = registry
            .sinks()
            .into_iter()
            .map(|s| (s.gw_id, s.sink_id))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("gw1".to_string(), "sink1".to_string()),
                ("gw2".to_string(), "sink0".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_status_observer_applies_until_channel_closes() {
        let registry = GatewayRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(response("gw1", vec![full_sink("sink0", 1)])).unwrap();
        drop(tx);

        run_status_observer(rx, registry.clone(), ExitSignal::new()).await;
        assert_eq!(registry.sinks().len(), 1);
    }
}
