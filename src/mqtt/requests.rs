use serde::{Deserialize, Serialize};
use serde_json::json;

use super::topics::Topics;
use crate::errors::DecodeError;
use crate::messages::hex_bytes_opt;

/// Sink configuration fields to change. Unset fields are left untouched by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_config_seq: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_config_diag: Option<u16>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "hex_bytes_opt"
    )]
    pub app_config_data: Option<Vec<u8>>,
}

/// Requests the backend client sends to gateways.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    GetConfigs {
        gw_id: String,
    },
    SetConfig {
        gw_id: String,
        sink_id: String,
        new_config: SinkConfigUpdate,
    },
    SendData {
        gw_id: String,
        sink_id: String,
        destination_address: u32,
        source_endpoint: u8,
        destination_endpoint: u8,
        qos: u8,
        payload: Vec<u8>,
        is_unack_csma_ca: bool,
        hop_limit: u8,
    },
}

/// A request ready to be handed to the MQTT client.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl GatewayRequest {
    pub fn gw_id(&self) -> &str {
        match self {
            GatewayRequest::GetConfigs { gw_id }
            | GatewayRequest::SetConfig { gw_id, .. }
            | GatewayRequest::SendData { gw_id, .. } => gw_id,
        }
    }

    pub fn topic(&self) -> String {
        match self {
            GatewayRequest::GetConfigs { gw_id } => Topics::get_configs_request(gw_id),
            GatewayRequest::SetConfig { gw_id, sink_id, .. } => {
                Topics::set_config_request(gw_id, sink_id)
            }
            GatewayRequest::SendData { gw_id, sink_id, .. } => {
                Topics::send_data_request(gw_id, sink_id)
            }
        }
    }

    pub fn body(&self, req_id: u64) -> serde_json::Value {
        match self {
            GatewayRequest::GetConfigs { gw_id } => json!({
                "req_id": req_id,
                "gw_id": gw_id,
            }),
            GatewayRequest::SetConfig {
                gw_id,
                sink_id,
                new_config,
            } => json!({
                "req_id": req_id,
                "gw_id": gw_id,
                "sink_id": sink_id,
                "new_config": new_config,
            }),
            GatewayRequest::SendData {
                gw_id,
                sink_id,
                destination_address,
                source_endpoint,
                destination_endpoint,
                qos,
                payload,
                is_unack_csma_ca,
                hop_limit,
            } => json!({
                "req_id": req_id,
                "gw_id": gw_id,
                "sink_id": sink_id,
                "destination_address": destination_address,
                "source_endpoint": source_endpoint,
                "destination_endpoint": destination_endpoint,
                "qos": qos,
                "data_payload": hex::encode(payload),
                "is_unack_csma_ca": is_unack_csma_ca,
                "hop_limit": hop_limit,
            }),
        }
    }

    pub fn to_outgoing(&self) -> OutgoingMessage {
        let req_id: u64 = rand::random();
        OutgoingMessage {
            topic: self.topic(),
            payload: self.body(req_id).to_string().into_bytes(),
        }
    }
}

/// One sink entry of a `get_configs` response. Only `sink_id` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkConfigReport {
    pub sink_id: Option<String>,
    #[serde(default)]
    pub started: Option<bool>,
    #[serde(default)]
    pub app_config_seq: Option<u8>,
    #[serde(default)]
    pub app_config_diag: Option<u16>,
    #[serde(default, with = "hex_bytes_opt")]
    pub app_config_data: Option<Vec<u8>>,
    #[serde(default)]
    pub node_address: Option<u32>,
    #[serde(default)]
    pub network_address: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfigsResponse {
    pub gw_id: String,
    #[serde(default)]
    pub configs: Vec<SinkConfigReport>,
}

impl GetConfigsResponse {
    pub fn from_json(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayState {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub gw_id: String,
    pub state: GatewayState,
}

impl GatewayStatus {
    pub fn from_json(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
