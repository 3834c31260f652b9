use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hex_bytes;
use crate::errors::DecodeError;

/// A data packet received by a sink and forwarded by its gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceivedData {
    pub gw_id: String,
    pub sink_id: String,
    pub network_id: u64,
    pub source_address: u32,
    pub destination_address: u32,
    pub source_endpoint: u8,
    pub destination_endpoint: u8,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub travel_time_ms: u64,
    pub rx_time_ms_epoch: u64,
    #[serde(default)]
    pub hop_count: Option<u8>,
    #[serde(with = "hex_bytes")]
    pub data_payload: Vec<u8>,
}

impl ReceivedData {
    pub fn from_json(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Time the packet left its source node, in milliseconds since the epoch.
    pub fn sent_time_ms(&self) -> u64 {
        self.rx_time_ms_epoch.saturating_sub(self.travel_time_ms)
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.rx_time_ms_epoch as i64)
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.sent_time_ms() as i64)
    }

    pub fn transport_delay_ms(&self) -> u64 {
        self.travel_time_ms
    }
}
