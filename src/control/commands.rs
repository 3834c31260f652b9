//! Control commands and their translation into gateway requests.
//!
//! A command is evaluated against every known sink. Data requests come
//! first in the outcome, followed by one `get_configs` refresh per gateway
//! whose configuration the command touched or queried.

use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::ControlError;
use crate::mqtt::{GatewayRequest, SinkConfigUpdate};

use super::registry::SinkEntry;

pub const DEFAULT_COMMAND: &str = "info";

const FAST_VALUES: [&str; 4] = ["true", "1", "yes", "y"];
const MAX_APP_CONFIG_SEQ: u8 = 254;
/// Upper bound on `count`; every repetition is a separate request per sink.
pub const MAX_DATATX_COUNT: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct DataTx {
    pub destination: u32,
    pub source_ep: u8,
    pub dest_ep: u8,
    pub payload: Vec<u8>,
    pub fast: bool,
    pub hop_limit: u8,
    pub count: u32,
    pub qos: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetConfig {
    pub seq: Option<u8>,
    pub diag: Option<u16>,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DataTx(DataTx),
    Start,
    Stop,
    SetConfig(SetConfig),
    Info,
}

impl Command {
    pub fn parse(name: &str, params: &HashMap<String, String>) -> Result<Self, ControlError> {
        match name {
            "datatx" => Ok(Command::DataTx(DataTx {
                destination: required(params, "destination")?,
                source_ep: required(params, "source_ep")?,
                dest_ep: required(params, "dest_ep")?,
                payload: required_hex(params, "payload")?,
                fast: params
                    .get("fast")
                    .map(|value| FAST_VALUES.contains(&value.to_lowercase().as_str()))
                    .unwrap_or(false),
                hop_limit: optional(params, "hoplimit")?.unwrap_or(0),
                count: optional_at_most(params, "count", MAX_DATATX_COUNT)?.unwrap_or(1),
                qos: optional(params, "qos")?.unwrap_or(0),
            })),
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "setconfig" => Ok(Command::SetConfig(SetConfig {
                seq: optional(params, "seq")?,
                diag: optional(params, "diag")?,
                data: optional_hex(params, "data")?,
            })),
            "info" => Ok(Command::Info),
            other => Err(ControlError::UnknownCommand(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub data_requests: Vec<GatewayRequest>,
    pub refresh_requests: Vec<GatewayRequest>,
    /// Sinks reported back by `info`.
    pub sinks: Vec<SinkEntry>,
}

impl CommandOutcome {
    /// Requests in publish order.
    pub fn requests(&self) -> impl Iterator<Item = &GatewayRequest> {
        self.data_requests.iter().chain(self.refresh_requests.iter())
    }

    fn refresh(&mut self, gw_id: &str) {
        let known = self.refresh_requests.iter().any(|request| request.gw_id() == gw_id);
        if !known {
            self.refresh_requests.push(GatewayRequest::GetConfigs {
                gw_id: gw_id.to_string(),
            });
        }
    }
}

pub fn execute(command: &Command, sinks: &[SinkEntry]) -> CommandOutcome {
    let mut outcome = CommandOutcome::default();

    match command {
        Command::DataTx(datatx) => {
            let addressed_to_sink = sinks
                .iter()
                .any(|sink| sink.state.node_address == Some(datatx.destination));
            for sink in sinks {
                if addressed_to_sink && sink.state.node_address != Some(datatx.destination) {
                    continue;
                }
                for _ in 0..datatx.count {
                    outcome.data_requests.push(GatewayRequest::SendData {
                        gw_id: sink.gw_id.clone(),
                        sink_id: sink.sink_id.clone(),
                        destination_address: datatx.destination,
                        source_endpoint: datatx.source_ep,
                        destination_endpoint: datatx.dest_ep,
                        qos: datatx.qos,
                        payload: datatx.payload.clone(),
                        is_unack_csma_ca: datatx.fast,
                        hop_limit: datatx.hop_limit,
                    });
                }
            }
        }
        Command::Start | Command::Stop => {
            let started = matches!(command, Command::Start);
            for sink in sinks {
                outcome.data_requests.push(GatewayRequest::SetConfig {
                    gw_id: sink.gw_id.clone(),
                    sink_id: sink.sink_id.clone(),
                    new_config: SinkConfigUpdate {
                        started: Some(started),
                        ..Default::default()
                    },
                });
                outcome.refresh(&sink.gw_id);
            }
        }
        Command::SetConfig(set) => {
            for sink in sinks {
                outcome.data_requests.push(GatewayRequest::SetConfig {
                    gw_id: sink.gw_id.clone(),
                    sink_id: sink.sink_id.clone(),
                    new_config: SinkConfigUpdate {
                        started: None,
                        app_config_seq: Some(
                            set.seq.unwrap_or_else(|| next_seq(sink.state.app_config_seq)),
                        ),
                        app_config_diag: set.diag.or(sink.state.app_config_diag),
                        app_config_data: set
                            .data
                            .clone()
                            .or_else(|| sink.state.app_config_data.clone()),
                    },
                });
                outcome.refresh(&sink.gw_id);
            }
        }
        Command::Info => {
            for sink in sinks {
                outcome.refresh(&sink.gw_id);
            }
            outcome.sinks = sinks.to_vec();
        }
    }

    outcome
}

/// Next app config sequence number. Sequences run from 1 to 254.
pub fn next_seq(current: Option<u8>) -> u8 {
    match current {
        Some(seq) if seq < MAX_APP_CONFIG_SEQ => seq + 1,
        _ => 1,
    }
}

fn required<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<T, ControlError> {
    optional(params, key)?.ok_or_else(|| ControlError::MissingField(key.to_string()))
}

fn optional<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ControlError> {
    params
        .get(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ControlError::InvalidField(key.to_string()))
        })
        .transpose()
}

fn optional_at_most(
    params: &HashMap<String, String>,
    key: &str,
    max: u32,
) -> Result<Option<u32>, ControlError> {
    match optional::<u32>(params, key)? {
        Some(value) if value > max => Err(ControlError::InvalidField(key.to_string())),
        value => Ok(value),
    }
}

fn required_hex(params: &HashMap<String, String>, key: &str) -> Result<Vec<u8>, ControlError> {
    optional_hex(params, key)?.ok_or_else(|| ControlError::MissingField(key.to_string()))
}

fn optional_hex(params: &HashMap<String, String>, key: &str) -> Result<Option<Vec<u8>>, ControlError> {
    params
        .get(key)
        .map(|value| hex::decode(value.trim()).map_err(|_| ControlError::InvalidField(key.to_string())))
        .transpose()
}
