use crate::config::models::SubscribeSettings;
use crate::errors::DecodeError;

pub const RECEIVED_DATA_PREFIX: &str = "gw-event/received_data";
pub const STATUS_PREFIX: &str = "gw-event/status";
pub const GET_CONFIGS_RESPONSE_PREFIX: &str = "gw-response/get_configs";
pub const GET_CONFIGS_REQUEST_PREFIX: &str = "gw-request/get_configs";
pub const SET_CONFIG_REQUEST_PREFIX: &str = "gw-request/set_config";
pub const SEND_DATA_REQUEST_PREFIX: &str = "gw-request/send_data";

/// Path levels of a received data topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedDataPath {
    pub gw_id: String,
    pub sink_id: String,
    pub network_id: String,
    pub source_endpoint: String,
    pub destination_endpoint: String,
}

pub struct Topics;

impl Topics {
    pub fn received_data_filter(subscribe: &SubscribeSettings) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            RECEIVED_DATA_PREFIX,
            subscribe.gateway_id,
            subscribe.sink_id,
            subscribe.network_id,
            subscribe.source_endpoint,
            subscribe.destination_endpoint
        )
    }

    pub fn get_configs_response_filter() -> String {
        format!("{}/#", GET_CONFIGS_RESPONSE_PREFIX)
    }

    pub fn status_filter() -> String {
        format!("{}/#", STATUS_PREFIX)
    }

    pub fn get_configs_request(gw_id: &str) -> String {
        format!("{}/{}", GET_CONFIGS_REQUEST_PREFIX, gw_id)
    }

    pub fn set_config_request(gw_id: &str, sink_id: &str) -> String {
        format!("{}/{}/{}", SET_CONFIG_REQUEST_PREFIX, gw_id, sink_id)
    }

    pub fn send_data_request(gw_id: &str, sink_id: &str) -> String {
        format!("{}/{}/{}", SEND_DATA_REQUEST_PREFIX, gw_id, sink_id)
    }

    pub fn parse_received_data(topic: &str) -> Result<ReceivedDataPath, DecodeError> {
        let rest = topic
            .strip_prefix(RECEIVED_DATA_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| DecodeError::UnexpectedTopic(topic.to_string()))?;

        let levels: Vec<&str> = rest.split('/').collect();
        match levels.as_slice() {
            [gw_id, sink_id, network_id, source_endpoint, destination_endpoint] => {
                Ok(ReceivedDataPath {
                    gw_id: gw_id.to_string(),
                    sink_id: sink_id.to_string(),
                    network_id: network_id.to_string(),
                    source_endpoint: source_endpoint.to_string(),
                    destination_endpoint: destination_endpoint.to_string(),
                })
            }
            _ => Err(DecodeError::UnexpectedTopic(topic.to_string())),
        }
    }

    /// Gateway id carried in the last level of status and response topics.
    pub fn gateway_id(topic: &str) -> Option<&str> {
        topic.rsplit('/').next().filter(|id| !id.is_empty())
    }
}

/// MQTT filter matching: `+` matches one level, `#` matches the remaining
/// levels and is only valid as the last level.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let filter_parts: Vec<&str> = filter.split('/').collect();
    let topic_parts: Vec<&str> = topic.split('/').collect();

    let mut ti = 0;
    for (pi, part) in filter_parts.iter().enumerate() {
        match *part {
            "#" => return pi == filter_parts.len() - 1,
            "+" => {
                if ti >= topic_parts.len() {
                    return false;
                }
                ti += 1;
            }
            level => {
                if ti >= topic_parts.len() || topic_parts[ti] != level {
                    return false;
                }
                ti += 1;
            }
        }
    }
    ti == topic_parts.len()
}
