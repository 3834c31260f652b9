use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::constants::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub mqtt: MqttSettings,
    #[serde(default)]
    pub database: Option<MySqlSettings>,
    #[serde(default)]
    pub http: Option<HttpSettings>,
    #[serde(default)]
    pub inventory: InventorySettings,
    #[serde(default)]
    pub services: ServicesSettings,
}

const REDACTED: &str = "***";

impl Settings {
    /// Copy with every password replaced, for logging and run information.
    pub fn redacted(&self) -> Settings {
        let mut settings = self.clone();
        let hide = |password: &mut Option<String>| {
            if password.is_some() {
                *password = Some(REDACTED.to_string());
            }
        };
        hide(&mut settings.mqtt.password);
        if let Some(database) = settings.database.as_mut() {
            hide(&mut database.password);
        }
        hide(&mut settings.services.wnt.password);
        hide(&mut settings.services.influx.password);
        settings
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MqttSettings {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_mqtt_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ca_certs: Option<String>,
    #[serde(default)]
    pub allow_untrusted: bool,
    #[serde(default)]
    pub force_unsecure: bool,
    #[serde(default)]
    pub persist_session: bool,
    #[serde(default)]
    pub subscribe: SubscribeSettings,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_min")]
    pub reconnect_min_delay_secs: u64,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_delay_secs: u64,
    /// Source endpoints forwarded to consumers. Empty forwards everything.
    #[serde(default)]
    pub allowed_endpoints: HashSet<u8>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            hostname: None,
            port: default_mqtt_port(),
            username: None,
            password: None,
            ca_certs: None,
            allow_untrusted: false,
            force_unsecure: false,
            persist_session: false,
            subscribe: SubscribeSettings::default(),
            keep_alive_secs: default_keep_alive(),
            heartbeat_secs: default_heartbeat(),
            reconnect_min_delay_secs: default_reconnect_min(),
            reconnect_max_delay_secs: default_reconnect_max(),
            allowed_endpoints: HashSet::new(),
        }
    }
}

impl MqttSettings {
    /// Checks if connection parameters are present.
    pub fn sanity(&self) -> bool {
        self.username.is_some()
            && self.password.is_some()
            && self.hostname.is_some()
            && self.port.is_some()
    }

    pub fn clean_session(&self) -> bool {
        !self.persist_session
    }
}

/// Topic levels used to build the received data subscription.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SubscribeSettings {
    #[serde(default = "wildcard")]
    pub gateway_id: String,
    #[serde(default = "wildcard")]
    pub sink_id: String,
    #[serde(default = "wildcard")]
    pub network_id: String,
    #[serde(default = "wildcard")]
    pub source_endpoint: String,
    #[serde(default = "wildcard")]
    pub destination_endpoint: String,
}

impl Default for SubscribeSettings {
    fn default() -> Self {
        Self {
            gateway_id: wildcard(),
            sink_id: wildcard(),
            network_id: wildcard(),
            source_endpoint: wildcard(),
            destination_endpoint: wildcard(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MySqlSettings {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            hostname: None,
            port: default_mysql_port(),
            username: None,
            password: None,
            database: None,
            workers: default_workers(),
            parallel: true,
        }
    }
}

impl MySqlSettings {
    pub fn sanity(&self) -> bool {
        self.hostname.is_some()
            && self.username.is_some()
            && self.password.is_some()
            && self.database.is_some()
    }

    pub fn url(&self) -> Option<String> {
        Some(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username.as_ref()?,
            self.password.as_ref()?,
            self.hostname.as_ref()?,
            self.port,
            self.database.as_ref()?
        ))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HttpSettings {
    #[serde(default = "default_http_host")]
    pub host: String,
    pub port: u16,
    /// Logs request and response details of every command.
    #[serde(default)]
    pub debug_comms: bool,
    /// Evaluates commands without publishing anything to the broker.
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InventorySettings {
    #[serde(default)]
    pub nodes_file: Option<String>,
    #[serde(default)]
    pub target_otap: Option<u8>,
    #[serde(default)]
    pub target_frequency: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<u64>,
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    #[serde(default = "default_runs")]
    pub number_of_runs: u32,
    #[serde(default)]
    pub jitter_minimum_secs: u64,
    #[serde(default)]
    pub jitter_maximum_secs: u64,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub output_time: bool,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            nodes_file: None,
            target_otap: None,
            target_frequency: None,
            delay_secs: None,
            duration_secs: default_duration(),
            number_of_runs: default_runs(),
            jitter_minimum_secs: 0,
            jitter_maximum_secs: 0,
            output: default_output(),
            output_time: false,
        }
    }
}

impl InventorySettings {
    pub fn normalize(&mut self) {
        if self.jitter_minimum_secs > self.jitter_maximum_secs {
            self.jitter_maximum_secs = self.jitter_minimum_secs;
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ServicesSettings {
    #[serde(default)]
    pub wnt: WntSettings,
    #[serde(default)]
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct WntSettings {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ws_protocol: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct InfluxSettings {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_mqtt_port() -> Option<u16> {
    Some(DEFAULT_MQTT_PORT)
}

fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_heartbeat() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

fn default_reconnect_min() -> u64 {
    DEFAULT_RECONNECT_MIN_DELAY_SECS
}

fn default_reconnect_max() -> u64 {
    DEFAULT_RECONNECT_MAX_DELAY_SECS
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn default_workers() -> usize {
    DEFAULT_STORAGE_WORKERS
}

fn default_true() -> bool {
    true
}

fn default_http_host() -> String {
    DEFAULT_HTTP_HOST.to_string()
}

fn default_duration() -> u64 {
    DEFAULT_INVENTORY_DURATION_SECS
}

fn default_runs() -> u32 {
    1
}

fn default_output() -> String {
    DEFAULT_INVENTORY_OUTPUT.to_string()
}

fn wildcard() -> String {
    "+".to_string()
}
