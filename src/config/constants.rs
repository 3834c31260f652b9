use std::env;

pub const DEFAULT_SETTINGS_PATH: &str = "settings.yaml";

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 2;
pub const DEFAULT_RECONNECT_MIN_DELAY_SECS: u64 = 10;
pub const DEFAULT_RECONNECT_MAX_DELAY_SECS: u64 = 120;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_STORAGE_WORKERS: usize = 4;

pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

pub const DEFAULT_INVENTORY_DURATION_SECS: u64 = 5;
pub const DEFAULT_INVENTORY_OUTPUT: &str = "inventory_report.json";
/// Upper bound (exclusive) of the random start delay when none is configured.
pub const RANDOM_DELAY_UPPER_SECS: u64 = 60;

pub const ENV_MQTT_HOSTNAME: &str = "WM_SERVICES_MQTT_HOSTNAME";
pub const ENV_MQTT_PORT: &str = "WM_SERVICES_MQTT_PORT";
pub const ENV_MQTT_USERNAME: &str = "WM_SERVICES_MQTT_USERNAME";
pub const ENV_MQTT_PASSWORD: &str = "WM_SERVICES_MQTT_PASSWORD";
pub const ENV_MQTT_CA_CERTS: &str = "WM_SERVICES_MQTT_CA_CERTS";
pub const ENV_MQTT_FORCE_UNSECURE: &str = "WM_SERVICES_MQTT_FORCE_UNSECURE";
pub const ENV_MQTT_ALLOW_UNTRUSTED: &str = "WM_SERVICES_MQTT_ALLOW_UNTRUSTED";

pub const ENV_MYSQL_HOSTNAME: &str = "WM_SERVICES_MYSQL_HOSTNAME";
pub const ENV_MYSQL_PORT: &str = "WM_SERVICES_MYSQL_PORT";
pub const ENV_MYSQL_USERNAME: &str = "WM_SERVICES_MYSQL_USERNAME";
pub const ENV_MYSQL_PASSWORD: &str = "WM_SERVICES_MYSQL_PASSWORD";
pub const ENV_MYSQL_DATABASE: &str = "WM_SERVICES_MYSQL_DATABASE";

pub const ENV_HTTP_HOSTNAME: &str = "WM_SERVICES_HTTP_HOSTNAME";
pub const ENV_HTTP_PORT: &str = "WM_SERVICES_HTTP_PORT";

pub const ENV_WNT_HOSTNAME: &str = "WM_SERVICES_WNT_HOSTNAME";
pub const ENV_WNT_USERNAME: &str = "WM_SERVICES_WNT_USERNAME";
pub const ENV_WNT_PASSWORD: &str = "WM_SERVICES_WNT_PASSWORD";
pub const ENV_WNT_WS_PROTOCOL: &str = "WM_SERVICES_WNT_WS_PROTOCOL";

pub const ENV_INFLUX_HOSTNAME: &str = "WM_SERVICES_INFLUX_HOSTNAME";
pub const ENV_INFLUX_USERNAME: &str = "WM_SERVICES_INFLUX_USERNAME";
pub const ENV_INFLUX_PASSWORD: &str = "WM_SERVICES_INFLUX_PASSWORD";

pub fn settings_path() -> String {
    env::var("CONFIG_FILE_PATH").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string())
}

pub fn debug_level() -> String {
    env::var("DEBUG_LEVEL").unwrap_or_else(|_| "debug".to_string())
}
