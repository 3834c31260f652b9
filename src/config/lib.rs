use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use super::constants::*;
use super::models::{MySqlSettings, Settings};
use crate::errors::ConfigError;

/// Loads settings from a YAML file, expanding `${VAR}` references and then
/// applying `WM_SERVICES_*` overrides.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let expanded = expand_env_vars(&contents);
    let mut settings: Settings = if expanded.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&expanded)?
    };
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

impl Settings {
    /// Defaults plus environment overrides, for deployments without a settings file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings)?;
        Ok(settings)
    }

    /// Loads `path` when it exists, otherwise falls back to [`Settings::from_env`].
    pub fn load_or_env(path: &str) -> Result<Self, ConfigError> {
        if Path::new(path).exists() {
            load_settings(path)
        } else {
            debug!("Settings file {} not found, using environment only", path);
            Settings::from_env()
        }
    }
}

/// Replaces every `${NAME}` with the value of the environment variable `NAME`.
/// Unknown variables expand to an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match env::var(name) {
                    Ok(value) => output.push_str(&value),
                    Err(_) => warn!("Environment variable {} is not set", name),
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), ConfigError> {
    let mqtt = &mut settings.mqtt;
    override_string(ENV_MQTT_HOSTNAME, &mut mqtt.hostname);
    override_string(ENV_MQTT_USERNAME, &mut mqtt.username);
    override_string(ENV_MQTT_PASSWORD, &mut mqtt.password);
    override_string(ENV_MQTT_CA_CERTS, &mut mqtt.ca_certs);
    if let Some(port) = env_parsed::<u16>(ENV_MQTT_PORT)? {
        mqtt.port = Some(port);
    }
    if let Some(flag) = env_bool(ENV_MQTT_FORCE_UNSECURE)? {
        mqtt.force_unsecure = flag;
    }
    if let Some(flag) = env_bool(ENV_MQTT_ALLOW_UNTRUSTED)? {
        mqtt.allow_untrusted = flag;
    }

    let mysql_keys = [
        ENV_MYSQL_HOSTNAME,
        ENV_MYSQL_PORT,
        ENV_MYSQL_USERNAME,
        ENV_MYSQL_PASSWORD,
        ENV_MYSQL_DATABASE,
    ];
    if mysql_keys.iter().any(|key| env::var(key).is_ok()) {
        let database = settings.database.get_or_insert_with(MySqlSettings::default);
        override_string(ENV_MYSQL_HOSTNAME, &mut database.hostname);
        override_string(ENV_MYSQL_USERNAME, &mut database.username);
        override_string(ENV_MYSQL_PASSWORD, &mut database.password);
        override_string(ENV_MYSQL_DATABASE, &mut database.database);
        if let Some(port) = env_parsed::<u16>(ENV_MYSQL_PORT)? {
            database.port = port;
        }
    }

    if let Some(port) = env_parsed::<u16>(ENV_HTTP_PORT)? {
        let host = env::var(ENV_HTTP_HOSTNAME).ok();
        match settings.http.as_mut() {
            Some(http) => {
                http.port = port;
                if let Some(host) = host {
                    http.host = host;
                }
            }
            None => {
                settings.http = Some(super::models::HttpSettings {
                    host: host.unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
                    port,
                    debug_comms: false,
                    test_mode: false,
                });
            }
        }
    } else if let (Some(http), Ok(host)) = (settings.http.as_mut(), env::var(ENV_HTTP_HOSTNAME)) {
        http.host = host;
    }

    let wnt = &mut settings.services.wnt;
    override_string(ENV_WNT_HOSTNAME, &mut wnt.hostname);
    override_string(ENV_WNT_USERNAME, &mut wnt.username);
    override_string(ENV_WNT_PASSWORD, &mut wnt.password);
    override_string(ENV_WNT_WS_PROTOCOL, &mut wnt.ws_protocol);

    let influx = &mut settings.services.influx;
    override_string(ENV_INFLUX_HOSTNAME, &mut influx.hostname);
    override_string(ENV_INFLUX_USERNAME, &mut influx.username);
    override_string(ENV_INFLUX_PASSWORD, &mut influx.password);

    Ok(())
}

/// Reads one node address per line. A missing file yields an empty set.
pub fn read_target_nodes(path: &str) -> Result<HashSet<u32>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Could not find nodes file {}", path);
            return Ok(HashSet::new());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_string(),
                source,
            });
        }
    };

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: path.to_string(),
                value: line.to_string(),
            })
        })
        .collect()
}

fn override_string(key: &str, target: &mut Option<String>) {
    if let Ok(value) = env::var(key) {
        *target = Some(value);
    }
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_flag(&value).map(Some).ok_or(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(None),
    }
}

/// Accepts the usual spellings of a boolean flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
