use std::io::Write;

use tempfile::NamedTempFile;
use wbc_lib::config::validation::validate_settings;
use wbc_lib::config::{load_settings, read_target_nodes, Settings};

const SETTINGS_YAML: &str = r#"
mqtt:
  hostname: "${TEST_WBC_MQTT_HOST}"
  port: 8883
  username: backend
  password: "${TEST_WBC_MQTT_PASSWORD}"
  ca_certs: /etc/ssl/certs/broker.pem
  allowed_endpoints: [200]
  subscribe:
    gateway_id: gw-1
database:
  hostname: mysql
  username: wirepas
  password: secret
  database: wm
  workers: 2
  parallel: true
http:
  host: 127.0.0.1
  port: 8000
  debug_comms: true
inventory:
  duration_secs: 30
  number_of_runs: 3
  jitter_minimum_secs: 10
  jitter_maximum_secs: 5
  output: reports/adv.json
  output_time: true
"#;

fn write_settings(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_settings_with_environment_variables() {
    let file = write_settings(SETTINGS_YAML);
    temp_env::with_vars(
        [
            ("TEST_WBC_MQTT_HOST", Some("broker.example")),
            ("TEST_WBC_MQTT_PASSWORD", Some("mqtt-secret")),
            ("WM_SERVICES_MQTT_PORT", None),
            ("WM_SERVICES_MYSQL_HOSTNAME", None),
            ("WM_SERVICES_HTTP_PORT", None),
        ],
        || {
            let settings = load_settings(file.path().to_str().unwrap()).unwrap();

            assert_eq!(settings.mqtt.hostname.as_deref(), Some("broker.example"));
            assert_eq!(settings.mqtt.password.as_deref(), Some("mqtt-secret"));
            assert_eq!(settings.mqtt.port, Some(8883));
            assert!(settings.mqtt.allowed_endpoints.contains(&200));
            assert_eq!(settings.mqtt.subscribe.gateway_id, "gw-1");
            assert_eq!(settings.mqtt.subscribe.sink_id, "+");

            let database = settings.database.as_ref().unwrap();
            assert!(database.sanity());
            assert_eq!(database.port, 3306);
            assert_eq!(database.workers, 2);

            let http = settings.http.as_ref().unwrap();
            assert_eq!(http.port, 8000);
            assert!(http.debug_comms);
            assert!(!http.test_mode);

            assert_eq!(settings.inventory.number_of_runs, 3);
            assert!(settings.inventory.output_time);
            assert!(validate_settings(&settings).is_ok());
        },
    );
}

#[test]
fn test_environment_overrides_file_values() {
    let file = write_settings(SETTINGS_YAML);
    temp_env::with_vars(
        [
            ("TEST_WBC_MQTT_HOST", Some("broker.example")),
            ("TEST_WBC_MQTT_PASSWORD", Some("mqtt-secret")),
            ("WM_SERVICES_MQTT_PORT", Some("1883")),
            ("WM_SERVICES_MQTT_FORCE_UNSECURE", Some("yes")),
            ("WM_SERVICES_MYSQL_HOSTNAME", Some("db.internal")),
            ("WM_SERVICES_HTTP_PORT", Some("9000")),
            ("WM_SERVICES_WNT_HOSTNAME", Some("wnt.example")),
            ("WM_SERVICES_INFLUX_PASSWORD", Some("influx-secret")),
        ],
        || {
            let settings = load_settings(file.path().to_str().unwrap()).unwrap();

            assert_eq!(settings.mqtt.port, Some(1883));
            assert!(settings.mqtt.force_unsecure);
            assert_eq!(
                settings.database.as_ref().unwrap().hostname.as_deref(),
                Some("db.internal")
            );
            assert_eq!(settings.http.as_ref().unwrap().port, 9000);
            assert_eq!(settings.http.as_ref().unwrap().host, "127.0.0.1");
            assert_eq!(settings.services.wnt.hostname.as_deref(), Some("wnt.example"));
            assert_eq!(settings.services.influx.password.as_deref(), Some("influx-secret"));
        },
    );
}

#[test]
fn test_invalid_environment_value_is_an_error() {
    let file = write_settings(SETTINGS_YAML);
    temp_env::with_var("WM_SERVICES_MQTT_PORT", Some("not-a-port"), || {
        let err = load_settings(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("WM_SERVICES_MQTT_PORT"));
    });
}

#[test]
fn test_missing_settings_file_falls_back_to_environment() {
    temp_env::with_vars(
        [
            ("WM_SERVICES_MQTT_HOSTNAME", Some("mosquitto")),
            ("WM_SERVICES_MQTT_USERNAME", Some("user")),
            ("WM_SERVICES_MQTT_PASSWORD", Some("pass")),
            ("WM_SERVICES_MYSQL_HOSTNAME", None),
            ("WM_SERVICES_MYSQL_PORT", None),
            ("WM_SERVICES_MYSQL_USERNAME", None),
            ("WM_SERVICES_MYSQL_PASSWORD", None),
            ("WM_SERVICES_MYSQL_DATABASE", None),
            ("WM_SERVICES_HTTP_PORT", None),
        ],
        || {
            let settings = Settings::load_or_env("/nonexistent/settings.yaml").unwrap();
            assert_eq!(settings.mqtt.hostname.as_deref(), Some("mosquitto"));
            assert!(settings.mqtt.sanity());
            assert!(settings.database.is_none());
            assert!(settings.http.is_none());
        },
    );
}

#[test]
fn test_redacted_settings_hide_passwords() {
    let file = write_settings(SETTINGS_YAML);
    temp_env::with_vars(
        [
            ("TEST_WBC_MQTT_HOST", Some("broker.example")),
            ("TEST_WBC_MQTT_PASSWORD", Some("mqtt-secret")),
        ],
        || {
            let settings = load_settings(file.path().to_str().unwrap()).unwrap();
            let dump = serde_yaml::to_string(&settings.redacted()).unwrap();
            assert!(!dump.contains("mqtt-secret"));
            assert!(!dump.contains("secret\n"));
            assert!(dump.contains("broker.example"));
        },
    );
}

#[test]
fn test_read_target_nodes() {
    let file = write_settings("1\n\n  42 \n4294967295\n");
    let nodes = read_target_nodes(file.path().to_str().unwrap()).unwrap();
    assert_eq!(nodes.len(), 3);
    assert!(nodes.contains(&42));

    let bad = write_settings("1\nnode-2\n");
    assert!(read_target_nodes(bad.path().to_str().unwrap()).is_err());

    assert!(read_target_nodes("/nonexistent/nodes.txt").unwrap().is_empty());
}
