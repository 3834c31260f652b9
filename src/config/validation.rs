use super::models::Settings;

/// Validates the logical consistency of the settings.
/// Returns Ok(()) if valid, or Err(Vec<String>) with a list of error messages if invalid.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let mqtt = &settings.mqtt;
    if !mqtt.sanity() {
        let missing: Vec<&str> = [
            ("hostname", mqtt.hostname.is_none()),
            ("port", mqtt.port.is_none()),
            ("username", mqtt.username.is_none()),
            ("password", mqtt.password.is_none()),
        ]
        .iter()
        .filter(|(_, is_missing)| *is_missing)
        .map(|(name, _)| *name)
        .collect();
        errors.push(format!(
            "MQTT settings are incomplete, missing: {}.",
            missing.join(", ")
        ));
    }
    if mqtt.reconnect_min_delay_secs > mqtt.reconnect_max_delay_secs {
        errors.push(format!(
            "MQTT reconnect minimum delay ({}s) exceeds the maximum delay ({}s).",
            mqtt.reconnect_min_delay_secs, mqtt.reconnect_max_delay_secs
        ));
    }
    if mqtt.keep_alive_secs == 0 {
        errors.push("MQTT keep alive must be at least one second.".to_string());
    }

    if let Some(database) = &settings.database {
        if !database.sanity() {
            errors.push(
                "Database settings require hostname, username, password and database.".to_string(),
            );
        }
        if database.workers == 0 {
            errors.push("Database worker count must be positive.".to_string());
        }
    }

    if let Some(http) = &settings.http {
        if http.port == 0 {
            errors.push("HTTP port must be non-zero.".to_string());
        }
    }

    let inventory = &settings.inventory;
    if inventory.duration_secs == 0 {
        errors.push("Inventory duration must be positive.".to_string());
    }
    if inventory.number_of_runs == 0 {
        errors.push("Inventory number of runs must be positive.".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
