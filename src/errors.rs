use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("Payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },

    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Unexpected topic: {0}")]
    UnexpectedTopic(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::InvalidEnvelope(e.to_string())
    }
}

impl From<hex::FromHexError> for DecodeError {
    fn from(e: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl From<native_tls::Error> for MqttError {
    fn from(e: native_tls::Error) -> Self {
        MqttError::Tls(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

/// Failures of a control command. The display text is sent back to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControlError {
    #[error("Unknown command")]
    UnknownCommand(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize run information: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Interrupted before all reports were received")]
    Interrupted,
}
