use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::control::{execute, Command, CommandOutcome, GatewayMap, SinkEntry, DEFAULT_COMMAND};
use crate::errors::ControlError;
use crate::state::AppState;

const NO_CACHE_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

#[derive(Debug, Serialize, ToSchema)]
pub struct ControlResponse {
    pub path: String,
    pub params: HashMap<String, String>,
    #[schema(value_type = Object)]
    pub gateways_and_sinks: GatewayMap,
    pub command: String,
    pub text: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sinks: Vec<SinkEntry>,
}

impl IntoResponse for ControlResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, NO_CACHE_HEADERS, Json(self)).into_response()
    }
}

/// Decodes the query string. A parameter given twice is ambiguous and rejected.
pub fn query_params(query: Option<&str>) -> Result<HashMap<String, String>, ControlError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| ControlError::InvalidQuery(e.to_string()))?;
    let mut params = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        if params.contains_key(&key) {
            return Err(ControlError::InvalidField(key));
        }
        params.insert(key, value);
    }
    Ok(params)
}

/// First path segment, or `info` for the root path.
pub fn command_name(path: &str) -> &str {
    path.split('/')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_COMMAND)
}

#[utoipa::path(
    get,
    path = "/{command}",
    params(
        ("command" = String, Path, description = "One of datatx, start, stop, setconfig or info"),
    ),
    responses(
        (status = 200, description = "Command accepted", body = ControlResponse),
        (status = 500, description = "Unknown command or invalid parameters", body = ControlResponse),
    ),
    tag = "Control"
)]
pub async fn control(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Response {
    if method != Method::GET && method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let command = command_name(uri.path()).to_string();
    let (params, parsed) = match query_params(query.as_deref()) {
        Ok(params) => {
            let parsed = Command::parse(&command, &params);
            (params, parsed)
        }
        Err(e) => (HashMap::new(), Err(e)),
    };
    if state.debug_comms {
        info!(
            verb = %method,
            path = %uri,
            params = ?params,
            command = %command,
            "HTTP request"
        );
    }

    let gateways_and_sinks = state.registry.snapshot();
    let sinks = state.registry.sinks();

    let (code, text, outcome) = match parsed {
        Ok(parsed) => {
            info!(command = %command, "HTTP command received");
            let outcome = execute(&parsed, &sinks);
            (StatusCode::OK, format!("{} ok!", command), outcome)
        }
        Err(e) => {
            error!(command = %command, error = %e, "HTTP command failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), CommandOutcome::default())
        }
    };

    publish(&state, &outcome).await;

    let response = ControlResponse {
        path: uri.to_string(),
        params,
        gateways_and_sinks,
        command,
        text,
        code: code.as_u16(),
        sinks: outcome.sinks,
    };
    if state.debug_comms {
        info!(response = ?response, "HTTP response");
    }
    response.into_response()
}

async fn publish(state: &AppState, outcome: &CommandOutcome) {
    if outcome.data_requests.is_empty() && outcome.refresh_requests.is_empty() {
        return;
    }
    if state.test_mode {
        error!(
            data = outcome.data_requests.len(),
            config = outcome.refresh_requests.len(),
            "HTTP API test mode, not sending MQTT messages"
        );
        return;
    }
    let Some(tx) = &state.requests else {
        warn!("No MQTT connection, dropping gateway requests");
        return;
    };

    info!(
        data = outcome.data_requests.len(),
        config = outcome.refresh_requests.len(),
        "Sending MQTT messages"
    );
    for request in outcome.requests() {
        if state.debug_comms {
            info!(topic = %request.topic(), request = ?request, "Queueing gateway request");
        }
        if tx.send(request.clone()).await.is_err() {
            error!("MQTT observer is gone, gateway request dropped");
            return;
        }
    }
}
