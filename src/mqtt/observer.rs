use std::collections::HashSet;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    TlsConfiguration, Transport,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::requests::{GatewayRequest, GatewayState, GatewayStatus, GetConfigsResponse};
use super::topics::{
    topic_matches, Topics, GET_CONFIGS_RESPONSE_PREFIX, RECEIVED_DATA_PREFIX, STATUS_PREFIX,
};
use crate::config::models::MqttSettings;
use crate::errors::{DecodeError, MqttError};
use crate::messages::{Message, ReceivedData};
use crate::runtime::ExitSignal;

const CLIENT_ID_PREFIX: &str = "wm-gw-cli";
const REQUEST_CHANNEL_CAPACITY: usize = 100;

/// What an incoming publish turned out to be.
#[derive(Debug)]
pub enum Incoming {
    Message(Message),
    Configs(GetConfigsResponse),
    GatewayOnline(String),
    Ignored,
}

/// Classifies one publish. Received data from endpoints outside
/// `allowed_endpoints` is ignored; an empty set allows everything.
pub fn route_publish(
    topic: &str,
    payload: &[u8],
    allowed_endpoints: &HashSet<u8>,
) -> Result<Incoming, DecodeError> {
    if topic.starts_with(RECEIVED_DATA_PREFIX) {
        Topics::parse_received_data(topic)?;
        let data = ReceivedData::from_json(payload)?;
        if !allowed_endpoints.is_empty() && !allowed_endpoints.contains(&data.source_endpoint) {
            return Ok(Incoming::Ignored);
        }
        return Ok(Incoming::Message(Message::from_received_data(data)));
    }

    if topic.starts_with(GET_CONFIGS_RESPONSE_PREFIX) {
        return Ok(Incoming::Configs(GetConfigsResponse::from_json(payload)?));
    }

    if topic.starts_with(STATUS_PREFIX) {
        let status = GatewayStatus::from_json(payload)?;
        return Ok(match status.state {
            GatewayState::Online => Incoming::GatewayOnline(status.gw_id),
            GatewayState::Offline => Incoming::Ignored,
        });
    }

    Ok(Incoming::Ignored)
}

/// Exponential reconnect delay, doubled after each failure and reset on ConnAck.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Builds the broker transport from the settings. TLS verifies the broker
/// against `ca_certs` when it can be read, and against the host certificate
/// store otherwise.
pub fn transport(settings: &MqttSettings) -> Result<Transport, MqttError> {
    if settings.force_unsecure {
        return Ok(Transport::Tcp);
    }
    if settings.allow_untrusted {
        warn!("allow_untrusted is not supported by the TLS transport, broker certificates are verified");
    }

    let config = match &settings.ca_certs {
        Some(path) => match std::fs::read(path) {
            Ok(pem) => {
                native_tls::Certificate::from_pem(&pem)?;
                TlsConfiguration::SimpleNative {
                    ca: pem,
                    client_auth: None,
                }
            }
            Err(e) => {
                error!(
                    path = %path,
                    error = %e,
                    "Could not load CA certificate, using host certificate store"
                );
                TlsConfiguration::Native
            }
        },
        None => TlsConfiguration::Native,
    };
    Ok(Transport::tls_with_config(config))
}

pub fn mqtt_options(settings: &MqttSettings) -> Result<MqttOptions, MqttError> {
    let hostname = settings
        .hostname
        .clone()
        .ok_or_else(|| MqttError::Settings("missing hostname".to_string()))?;
    let port = settings
        .port
        .ok_or_else(|| MqttError::Settings("missing port".to_string()))?;

    let client_id = format!("{}:{}", CLIENT_ID_PREFIX, Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, hostname, port);
    options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));
    options.set_clean_session(settings.clean_session());
    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        options.set_credentials(username.clone(), password.clone());
    }
    options.set_transport(transport(settings)?);
    Ok(options)
}

/// Sole owner of the event loop, so an in-flight `poll` is never dropped.
/// Waits out the reconnect backoff after every connection error.
async fn poll_events(
    mut eventloop: EventLoop,
    mut backoff: ReconnectBackoff,
    tx: mpsc::Sender<Result<Event, ConnectionError>>,
) {
    loop {
        let event = eventloop.poll().await;
        let retry = match &event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
                backoff.reset();
                None
            }
            Ok(_) => None,
            Err(_) => Some(backoff.next_delay()),
        };
        if tx.send(event).await.is_err() {
            return;
        }
        if let Some(delay) = retry {
            debug!(delay_secs = delay.as_secs(), "Waiting before reconnecting");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Bridges the gateway fleet on the broker with the local channels.
pub struct MqttObserver {
    settings: MqttSettings,
    exit: ExitSignal,
    filters: Vec<String>,
    message_tx: Option<mpsc::UnboundedSender<Message>>,
    configs_tx: Option<mpsc::UnboundedSender<GetConfigsResponse>>,
    request_tx: mpsc::Sender<GatewayRequest>,
    request_rx: mpsc::Receiver<GatewayRequest>,
}

impl MqttObserver {
    pub fn new(settings: MqttSettings, exit: ExitSignal) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let filters = vec![Topics::received_data_filter(&settings.subscribe)];
        Self {
            settings,
            exit,
            filters,
            message_tx: None,
            configs_tx: None,
            request_tx,
            request_rx,
        }
    }

    /// Forwards decoded received data to `tx`.
    pub fn with_messages(mut self, tx: mpsc::UnboundedSender<Message>) -> Self {
        self.message_tx = Some(tx);
        self
    }

    /// Subscribes to gateway configuration responses and status events and
    /// forwards the responses to `tx`.
    pub fn with_configs(mut self, tx: mpsc::UnboundedSender<GetConfigsResponse>) -> Self {
        self.filters.push(Topics::get_configs_response_filter());
        self.filters.push(Topics::status_filter());
        self.configs_tx = Some(tx);
        self
    }

    /// Handle used by other tasks to publish gateway requests.
    pub fn requests(&self) -> mpsc::Sender<GatewayRequest> {
        self.request_tx.clone()
    }

    pub async fn run(self) -> Result<(), MqttError> {
        let options = match mqtt_options(&self.settings) {
            Ok(options) => options,
            Err(e) => {
                self.exit.set();
                return Err(e);
            }
        };
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        self.run_with(client, eventloop).await
    }

    async fn run_with(mut self, client: AsyncClient, eventloop: EventLoop) -> Result<(), MqttError> {
        let backoff = ReconnectBackoff::new(
            Duration::from_secs(self.settings.reconnect_min_delay_secs),
            Duration::from_secs(self.settings.reconnect_max_delay_secs),
        );
        let (event_tx, mut event_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let poller = tokio::spawn(poll_events(eventloop, backoff, event_tx));

        info!(
            hostname = ?self.settings.hostname,
            port = ?self.settings.port,
            filters = ?self.filters,
            "Starting MQTT observer"
        );

        let result = self.handle_events(&client, &mut event_rx).await;
        poller.abort();
        result
    }

    async fn handle_events(
        &mut self,
        client: &AsyncClient,
        events: &mut mpsc::Receiver<Result<Event, ConnectionError>>,
    ) -> Result<(), MqttError> {
        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(self.settings.heartbeat_secs.max(1)));
        let mut connected_once = false;

        loop {
            tokio::select! {
                _ = self.exit.wait() => {
                    info!("Exit requested, disconnecting from broker");
                    if let Err(e) = client.try_disconnect() {
                        debug!(error = %e, "Disconnect request was not queued");
                    }
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    debug!(connected = connected_once, "MQTT loop alive");
                }
                Some(request) = self.request_rx.recv() => {
                    self.publish(client, &request);
                }
                event = events.recv() => match event {
                    Some(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                        info!(code = ?ack.code, session_present = ack.session_present, "Connected to broker");
                        if ack.code == ConnectReturnCode::Success {
                            connected_once = true;
                            self.subscribe_all(client);
                        } else {
                            error!(code = ?ack.code, "Broker refused the connection");
                        }
                    }
                    Some(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                        self.on_publish(client, &publish.topic, &publish.payload);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if !connected_once {
                            error!(error = %e, "Could not connect to broker");
                            self.exit.set();
                            return Err(e.into());
                        }
                        error!(error = %e, "Broker connection lost, retrying");
                    }
                    None => {
                        warn!("MQTT event loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn subscribe_all(&self, client: &AsyncClient) {
        for filter in &self.filters {
            match client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                Ok(()) => debug!(filter = %filter, "Subscribed"),
                Err(e) => error!(filter = %filter, error = %e, "Subscribe failed"),
            }
        }
    }

    fn on_publish(&self, client: &AsyncClient, topic: &str, payload: &[u8]) {
        if !self.filters.iter().any(|filter| topic_matches(filter, topic)) {
            debug!(topic = %topic, "Publish outside of subscriptions");
            return;
        }

        match route_publish(topic, payload, &self.settings.allowed_endpoints) {
            Ok(Incoming::Message(message)) => {
                if let Some(tx) = &self.message_tx {
                    if tx.send(message).is_err() {
                        warn!("Message consumer is gone, dropping packet");
                    }
                }
            }
            Ok(Incoming::Configs(response)) => {
                if let Some(tx) = &self.configs_tx {
                    if tx.send(response).is_err() {
                        warn!("Configuration consumer is gone, dropping response");
                    }
                }
            }
            Ok(Incoming::GatewayOnline(gw_id)) => {
                info!(gw_id = %gw_id, "Gateway online, requesting configuration");
                self.publish(client, &GatewayRequest::GetConfigs { gw_id });
            }
            Ok(Incoming::Ignored) => {}
            Err(e) => warn!(topic = %topic, error = %e, "Could not decode publish"),
        }
    }

    fn publish(&self, client: &AsyncClient, request: &GatewayRequest) {
        let outgoing = request.to_outgoing();
        debug!(topic = %outgoing.topic, "Publishing gateway request");
        if let Err(e) = client.try_publish(outgoing.topic, QoS::ExactlyOnce, false, outgoing.payload) {
            error!(gw_id = %request.gw_id(), error = %e, "Publish failed, stopping");
            self.exit.set();
        }
    }
}
