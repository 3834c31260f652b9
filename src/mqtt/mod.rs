pub mod observer;
pub mod requests;
pub mod topics;

pub use observer::{route_publish, Incoming, MqttObserver, ReconnectBackoff};
pub use requests::{
    GatewayRequest, GatewayState, GatewayStatus, GetConfigsResponse, OutgoingMessage,
    SinkConfigReport, SinkConfigUpdate,
};
pub use topics::{topic_matches, Topics};
