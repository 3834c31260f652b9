pub mod commands;
pub mod registry;

pub use commands::{execute, Command, CommandOutcome, DEFAULT_COMMAND};
pub use registry::{run_status_observer, GatewayMap, GatewayRegistry, SinkEntry, SinkState};
