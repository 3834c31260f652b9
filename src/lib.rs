pub mod config;
pub mod control;
pub mod errors;
pub mod handlers;
pub mod inventory;
pub mod logging;
pub mod messages;
pub mod mqtt;
pub mod openapi;
pub mod routes;
pub mod runtime;
pub mod state;
pub mod storage;

pub use axum;
pub use serde;
pub use serde_json;
