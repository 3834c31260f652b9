pub mod constants;
pub mod lib;
pub mod models;
pub mod validation;

pub use lib::{load_settings, read_target_nodes};
pub use models::Settings;
