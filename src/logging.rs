use tracing::Level;

use crate::config::constants::debug_level;

/// Maps a `DEBUG_LEVEL` value to a tracing level, defaulting to debug.
pub fn parse_level(value: &str) -> Level {
    match value.trim().to_ascii_lowercase().as_str() {
        "critical" | "error" => Level::ERROR,
        "warning" | "warn" => Level::WARN,
        "info" => Level::INFO,
        "trace" => Level::TRACE,
        _ => Level::DEBUG,
    }
}

pub fn init_logging() {
    let level = parse_level(&debug_level());
    tracing_subscriber::fmt().with_max_level(level).init();
}
