//! Tracing subscriber setup.

use crate::config::Settings;
use std::str::FromStr;
use tracing::Level;

/// Install a formatted subscriber at the level named in `settings`.
/// Unknown level names fall back to `info`; calling this twice is harmless.
pub fn init(settings: &Settings) {
    let level = parse_level(&settings.log_level);
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}

fn parse_level(name: &str) -> Level {
    Level::from_str(name.trim()).unwrap_or(Level::INFO)
}
