//! Process configuration read from the environment

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    pub port: u16,
    /// Sleep between SSE emissions to mimic typing
    pub pacing: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let db_path = std::env::var("COMPANION_DB_PATH").map_or_else(
            |_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home)
                    .join(".brain-health-companion")
                    .join("companion.db")
            },
            PathBuf::from,
        );

        let port = std::env::var("COMPANION_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let pacing = std::env::var("COMPANION_PACING")
            .ok()
            .map_or(true, |v| parse_bool(&v));

        Self {
            db_path,
            port,
            pacing,
        }
    }
}

/// Anything but `0`, `false`, `no` or `off` counts as enabled
fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
