//! Server configuration read from the environment (and `.env`)

use crate::types::TokenBudget;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Snapshot file for the memory store. None = nothing survives a restart.
    pub state_file: Option<PathBuf>,
    /// Budget for storms created without explicit token limits
    pub default_budget: TokenBudget,
    pub cors_permissive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            state_file: None,
            default_budget: TokenBudget::default(),
            cors_permissive: true,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
                default
            }
        },
        None => default,
    }
}

impl Config {
    /// Load config from environment variables:
    /// STORM_BIND_ADDR, STORM_STATE_FILE, STORM_DEFAULT_BLUE_TOKENS,
    /// STORM_DEFAULT_RED_TOKENS, STORM_CORS_PERMISSIVE
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = parsed_var("STORM_BIND_ADDR", defaults.bind_addr);
        let state_file = non_empty_var("STORM_STATE_FILE").map(PathBuf::from);
        let default_budget = TokenBudget {
            max_blue: parsed_var("STORM_DEFAULT_BLUE_TOKENS", defaults.default_budget.max_blue),
            max_red: parsed_var("STORM_DEFAULT_RED_TOKENS", defaults.default_budget.max_red),
        };
        let cors_permissive = non_empty_var("STORM_CORS_PERMISSIVE")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(defaults.cors_permissive);

        match &state_file {
            Some(path) => tracing::info!("Storm snapshots stored in {}", path.display()),
            None => tracing::warn!("STORM_STATE_FILE not set - storms are kept in memory only"),
        }

        Self {
            bind_addr,
            state_file,
            default_budget,
            cors_permissive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "STORM_BIND_ADDR",
        "STORM_STATE_FILE",
        "STORM_DEFAULT_BLUE_TOKENS",
        "STORM_DEFAULT_RED_TOKENS",
        "STORM_CORS_PERMISSIVE",
    ];

    fn clear_env() {
        for key in VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5001");
        assert_eq!(config.state_file, None);
        assert_eq!(config.default_budget, TokenBudget::default());
        assert!(config.cors_permissive);
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        std::env::set_var("STORM_BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("STORM_STATE_FILE", "/tmp/storms.json");
        std::env::set_var("STORM_DEFAULT_BLUE_TOKENS", "10");
        std::env::set_var("STORM_DEFAULT_RED_TOKENS", "0");
        std::env::set_var("STORM_CORS_PERMISSIVE", "false");

        let config = Config::from_env();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/storms.json")));
        assert_eq!(config.default_budget.max_blue, 10);
        assert_eq!(config.default_budget.max_red, 0);
        assert!(!config.cors_permissive);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("STORM_DEFAULT_BLUE_TOKENS", "lots");
        std::env::set_var("STORM_BIND_ADDR", "not an address");
        std::env::set_var("STORM_STATE_FILE", "   ");

        let config = Config::from_env();
        assert_eq!(config.default_budget.max_blue, 5);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5001");
        assert_eq!(config.state_file, None);
        clear_env();
    }
}
