//! Environment configuration for both tiers.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{InterfaceSelector, DEFAULT_INTERFACE_HINTS};
use crate::error::ConfigError;
use crate::relay;
use crate::window;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_CAPTURE_PORT: u16 = 3000;
const DEFAULT_DATABASE_SERVER: &str = "localhost";
const DEFAULT_DATABASE_PORT: u16 = 4000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Largest accepted window capacity.
pub const MAX_WINDOW_CAPACITY: usize = 1_000_000;

/// Configuration for the capture tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub bind_address: String,
    pub port: u16,
    pub interface: Option<String>,
    pub capture_address: Option<IpAddr>,
    pub interface_hints: Vec<String>,
    pub window_capacity: usize,
    pub database_server: String,
    pub database_port: u16,
    pub relay_period: Duration,
    pub relay_timeout: Duration,
    pub log_level: String,
}

impl CaptureConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve environment variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interface_hints = match lookup("BEARWATCH_INTERFACE_HINTS") {
            Some(val) => val
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            None => DEFAULT_INTERFACE_HINTS.iter().map(|h| h.to_string()).collect(),
        };

        Ok(CaptureConfig {
            bind_address: lookup("BEARWATCH_BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: parse_or(&lookup, "BEARWATCH_PORT", DEFAULT_CAPTURE_PORT)?,
            interface: lookup("BEARWATCH_INTERFACE").filter(|v| !v.trim().is_empty()),
            capture_address: parse_optional(&lookup, "BEARWATCH_CAPTURE_ADDRESS")?,
            interface_hints,
            window_capacity: parse_or(
                &lookup,
                "BEARWATCH_WINDOW_CAPACITY",
                window::DEFAULT_CAPACITY,
            )?,
            database_server: lookup("DATABASE_SERVER")
                .unwrap_or_else(|| DEFAULT_DATABASE_SERVER.to_string()),
            database_port: parse_or(&lookup, "DATABASE_SERVER_PORT", DEFAULT_DATABASE_PORT)?,
            relay_period: Duration::from_secs(parse_or(
                &lookup,
                "BEARWATCH_RELAY_PERIOD_SECS",
                relay::DEFAULT_PERIOD.as_secs(),
            )?),
            relay_timeout: Duration::from_secs(parse_or(
                &lookup,
                "BEARWATCH_RELAY_TIMEOUT_SECS",
                relay::DEFAULT_TIMEOUT.as_secs(),
            )?),
            log_level: lookup("BEARWATCH_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
        .and_then(CaptureConfig::validated)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.window_capacity == 0 || self.window_capacity > MAX_WINDOW_CAPACITY {
            return Err(ConfigError::Invalid {
                key: "BEARWATCH_WINDOW_CAPACITY",
                value: self.window_capacity.to_string(),
            });
        }
        if self.relay_period.is_zero() {
            return Err(ConfigError::Invalid {
                key: "BEARWATCH_RELAY_PERIOD_SECS",
                value: "0".to_string(),
            });
        }
        if self.relay_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "BEARWATCH_RELAY_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    /// URL of the ingestion endpoint relay batches are posted to.
    pub fn ingest_url(&self) -> String {
        format!(
            "http://{}:{}/save-packets",
            self.database_server, self.database_port
        )
    }

    /// Interface selector built from the capture settings.
    pub fn interface_selector(&self) -> InterfaceSelector {
        InterfaceSelector::new()
            .with_name(self.interface.clone())
            .with_address(self.capture_address)
            .with_hints(&self.interface_hints)
    }

    pub fn tracing_filter(&self) -> String {
        tracing_filter(&self.log_level)
    }
}

/// Configuration for the ingestion/query tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub bind_address: String,
    pub port: u16,
    pub store_path: Option<PathBuf>,
    pub log_level: String,
}

impl StoreConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve environment variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(StoreConfig {
            bind_address: lookup("DATABASE_SERVER")
                .unwrap_or_else(|| DEFAULT_DATABASE_SERVER.to_string()),
            port: parse_or(&lookup, "DATABASE_SERVER_PORT", DEFAULT_DATABASE_PORT)?,
            store_path: lookup("BEARWATCH_STORE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_level: lookup("BEARWATCH_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    pub fn tracing_filter(&self) -> String {
        tracing_filter(&self.log_level)
    }
}

/// Filter directive limiting noisy dependencies to warnings.
fn tracing_filter(level: &str) -> String {
    format!("{},hyper=warn,reqwest=warn", level)
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(val) if val.trim().is_empty() => Ok(None),
        Some(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: val }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_capture_defaults() {
        let config = CaptureConfig::from_lookup(env(&[])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.interface, None);
        assert_eq!(config.capture_address, None);
        assert_eq!(config.interface_hints, vec!["wireless", "wi-fi"]);
        assert_eq!(config.window_capacity, 100);
        assert_eq!(config.relay_period, Duration::from_secs(5));
        assert_eq!(config.relay_timeout, Duration::from_secs(3));
        assert_eq!(config.ingest_url(), "http://localhost:4000/save-packets");
    }

    #[test]
    fn test_capture_overrides() {
        let config = CaptureConfig::from_lookup(env(&[
            ("BEARWATCH_PORT", "3100"),
            ("BEARWATCH_INTERFACE", "wlp2s0"),
            ("BEARWATCH_CAPTURE_ADDRESS", "192.168.0.102"),
            ("BEARWATCH_INTERFACE_HINTS", "wlan, wireless ,"),
            ("BEARWATCH_WINDOW_CAPACITY", "250"),
            ("DATABASE_SERVER", "db.local"),
            ("DATABASE_SERVER_PORT", "4100"),
            ("BEARWATCH_RELAY_PERIOD_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3100);
        assert_eq!(config.interface.as_deref(), Some("wlp2s0"));
        assert_eq!(
            config.capture_address,
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 102)))
        );
        assert_eq!(config.interface_hints, vec!["wlan", "wireless"]);
        assert_eq!(config.window_capacity, 250);
        assert_eq!(config.relay_period, Duration::from_secs(10));
        assert_eq!(config.ingest_url(), "http://db.local:4100/save-packets");
    }

    #[test]
    fn test_invalid_port() {
        let result = CaptureConfig::from_lookup(env(&[("BEARWATCH_PORT", "http")]));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                key: "BEARWATCH_PORT",
                value: "http".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_capture_address() {
        let result = CaptureConfig::from_lookup(env(&[("BEARWATCH_CAPTURE_ADDRESS", "wifi")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "BEARWATCH_CAPTURE_ADDRESS",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = CaptureConfig::from_lookup(env(&[("BEARWATCH_RELAY_PERIOD_SECS", "0")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "BEARWATCH_RELAY_PERIOD_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_window_capacity_bounds() {
        for value in ["0", "1000001", "18446744073709551615"] {
            let result = CaptureConfig::from_lookup(env(&[("BEARWATCH_WINDOW_CAPACITY", value)]));
            assert_eq!(
                result,
                Err(ConfigError::Invalid {
                    key: "BEARWATCH_WINDOW_CAPACITY",
                    value: value.to_string()
                })
            );
        }

        let config =
            CaptureConfig::from_lookup(env(&[("BEARWATCH_WINDOW_CAPACITY", "1000000")])).unwrap();
        assert_eq!(config.window_capacity, MAX_WINDOW_CAPACITY);
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = CaptureConfig::from_lookup(env(&[
            ("BEARWATCH_INTERFACE", " "),
            ("BEARWATCH_PORT", ""),
        ]))
        .unwrap();
        assert_eq!(config.interface, None);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_store_defaults() {
        let config = StoreConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.bind_address, "localhost");
        assert_eq!(config.port, 4000);
        assert_eq!(config.store_path, None);
        assert_eq!(config.tracing_filter(), "info,hyper=warn,reqwest=warn");
    }

    #[test]
    fn test_store_overrides() {
        let config = StoreConfig::from_lookup(env(&[
            ("DATABASE_SERVER", "0.0.0.0"),
            ("DATABASE_SERVER_PORT", "4500"),
            ("BEARWATCH_STORE_PATH", "/var/lib/bearwatch/packets.jsonl"),
            ("BEARWATCH_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 4500);
        assert_eq!(
            config.store_path,
            Some(PathBuf::from("/var/lib/bearwatch/packets.jsonl"))
        );
        assert_eq!(config.log_level, "debug");
    }
}
