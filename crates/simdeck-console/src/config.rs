//! Process configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// How often the history accumulator polls while a run is active.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Configuration for a console process.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// Base address of the simulation engine
    pub engine_url: String,

    /// Operator API listen address
    pub listen_addr: SocketAddr,

    /// Poll period while running
    pub poll_interval: Duration,

    /// Upper bound on any single engine request
    pub request_timeout: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://localhost:8000".to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Duration::from_millis(5000),
        }
    }
}

impl ConsoleConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let engine_url = lookup("SIMDECK_ENGINE_URL").unwrap_or(defaults.engine_url);

        let listen_addr = match lookup("SIMDECK_LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("SIMDECK_LISTEN_ADDR={raw}: {e}")))?,
            None => defaults.listen_addr,
        };

        let poll_interval = millis(&lookup, "SIMDECK_POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval);
        let request_timeout =
            millis(&lookup, "SIMDECK_REQUEST_TIMEOUT_MS")?.unwrap_or(defaults.request_timeout);

        Ok(Self {
            engine_url,
            listen_addr,
            poll_interval,
            request_timeout,
        })
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{key} must be positive"))),
        Ok(ms) => Ok(Some(Duration::from_millis(ms))),
        Err(e) => Err(Error::Config(format!("{key}={raw}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ConsoleConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.poll_interval, Duration::from_millis(2000));
    }

    #[test]
    fn reads_overrides() {
        let config = ConsoleConfig::from_lookup(lookup(&[
            ("SIMDECK_ENGINE_URL", "http://engine:9000"),
            ("SIMDECK_LISTEN_ADDR", "0.0.0.0:8080"),
            ("SIMDECK_POLL_INTERVAL_MS", "500"),
        ]))
        .unwrap();

        assert_eq!(config.engine_url, "http://engine:9000");
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values_are_errors() {
        let bad_addr = ConsoleConfig::from_lookup(lookup(&[("SIMDECK_LISTEN_ADDR", "nowhere")]));
        assert!(matches!(bad_addr, Err(Error::Config(_))));

        let zero = ConsoleConfig::from_lookup(lookup(&[("SIMDECK_POLL_INTERVAL_MS", "0")]));
        assert!(matches!(zero, Err(Error::Config(_))));
    }
}
