//! Typed views over the adapter's string property maps.
//!
//! Adapters receive their settings as `name -> value` maps. The worker pool
//! settings come from the global property map and fall back to the defaults
//! in [`Constants`]; the exposed transport is a per-adapter property with no
//! default.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::Constants;
use crate::error::ConfigError;

/// Which listener endpoint a resource is exposed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Plain UDP (`coap`).
    Plain,
    /// DTLS-secured (`coaps`).
    Secure,
}

impl TransportMode {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Plain => Constants::TRANSPORT_COAP,
            Self::Secure => Constants::TRANSPORT_COAPS,
        }
    }

    /// Read the required `transports` property from an adapter property map.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        properties
            .get(Constants::EXPOSED_TRANSPORTS)
            .ok_or_else(|| ConfigError::MissingProperty(Constants::EXPOSED_TRANSPORTS.into()))?
            .parse()
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            Constants::TRANSPORT_COAP => Ok(Self::Plain),
            Constants::TRANSPORT_COAPS => Ok(Self::Secure),
            other => Err(ConfigError::UnsupportedTransport(other.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Worker pool sizing, read once from the first adapter's global properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub keep_alive: Duration,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: Constants::DEFAULT_MIN_THREAD,
            max_workers: Constants::DEFAULT_MAX_THREAD,
            keep_alive: Duration::from_millis(Constants::DEFAULT_KEEP_ALIVE_MILLIS),
            queue_capacity: Constants::DEFAULT_JOB_QUEUE_SIZE,
        }
    }
}

impl PoolConfig {
    /// Build a config from a global property map. Absent keys take their
    /// defaults; present keys must parse and satisfy
    /// `0 < min_workers <= max_workers` and `queue_capacity > 0`.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let min_workers = parse_or(properties, Constants::MIN_THREAD_NAME, defaults.min_workers)?;
        let max_workers = parse_or(properties, Constants::MAX_THREAD_NAME, defaults.max_workers)?;
        let keep_alive_ms = parse_or(
            properties,
            Constants::KEEP_ALIVE_TIME_NAME,
            Constants::DEFAULT_KEEP_ALIVE_MILLIS,
        )?;
        let queue_capacity =
            parse_or(properties, Constants::JOB_QUEUE_SIZE_NAME, defaults.queue_capacity)?;

        let config = Self {
            min_workers,
            max_workers,
            keep_alive: Duration::from_millis(keep_alive_ms),
            queue_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::invalid(
                Constants::MIN_THREAD_NAME,
                &self.min_workers.to_string(),
                "must be greater than zero",
            ));
        }
        if self.max_workers < self.min_workers {
            return Err(ConfigError::invalid(
                Constants::MAX_THREAD_NAME,
                &self.max_workers.to_string(),
                format!("must not be less than {} ({})", Constants::MIN_THREAD_NAME, self.min_workers),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                Constants::JOB_QUEUE_SIZE_NAME,
                "0",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_or<T>(properties: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match properties.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string())),
        None => Ok(default),
    }
}
