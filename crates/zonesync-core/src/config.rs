//! Sync engine configuration.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

const ENV_CHUNK_SIZE: &str = "ZONESYNC_CHUNK_SIZE";
const ENV_MAX_RETRY_DELAY_SECS: &str = "ZONESYNC_MAX_RETRY_DELAY_SECS";
const ENV_TOKEN_PREFIX: &str = "ZONESYNC_TOKEN_PREFIX";
const ENV_STATUS_BLOCK_SIZE: &str = "ZONESYNC_STATUS_BLOCK_SIZE";
const ENV_COMPRESSION_THRESHOLD: &str = "ZONESYNC_COMPRESSION_THRESHOLD";

/// Tunables for one zone client and the adapters built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Ceiling for one sub-batch after the server rejects a batch as too large.
    pub chunk_size: usize,
    /// Server retry hints above this are clamped.
    pub max_retry_delay: Duration,
    /// Prefix of change-token keys in the local key-value store.
    pub token_key_prefix: String,
    /// Pending statuses pushed per block.
    pub status_block_size: usize,
    /// Text fields at or above this many bytes are compressed.
    pub compression_threshold: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            max_retry_delay: Duration::from_secs(300),
            token_key_prefix: "token".to_string(),
            status_block_size: 150,
            compression_threshold: 512,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `ZONESYNC_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = parse_positive(&lookup, ENV_CHUNK_SIZE)? {
            config.chunk_size = value;
        }
        if let Some(value) = parse_positive(&lookup, ENV_MAX_RETRY_DELAY_SECS)? {
            config.max_retry_delay = Duration::from_secs(value as u64);
        }
        if let Some(value) = parse_positive(&lookup, ENV_STATUS_BLOCK_SIZE)? {
            config.status_block_size = value;
        }
        if let Some(value) = parse_positive(&lookup, ENV_COMPRESSION_THRESHOLD)? {
            config.compression_threshold = value;
        }
        if let Some(prefix) = lookup(ENV_TOKEN_PREFIX) {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "{ENV_TOKEN_PREFIX} must not be empty"
                )));
            }
            config.token_key_prefix = prefix.to_string();
        }

        Ok(config)
    }

    /// Clamp a server-suggested delay to `max_retry_delay`.
    #[must_use]
    pub fn clamp_delay(&self, delay: Duration) -> Duration {
        delay.min(self.max_retry_delay)
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(Error::InvalidInput(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
        Ok(value) => Ok(Some(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<SyncConfig> {
        SyncConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let config = parse_from_map(&HashMap::new()).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.status_block_size, 150);
    }

    #[test]
    fn overrides_are_applied() {
        let mut map = HashMap::new();
        map.insert(ENV_CHUNK_SIZE, "50");
        map.insert(ENV_MAX_RETRY_DELAY_SECS, "30");
        map.insert(ENV_TOKEN_PREFIX, " zonetoken ");

        let config = parse_from_map(&map).unwrap();
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.max_retry_delay, Duration::from_secs(30));
        assert_eq!(config.token_key_prefix, "zonetoken");
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        for raw in ["0", "many", "-3"] {
            let mut map = HashMap::new();
            map.insert(ENV_CHUNK_SIZE, raw);
            let err = parse_from_map(&map).unwrap_err();
            match err {
                Error::InvalidInput(message) => assert!(message.contains(ENV_CHUNK_SIZE)),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn delays_are_clamped() {
        let config = SyncConfig::default();
        assert_eq!(
            config.clamp_delay(Duration::from_secs(3600)),
            Duration::from_secs(300)
        );
        assert_eq!(
            config.clamp_delay(Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }
}
