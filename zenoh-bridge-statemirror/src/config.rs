//! Configuration traits and the bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use statemirror_common::{Format, KEY_PREFIX, LoggingConfig, ZenohConfig};

use crate::error::{BridgeError, Result};

/// Trait for bridge configuration types.
///
/// Implementors get loading from JSON5 files with validation.
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration of the output side.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the key expression prefix for this bridge.
    fn key_prefix(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatemirrorConfig {
    /// Zenoh settings of the output side (where channels are published)
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Shared-state store settings
    pub store: StoreConfig,

    /// Mirroring settings
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to the shared-state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection target of the store (e.g. "tcp/172.17.0.1:7447")
    pub endpoint: String,

    /// Key expression under which the store answers queries
    #[serde(default = "default_store_key_expr")]
    pub key_expr: String,

    /// Zenoh mode used to reach the store
    #[serde(default = "default_store_mode")]
    pub mode: String,

    /// Timeout of one sync query in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_store_key_expr() -> String {
    "statestore".to_string()
}

fn default_store_mode() -> String {
    "client".to_string()
}

fn default_query_timeout_ms() -> u64 {
    1000
}

impl StoreConfig {
    /// Zenoh configuration of the store session.
    pub fn zenoh(&self) -> ZenohConfig {
        ZenohConfig {
            mode: self.mode.clone(),
            connect: vec![self.endpoint.clone()],
            listen: Vec::new(),
        }
    }
}

/// Mirroring behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Key expression prefix of the mirrored channels (default: "statemirror")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Period of the synchronization pump in milliseconds
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Maximum wait for the store's initial population in milliseconds
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Additional store connection attempts after the first one fails
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay before the first connection retry, doubled on every retry
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,

    /// Samples kept per channel for late-joining subscribers
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Serialization format of published messages
    #[serde(default)]
    pub format: Format,
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

fn default_sync_interval_ms() -> u64 {
    10
}

fn default_readiness_timeout_ms() -> u64 {
    5000
}

fn default_connect_retries() -> u32 {
    3
}

fn default_connect_backoff_ms() -> u64 {
    500
}

fn default_cache_size() -> usize {
    1
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            sync_interval_ms: default_sync_interval_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            connect_retries: default_connect_retries(),
            connect_backoff_ms: default_connect_backoff_ms(),
            cache_size: default_cache_size(),
            format: Format::default(),
        }
    }
}

impl MirrorConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

fn has_wildcard(key: &str) -> bool {
    key.contains(['*', '$', '?', '#'])
}

impl BridgeConfig for StatemirrorConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.mirror.key_prefix
    }

    fn validate(&self) -> Result<()> {
        if self.store.endpoint.trim().is_empty() {
            return Err(BridgeError::validation("store.endpoint cannot be empty"));
        }

        for (field, key) in [
            ("store.key_expr", &self.store.key_expr),
            ("mirror.key_prefix", &self.mirror.key_prefix),
        ] {
            if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
                return Err(BridgeError::validation(format!(
                    "{} '{}' is not a valid key expression",
                    field, key
                )));
            }
            if has_wildcard(key) {
                return Err(BridgeError::validation(format!(
                    "{} '{}' must not contain wildcards",
                    field, key
                )));
            }
        }

        if self.mirror.sync_interval_ms == 0 {
            return Err(BridgeError::validation(
                "mirror.sync_interval_ms must be greater than 0",
            ));
        }

        if self.mirror.readiness_timeout_ms == 0 {
            return Err(BridgeError::validation(
                "mirror.readiness_timeout_ms must be greater than 0",
            ));
        }

        if self.mirror.cache_size == 0 {
            return Err(BridgeError::validation(
                "mirror.cache_size must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found() {
        let result = StatemirrorConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = StatemirrorConfig::parse(r#"{ store: { endpoint: "tcp/172.17.0.1:7447" } }"#)
            .unwrap();

        assert_eq!(config.store.key_expr, "statestore");
        assert_eq!(config.store.mode, "client");
        assert_eq!(config.mirror.key_prefix, "statemirror");
        assert_eq!(config.mirror.sync_interval(), Duration::from_millis(10));
        assert_eq!(config.mirror.readiness_timeout(), Duration::from_secs(5));
        assert_eq!(config.mirror.connect_retries, 3);
        assert_eq!(config.mirror.format, Format::Json);
        assert_eq!(config.zenoh.mode, "peer");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            zenoh: { mode: "client", connect: ["tcp/10.0.0.2:7447"] },
            store: {
                endpoint: "tcp/172.17.0.1:7447",
                key_expr: "robot/state",
                query_timeout_ms: 250,
            },
            mirror: {
                key_prefix: "ros",
                sync_interval_ms: 20,
                readiness_timeout_ms: 1500,
                connect_retries: 0,
                cache_size: 4,
                format: "cbor",
            },
            logging: { level: "debug", format: "json" },
        }"#;

        let config = StatemirrorConfig::parse(json).unwrap();
        assert_eq!(config.key_prefix(), "ros");
        assert_eq!(config.store.key_expr, "robot/state");
        assert_eq!(config.store.query_timeout_ms, 250);
        assert_eq!(config.mirror.cache_size, 4);
        assert_eq!(config.mirror.format, Format::Cbor);
        assert_eq!(config.zenoh().connect, vec!["tcp/10.0.0.2:7447"]);

        let store_zenoh = config.store.zenoh();
        assert_eq!(store_zenoh.mode, "client");
        assert_eq!(store_zenoh.connect, vec!["tcp/172.17.0.1:7447"]);
    }

    #[test]
    fn test_parse_example_file() {
        let config = StatemirrorConfig::parse(include_str!("../statemirror.json5")).unwrap();
        assert_eq!(config.store.endpoint, "tcp/172.17.0.1:7447");
        assert_eq!(config.mirror.key_prefix, "statemirror");
        assert_eq!(config.mirror.cache_size, 1);
    }

    #[test]
    fn test_missing_store_section() {
        let result = StatemirrorConfig::parse("{}");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            r#"{ store: { endpoint: "" } }"#,
            r#"{ store: { endpoint: "tcp/h:1", key_expr: "a/*" } }"#,
            r#"{ store: { endpoint: "tcp/h:1" }, mirror: { key_prefix: "x/" } }"#,
            r#"{ store: { endpoint: "tcp/h:1" }, mirror: { sync_interval_ms: 0 } }"#,
            r#"{ store: { endpoint: "tcp/h:1" }, mirror: { readiness_timeout_ms: 0 } }"#,
            r#"{ store: { endpoint: "tcp/h:1" }, mirror: { cache_size: 0 } }"#,
        ];

        for case in cases {
            let result = StatemirrorConfig::parse(case);
            assert!(
                matches!(result, Err(BridgeError::ConfigValidation(_))),
                "expected validation error for {case}"
            );
        }
    }
}
