//! Zenoh channels backed by advanced publishers.
//!
//! Each channel caches its last samples so a subscriber that joins after a
//! value was published still receives it, and supports sample miss
//! detection and publisher detection.

use std::sync::Arc;
use std::time::Duration;

use zenoh::Session;
use zenoh_ext::{AdvancedPublisher, AdvancedPublisherBuilderExt, CacheConfig, MissDetectionConfig};

use statemirror_common::{Format, MirrorMessage, SanitizedName, ValueKind, build_key, encode};

use super::Messaging;
use crate::error::{BridgeError, Result};

/// Configuration for channel publishers.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Number of samples to cache per channel.
    /// Default: 1
    pub cache_size: usize,

    /// Enable sample miss detection.
    /// Default: true
    pub miss_detection: bool,

    /// Heartbeat interval for miss detection.
    /// Default: 500ms
    pub heartbeat_interval: Duration,

    /// Enable publisher detection (allows subscribers to detect this publisher).
    /// Default: true
    pub publisher_detection: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            cache_size: 1,
            miss_detection: true,
            heartbeat_interval: Duration::from_millis(500),
            publisher_detection: true,
        }
    }
}

impl ChannelConfig {
    /// Create a minimal config with only caching enabled.
    pub fn cache_only(cache_size: usize) -> Self {
        Self {
            cache_size,
            miss_detection: false,
            heartbeat_interval: Duration::from_millis(500),
            publisher_detection: false,
        }
    }
}

/// An output channel on Zenoh.
pub struct ZenohChannel {
    key: String,
    kind: ValueKind,
    publisher: AdvancedPublisher<'static>,
}

impl std::fmt::Debug for ZenohChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohChannel")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ZenohChannel {
    /// Full key expression of the channel.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// [`Messaging`] implementation publishing on a Zenoh session.
#[derive(Clone)]
pub struct ZenohMessaging {
    /// Zenoh session.
    session: Arc<Session>,
    /// Key prefix (e.g., "statemirror").
    key_prefix: String,
    /// Serialization format.
    format: Format,
    /// Configuration for new publishers.
    config: ChannelConfig,
}

impl std::fmt::Debug for ZenohMessaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohMessaging")
            .field("key_prefix", &self.key_prefix)
            .field("format", &self.format)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ZenohMessaging {
    pub fn new(
        session: Arc<Session>,
        key_prefix: impl Into<String>,
        format: Format,
        config: ChannelConfig,
    ) -> Self {
        Self {
            session,
            key_prefix: key_prefix.into(),
            format,
            config,
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Messaging for ZenohMessaging {
    type Channel = ZenohChannel;

    async fn create_channel(&self, name: &SanitizedName, kind: ValueKind) -> Result<ZenohChannel> {
        let key = build_key(&self.key_prefix, name);

        let mut builder = self
            .session
            .declare_publisher(key.clone())
            .cache(CacheConfig::default().max_samples(self.config.cache_size));
        if self.config.miss_detection {
            builder = builder.sample_miss_detection(
                MissDetectionConfig::default().heartbeat(self.config.heartbeat_interval),
            );
        }
        if self.config.publisher_detection {
            builder = builder.publisher_detection();
        }

        let publisher: AdvancedPublisher<'static> =
            builder.await.map_err(|e| BridgeError::PublishFailure {
                key: key.clone(),
                message: format!("Failed to create publisher: {}", e),
            })?;

        tracing::debug!(
            key = %key,
            kind = %kind,
            cache_size = self.config.cache_size,
            "Created channel publisher"
        );

        Ok(ZenohChannel {
            key,
            kind,
            publisher,
        })
    }

    async fn publish(&self, channel: &ZenohChannel, message: &MirrorMessage) -> Result<()> {
        let payload =
            encode(message, self.format).map_err(|e| BridgeError::Serialization(e.to_string()))?;

        channel
            .publisher
            .put(payload)
            .await
            .map_err(|e| BridgeError::PublishFailure {
                key: channel.key.clone(),
                message: e.to_string(),
            })
    }
}
