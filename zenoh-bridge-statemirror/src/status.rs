//! Bridge status reporting on `<key_prefix>/@/status`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zenoh::Session;

use statemirror_common::status_key;

use crate::error::{BridgeError, Result};

/// Lifecycle phase announced in a [`BridgeStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    Offline,
    Error,
}

/// Bridge status message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name.
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    pub status: Phase,
    /// Additional metadata, flattened into the message.
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    fn new(bridge: &str, version: &str, status: Phase) -> Self {
        Self {
            bridge: bridge.to_string(),
            version: version.to_string(),
            status,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn running(bridge: &str, version: &str) -> Self {
        Self::new(bridge, version, Phase::Running)
    }

    pub fn offline(bridge: &str, version: &str) -> Self {
        Self::new(bridge, version, Phase::Offline)
    }

    pub fn error(bridge: &str, version: &str, error: impl Into<String>) -> Self {
        Self::new(bridge, version, Phase::Error)
            .with_metadata(serde_json::json!({ "error": error.into() }))
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Publishes [`BridgeStatus`] messages for one bridge.
#[derive(Clone)]
pub struct StatusPublisher {
    session: Arc<Session>,
    key: String,
    bridge_name: String,
    version: String,
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("key", &self.key)
            .field("bridge_name", &self.bridge_name)
            .finish_non_exhaustive()
    }
}

impl StatusPublisher {
    pub fn new(
        session: Arc<Session>,
        key_prefix: &str,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            session,
            key: status_key(key_prefix),
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    /// Key the status is published on.
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn publish(&self, status: &BridgeStatus) -> Result<()> {
        let payload = serde_json::to_vec(status)?;
        self.session
            .put(self.key.as_str(), payload)
            .await
            .map_err(|e| BridgeError::PublishFailure {
                key: self.key.clone(),
                message: e.to_string(),
            })
    }

    pub async fn publish_running(&self, metadata: serde_json::Value) -> Result<()> {
        let status =
            BridgeStatus::running(&self.bridge_name, &self.version).with_metadata(metadata);
        self.publish(&status).await
    }

    pub async fn publish_offline(&self) -> Result<()> {
        self.publish(&BridgeStatus::offline(&self.bridge_name, &self.version))
            .await
    }

    pub async fn publish_error(&self, error: impl Into<String>) -> Result<()> {
        self.publish(&BridgeStatus::error(&self.bridge_name, &self.version, error))
            .await
    }
}
