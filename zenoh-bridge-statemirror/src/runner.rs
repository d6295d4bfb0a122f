//! Process lifecycle of the bridge.

use std::sync::Arc;

use tokio::signal;

use statemirror_common::{connect, init_tracing};

use crate::BridgeArgs;
use crate::bridge::{Bridge, DiscoveryReport};
use crate::config::{BridgeConfig, StatemirrorConfig};
use crate::error::{BridgeError, Result};
use crate::liveliness::Presence;
use crate::messaging::{ChannelConfig, ZenohMessaging};
use crate::status::StatusPublisher;
use crate::store::StateStore;

/// Runs a [`Bridge`] from configuration until the process is signalled.
///
/// Handles:
/// - Logging initialization
/// - Zenoh connection of the output side
/// - Status publishing and the liveliness token
/// - Graceful shutdown on Ctrl+C or SIGTERM
pub struct BridgeRunner {
    /// Bridge name for logging and status.
    name: String,
    version: String,
    config: StatemirrorConfig,
    /// Output Zenoh session.
    session: Arc<zenoh::Session>,
    status: StatusPublisher,
}

impl std::fmt::Debug for BridgeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeRunner")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl BridgeRunner {
    /// Initialize logging (with optional CLI override) and connect to Zenoh.
    pub async fn new(
        name: impl Into<String>,
        config: StatemirrorConfig,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|args| args.log_level.as_deref()) {
            Some(level) => config.logging().with_level(level),
            None => config.logging().clone(),
        };
        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohSession(e.to_string()))?,
        );
        tracing::info!(zid = %session.zid(), "Connected to Zenoh");

        let status = StatusPublisher::new(session.clone(), config.key_prefix(), &name, &version);

        Ok(Self {
            name,
            version,
            config,
            session,
            status,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StatemirrorConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Messaging on the output session, configured from `mirror`.
    pub fn messaging(&self) -> ZenohMessaging {
        let mirror = &self.config.mirror;
        ZenohMessaging::new(
            self.session.clone(),
            &mirror.key_prefix,
            mirror.format,
            ChannelConfig {
                cache_size: mirror.cache_size,
                ..ChannelConfig::default()
            },
        )
    }

    fn metadata(&self, report: &DiscoveryReport, bindings: usize, source: &str) -> serde_json::Value {
        serde_json::json!({
            "store": source,
            "key_prefix": self.config.mirror.key_prefix,
            "bindings": bindings,
            "discovery": report,
            "sync_interval_ms": self.config.mirror.sync_interval_ms,
        })
    }

    /// Mirror `store` until Ctrl+C or SIGTERM, then shut down gracefully.
    ///
    /// `source` names the store in the status message.
    pub async fn run<S: StateStore>(self, store: Arc<S>, source: &str) -> Result<()> {
        let presence = Presence::declare(&self.session, self.config.key_prefix()).await?;

        let mut bridge = Bridge::new(
            store,
            Arc::new(self.messaging()),
            self.config.mirror.clone(),
        );

        let report = match bridge.start().await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Bridge failed to start");
                if let Err(status_err) = self.status.publish_error(e.to_string()).await {
                    tracing::warn!(error = %status_err, "Failed to publish error status");
                }
                bridge.shutdown().await;
                presence.undeclare().await;
                self.close().await;
                return Err(e);
            }
        };

        let metadata = self.metadata(&report, bridge.registry().len(), source);
        if let Err(e) = self.status.publish_running(metadata).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            bridge = %self.name,
            channels = bridge.registry().len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        wait_for_shutdown().await;
        tracing::info!(bridge = %self.name, "Received shutdown signal");

        bridge.shutdown().await;

        if let Err(e) = self.status.publish_offline().await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }
        presence.undeclare().await;
        self.close().await;

        tracing::info!(bridge = %self.name, "Goodbye!");
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                }
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to listen for SIGTERM");
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
