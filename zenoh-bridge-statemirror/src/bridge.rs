//! The mirroring bridge.
//!
//! Startup runs through [`BridgeState`]:
//!
//! ```text
//! Starting -> PumpRunning -> Discovering -> SteadyState -> Stopped
//! ```
//!
//! Discovery runs once. Entries that appear in the store after it are not
//! mirrored.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::MirrorConfig;
use crate::discovery::discover;
use crate::error::{BridgeError, Result};
use crate::listener::{ChangeListenerBridge, Relay};
use crate::messaging::Messaging;
use crate::pump::SyncPump;
use crate::registry::PublisherRegistry;
use crate::stats::MirrorStats;
use crate::store::StateStore;

/// Lifecycle state of a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Connecting to the store.
    Starting,
    /// Pump started, waiting for the store's initial population.
    PumpRunning,
    /// Enumerating and binding entries.
    Discovering,
    /// Relaying changes until shutdown.
    SteadyState,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BridgeState::Starting => "starting",
            BridgeState::PumpRunning => "pump_running",
            BridgeState::Discovering => "discovering",
            BridgeState::SteadyState => "steady_state",
            BridgeState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Outcome of the discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Entries enumerated.
    pub discovered: usize,
    /// Entries bound to a channel.
    pub bound: usize,
    /// Entries skipped for an unsupported value type.
    pub unsupported: usize,
    /// Entries refused because their channel name has another type.
    pub conflicts: usize,
    /// Entries that failed for any other reason.
    pub failed: usize,
}

/// Mirrors every entry of a [`StateStore`] onto [`Messaging`] channels.
pub struct Bridge<S: StateStore, M: Messaging> {
    store: Arc<S>,
    registry: Arc<PublisherRegistry<M>>,
    stats: Arc<MirrorStats>,
    config: MirrorConfig,
    state: watch::Sender<BridgeState>,
    pump: Option<SyncPump>,
    relay: Option<Relay>,
}

impl<S: StateStore, M: Messaging> std::fmt::Debug for Bridge<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &*self.state.borrow())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<S: StateStore, M: Messaging> Bridge<S, M> {
    pub fn new(store: Arc<S>, messaging: Arc<M>, config: MirrorConfig) -> Self {
        let (state, _) = watch::channel(BridgeState::Starting);
        Self {
            store,
            registry: Arc::new(PublisherRegistry::new(messaging)),
            stats: Arc::new(MirrorStats::new()),
            config,
            state,
            pump: None,
            relay: None,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    pub fn registry(&self) -> &Arc<PublisherRegistry<M>> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<MirrorStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn set_state(&self, state: BridgeState) {
        tracing::debug!(state = %state, "Bridge state");
        self.state.send_replace(state);
    }

    /// Connect, wait for the store's population, discover and bind.
    ///
    /// Fails with [`BridgeError::ConnectionFailure`] once all connection
    /// attempts are exhausted and with [`BridgeError::DiscoveryTimedOut`]
    /// if the store is not populated in time. Per-entry failures are
    /// counted in the returned report and do not fail the start.
    pub async fn start(&mut self) -> Result<DiscoveryReport> {
        self.set_state(BridgeState::Starting);
        self.connect_with_retry().await?;

        let pump = SyncPump::spawn(
            self.store.clone(),
            self.config.sync_interval(),
            self.stats.clone(),
        );
        let mut ready = pump.ready();
        self.pump = Some(pump);
        self.set_state(BridgeState::PumpRunning);

        let (relay, updates) = Relay::spawn(self.registry.messaging().clone(), self.stats.clone());
        self.relay = Some(relay);

        if let Err(e) = ready.wait(self.config.readiness_timeout()).await {
            tracing::error!(error = %e, "Store was not populated in time");
            self.shutdown().await;
            return Err(e);
        }

        self.set_state(BridgeState::Discovering);
        let listeners = ChangeListenerBridge::new(
            self.store.clone(),
            self.registry.clone(),
            self.stats.clone(),
            updates,
        );

        let mut report = DiscoveryReport::default();
        for entry in discover(self.store.as_ref()) {
            report.discovered += 1;
            match listeners.bind(&entry).await {
                Ok(_) => report.bound += 1,
                Err(e @ BridgeError::UnsupportedType { .. }) => {
                    report.unsupported += 1;
                    tracing::warn!(entry = %entry, error = %e, "Skipping entry");
                }
                Err(e @ BridgeError::TypeConflict { .. }) => {
                    report.conflicts += 1;
                    tracing::warn!(entry = %entry, error = %e, "Skipping entry");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(entry = %entry, error = %e, "Failed to bind entry");
                }
            }
        }

        self.set_state(BridgeState::SteadyState);
        tracing::info!(
            discovered = report.discovered,
            bound = report.bound,
            unsupported = report.unsupported,
            conflicts = report.conflicts,
            failed = report.failed,
            channels = self.registry.len(),
            "Discovery complete"
        );

        Ok(report)
    }

    async fn connect_with_retry(&self) -> Result<()> {
        let retries = self.config.connect_retries;
        let mut delay = self.config.connect_backoff();
        let mut attempt = 0;

        loop {
            match self.store.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Store connection failed, retrying"
                    );
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!(attempts = attempt + 1, error = %e, "Store connection failed");
                    return Err(e);
                }
            }
        }
    }

    /// Stop the pump, publish the queued updates and release the store.
    pub async fn shutdown(&mut self) {
        if self.state() == BridgeState::Stopped {
            return;
        }

        if let Some(pump) = self.pump.take() {
            pump.stop().await;
        }
        if let Some(relay) = self.relay.take() {
            relay.stop().await;
        }
        self.store.disconnect().await;

        self.set_state(BridgeState::Stopped);
        tracing::info!(stats = ?self.stats.snapshot(), "Bridge stopped");
    }
}
