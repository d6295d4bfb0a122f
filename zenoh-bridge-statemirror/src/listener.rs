//! Binding of discovered entries to their channels.
//!
//! [`ChangeListenerBridge::bind`] publishes an entry's current value once
//! and registers a change listener for it. Listeners run inside the store's
//! sync round, so they only convert the new value and queue it; the
//! [`Relay`] task performs the publishes in the order the changes arrived.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use statemirror_common::{MirrorValue, StoreValue, ValueKind, sanitize};

use crate::error::{BridgeError, Result};
use crate::messaging::Messaging;
use crate::registry::{Binding, PublishOutcome, PublisherRegistry};
use crate::stats::MirrorStats;
use crate::store::{Entry, Revision, StateStore};

/// A converted value waiting to be published.
pub struct Update<C> {
    pub entry: Entry,
    pub binding: Arc<Binding<C>>,
    pub revision: Revision,
    pub value: MirrorValue,
}

impl<C> std::fmt::Debug for Update<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update")
            .field("entry", &self.entry)
            .field("name", self.binding.name())
            .field("revision", &self.revision)
            .field("value", &self.value)
            .finish()
    }
}

/// Sending half of the relay queue.
pub type UpdateSender<C> = mpsc::UnboundedSender<Update<C>>;

/// Convert a store value for a channel of kind `kind`.
///
/// Whole numbers widen onto float channels. Unsupported values and other
/// kind changes are counted, logged and dropped.
fn accept(stats: &MirrorStats, entry: &Entry, kind: ValueKind, value: StoreValue) -> Option<MirrorValue> {
    let value = match MirrorValue::try_from(value) {
        Ok(value) => value,
        Err(e) => {
            stats.record_unsupported();
            tracing::warn!(entry = %entry, found = e.found, "Dropping unsupported value");
            return None;
        }
    };

    let found = value.kind();
    let value = value.coerce(kind);
    if value.is_none() {
        stats.record_type_conflict();
        tracing::warn!(
            entry = %entry,
            bound = %kind,
            found = %found,
            "Dropping value that changed type"
        );
    }
    value
}

/// Publish one update and account for the outcome.
///
/// Failures are logged; the binding stays in place for the next update.
async fn relay<M: Messaging>(messaging: &M, stats: &MirrorStats, update: Update<M::Channel>) {
    let Update {
        entry,
        binding,
        revision,
        value,
    } = update;

    match binding.publish(messaging, &entry, revision, value).await {
        Ok(PublishOutcome::Published) => {
            stats.record_published();
            tracing::trace!(entry = %entry, name = %binding.name(), revision = %revision, "Published");
        }
        Ok(PublishOutcome::Stale { last }) => {
            stats.record_stale();
            tracing::debug!(
                entry = %entry,
                revision = %revision,
                last = %last,
                "Dropping stale update"
            );
        }
        Err(e) => {
            stats.record_publish_failure();
            tracing::warn!(entry = %entry, name = %binding.name(), error = %e, "Publish failed");
        }
    }
}

/// Task publishing the updates queued by change listeners.
#[derive(Debug)]
pub struct Relay {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Relay {
    /// Spawn the relay and return it with the sender listeners queue into.
    pub fn spawn<M: Messaging>(messaging: Arc<M>, stats: Arc<MirrorStats>) -> (Self, UpdateSender<M::Channel>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_relay(messaging, stats, rx, shutdown_rx));

        (Self { shutdown, handle }, tx)
    }

    /// Stop accepting updates, publish the ones already queued and exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Relay task failed");
        }
    }
}

async fn run_relay<M: Messaging>(
    messaging: Arc<M>,
    stats: Arc<MirrorStats>,
    mut rx: mpsc::UnboundedReceiver<Update<M::Channel>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            update = rx.recv() => match update {
                Some(update) => relay(messaging.as_ref(), &stats, update).await,
                None => return,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(update) = rx.recv().await {
        relay(messaging.as_ref(), &stats, update).await;
        drained += 1;
    }
    tracing::debug!(drained, "Relay stopped");
}

/// Binds entries to channels and keeps them updated.
pub struct ChangeListenerBridge<S: StateStore, M: Messaging> {
    store: Arc<S>,
    registry: Arc<PublisherRegistry<M>>,
    stats: Arc<MirrorStats>,
    updates: UpdateSender<M::Channel>,
}

impl<S: StateStore, M: Messaging> std::fmt::Debug for ChangeListenerBridge<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListenerBridge")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<S: StateStore, M: Messaging> ChangeListenerBridge<S, M> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<PublisherRegistry<M>>,
        stats: Arc<MirrorStats>,
        updates: UpdateSender<M::Channel>,
    ) -> Self {
        Self {
            store,
            registry,
            stats,
            updates,
        }
    }

    /// Bind `entry`: create or reuse its channel, publish its current
    /// value and forward its future changes to the relay.
    ///
    /// Fails with [`BridgeError::MissingValue`] if the entry has no value,
    /// [`BridgeError::UnsupportedType`] if the value has no channel
    /// representation (no channel is created) and
    /// [`BridgeError::TypeConflict`] if its channel name is taken by a
    /// value of another kind. A failed seed publish does not fail the bind.
    pub async fn bind(&self, entry: &Entry) -> Result<Arc<Binding<M::Channel>>> {
        let (value, revision) = self
            .store
            .get(entry)
            .ok_or_else(|| BridgeError::MissingValue {
                entry: entry.clone(),
            })?;

        let value = MirrorValue::try_from(value).map_err(|e| {
            self.stats.record_unsupported();
            BridgeError::UnsupportedType {
                entry: entry.clone(),
                found: e.found,
            }
        })?;

        let name = sanitize(&entry.owner, &entry.value);
        let binding = self
            .registry
            .get_or_create(entry, &name, value.kind())
            .await
            .inspect_err(|e| {
                if matches!(e, BridgeError::TypeConflict { .. }) {
                    self.stats.record_type_conflict();
                }
            })?;

        self.listen(entry, binding.clone());

        // A change made between the first read and the listener
        // registration is not delivered to the listener; seed with the
        // newest value instead.
        let (value, revision) = match self.store.get(entry) {
            Some((latest, latest_revision)) if latest_revision > revision => {
                match accept(&self.stats, entry, binding.kind(), latest) {
                    Some(latest) => (latest, latest_revision),
                    None => (value, revision),
                }
            }
            _ => (value, revision),
        };

        let seed = Update {
            entry: entry.clone(),
            binding: binding.clone(),
            revision,
            value,
        };
        relay(self.registry.messaging().as_ref(), &self.stats, seed).await;

        tracing::debug!(entry = %entry, name = %name, kind = %binding.kind(), "Bound entry");
        Ok(binding)
    }

    fn listen(&self, entry: &Entry, binding: Arc<Binding<M::Channel>>) {
        let updates = self.updates.clone();
        let stats = self.stats.clone();
        let owned = entry.clone();

        self.store.on_change(
            entry,
            Box::new(move |value: &StoreValue, revision: Revision| {
                stats.record_notification();
                let Some(value) = accept(&stats, &owned, binding.kind(), value.clone()) else {
                    return;
                };
                let update = Update {
                    entry: owned.clone(),
                    binding: binding.clone(),
                    revision,
                    value,
                };
                if updates.send(update).is_err() {
                    tracing::trace!(entry = %owned, "Relay stopped; dropping update");
                }
            }),
        );
    }
}
