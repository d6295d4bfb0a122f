//! Output channel registry.
//!
//! Holds exactly one [`Binding`] per sanitized name. Channels are created
//! lazily on the first request for a name and reused afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use statemirror_common::{MirrorMessage, MirrorValue, SanitizedName, ValueKind};

use crate::error::{BridgeError, Result};
use crate::messaging::Messaging;
use crate::store::{Entry, Revision};

/// The value a binding last published and the store revision it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub revision: Revision,
    pub value: MirrorValue,
}

/// Result of [`Binding::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The value was published and recorded.
    Published,
    /// A value at the same or a newer revision was already published.
    Stale { last: Revision },
}

#[derive(Debug, Default)]
struct PublishState {
    last: Option<Published>,
    /// Newest published revision of every entry sharing the channel.
    revisions: HashMap<Entry, Revision>,
}

/// Association of an entry, its channel name and its output channel.
pub struct Binding<C> {
    entry: Entry,
    name: SanitizedName,
    kind: ValueKind,
    channel: C,
    state: tokio::sync::Mutex<PublishState>,
}

impl<C> std::fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("entry", &self.entry)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<C> Binding<C> {
    /// The entry that created the binding.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn name(&self) -> &SanitizedName {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The last successfully published value.
    pub async fn last_published(&self) -> Option<Published> {
        self.state.lock().await.last.clone()
    }

    /// Publish `value` of `entry` taken at `revision`.
    ///
    /// Holds the binding lock across the publish, so publishes on one
    /// binding never interleave. Values not newer than the last one
    /// published for the same entry are dropped; entries sharing the
    /// channel do not make each other stale. A failed publish leaves the
    /// last value untouched.
    pub async fn publish<M>(
        &self,
        messaging: &M,
        entry: &Entry,
        revision: Revision,
        value: MirrorValue,
    ) -> Result<PublishOutcome>
    where
        M: Messaging<Channel = C>,
    {
        let mut state = self.state.lock().await;
        if let Some(&last) = state.revisions.get(entry) {
            if last >= revision {
                return Ok(PublishOutcome::Stale { last });
            }
        }

        let message = MirrorMessage::new(&entry.owner, &entry.value, value.clone());
        messaging.publish(&self.channel, &message).await?;

        state.revisions.insert(entry.clone(), revision);
        state.last = Some(Published { revision, value });
        Ok(PublishOutcome::Published)
    }
}

type Slot<C> = Arc<OnceCell<Arc<Binding<C>>>>;

/// Registry of output channels keyed by [`SanitizedName`].
pub struct PublisherRegistry<M: Messaging> {
    messaging: Arc<M>,
    slots: Mutex<HashMap<SanitizedName, Slot<M::Channel>>>,
}

impl<M: Messaging> std::fmt::Debug for PublisherRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("bindings", &self.len())
            .finish_non_exhaustive()
    }
}

impl<M: Messaging> PublisherRegistry<M> {
    pub fn new(messaging: Arc<M>) -> Self {
        Self {
            messaging,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The messaging collaborator channels are created on.
    pub fn messaging(&self) -> &Arc<M> {
        &self.messaging
    }

    /// Return the binding of `name`, creating its channel if needed.
    ///
    /// Concurrent calls for one name create at most one channel. A failed
    /// creation is retried by the next call. Requesting an existing name
    /// with a different kind fails with [`BridgeError::TypeConflict`] and
    /// leaves the existing binding untouched.
    pub async fn get_or_create(
        &self,
        entry: &Entry,
        name: &SanitizedName,
        kind: ValueKind,
    ) -> Result<Arc<Binding<M::Channel>>> {
        let slot = self.slots.lock().entry(name.clone()).or_default().clone();

        let binding = slot
            .get_or_try_init(|| async {
                let channel = self.messaging.create_channel(name, kind).await?;
                tracing::info!(entry = %entry, name = %name, kind = %kind, "Created channel");
                Ok::<_, BridgeError>(Arc::new(Binding {
                    entry: entry.clone(),
                    name: name.clone(),
                    kind,
                    channel,
                    state: tokio::sync::Mutex::default(),
                }))
            })
            .await?
            .clone();

        if binding.kind != kind {
            return Err(BridgeError::TypeConflict {
                name: name.clone(),
                existing: binding.kind,
                requested: kind,
            });
        }

        if binding.entry != *entry {
            tracing::warn!(
                entry = %entry,
                bound_to = %binding.entry,
                name = %name,
                "Entries share a channel name; publishing both on one channel"
            );
        }

        Ok(binding)
    }

    /// Binding of `name`, if its channel exists.
    pub fn get(&self, name: &str) -> Option<Arc<Binding<M::Channel>>> {
        self.slots.lock().get(name).and_then(|slot| slot.get().cloned())
    }

    /// Number of bindings with a created channel.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all bindings, sorted.
    pub fn names(&self) -> Vec<SanitizedName> {
        let mut names: Vec<_> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MemoryMessaging;
    use statemirror_common::sanitize;
    use std::time::Duration;

    fn registry() -> PublisherRegistry<MemoryMessaging> {
        PublisherRegistry::new(Arc::new(MemoryMessaging::new()))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let registry = registry();
        let entry = Entry::new("b", "x.y");
        let name = sanitize("b", "x.y");

        let first = registry
            .get_or_create(&entry, &name, ValueKind::Float)
            .await
            .unwrap();
        let second = registry
            .get_or_create(&entry, &name, ValueKind::Float)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.channel(), second.channel());
        assert_eq!(registry.messaging().creations("b/x/y"), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec![name]);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_type_conflict() {
        let registry = registry();
        let name = sanitize("b", "x");

        let binding = registry
            .get_or_create(&Entry::new("b", "x"), &name, ValueKind::Float)
            .await
            .unwrap();
        let result = registry
            .get_or_create(&Entry::new("b", "x"), &name, ValueKind::Text)
            .await;

        assert!(matches!(
            result,
            Err(BridgeError::TypeConflict {
                existing: ValueKind::Float,
                requested: ValueKind::Text,
                ..
            })
        ));
        assert_eq!(binding.kind(), ValueKind::Float);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_compatible_collision_shares_binding() {
        let registry = registry();
        let name = sanitize("b", "x.y");

        let first = registry
            .get_or_create(&Entry::new("b", "x.y"), &name, ValueKind::Float)
            .await
            .unwrap();
        let second = registry
            .get_or_create(&Entry::new("b", "x/y"), &name, ValueKind::Float)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.entry(), &Entry::new("b", "x.y"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_creates_once() {
        let messaging = Arc::new(MemoryMessaging::new().with_create_delay(Duration::from_millis(20)));
        let registry = Arc::new(PublisherRegistry::new(messaging.clone()));
        let entry = Entry::new("b", "x");
        let name = sanitize("b", "x");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (registry, entry, name) = (registry.clone(), entry.clone(), name.clone());
            handles.push(tokio::spawn(async move {
                registry
                    .get_or_create(&entry, &name, ValueKind::Integer)
                    .await
                    .map(|binding| binding.channel().id)
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 0);
        }
        assert_eq!(messaging.creations("b/x"), 1);
    }

    #[tokio::test]
    async fn test_publish_drops_stale_revisions() {
        let registry = registry();
        let entry = Entry::new("b", "x");
        let binding = registry
            .get_or_create(&entry, &sanitize("b", "x"), ValueKind::Float)
            .await
            .unwrap();
        let messaging = registry.messaging().clone();

        let outcome = binding
            .publish(messaging.as_ref(), &entry, Revision(2), MirrorValue::Float(2.0))
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Published);

        let outcome = binding
            .publish(messaging.as_ref(), &entry, Revision(1), MirrorValue::Float(1.0))
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Stale { last: Revision(2) });

        let last = binding.last_published().await.unwrap();
        assert_eq!(last.value, MirrorValue::Float(2.0));
        assert_eq!(messaging.published("b/x").len(), 1);
    }

    #[tokio::test]
    async fn test_shared_channel_tracks_revisions_per_entry() {
        let registry = registry();
        let name = sanitize("b", "x.y");
        let dotted = Entry::new("b", "x.y");
        let slashed = Entry::new("b", "x/y");
        let binding = registry
            .get_or_create(&dotted, &name, ValueKind::Float)
            .await
            .unwrap();
        registry
            .get_or_create(&slashed, &name, ValueKind::Float)
            .await
            .unwrap();
        let messaging = registry.messaging().clone();

        binding
            .publish(messaging.as_ref(), &dotted, Revision(2), MirrorValue::Float(2.0))
            .await
            .unwrap();
        let outcome = binding
            .publish(messaging.as_ref(), &slashed, Revision(1), MirrorValue::Float(1.0))
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Published);

        let outcome = binding
            .publish(messaging.as_ref(), &slashed, Revision(1), MirrorValue::Float(1.0))
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Stale { last: Revision(1) });

        let owners: Vec<_> = messaging
            .published("b/x/y")
            .into_iter()
            .map(|m| (m.value, m.data))
            .collect();
        assert_eq!(
            owners,
            vec![
                ("x.y".to_string(), MirrorValue::Float(2.0)),
                ("x/y".to_string(), MirrorValue::Float(1.0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_unknown_name() {
        let registry = registry();
        registry
            .get_or_create(&Entry::new("b", "x"), &sanitize("b", "x"), ValueKind::Float)
            .await
            .unwrap();

        assert!(registry.get("b/x").is_some());
        assert!(registry.get("b/y").is_none());
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_last_value() {
        let registry = registry();
        let entry = Entry::new("b", "x");
        let binding = registry
            .get_or_create(&entry, &sanitize("b", "x"), ValueKind::Float)
            .await
            .unwrap();
        let messaging = registry.messaging().clone();

        binding
            .publish(messaging.as_ref(), &entry, Revision(1), MirrorValue::Float(1.0))
            .await
            .unwrap();

        messaging.fail_publishes(1);
        assert!(
            binding
                .publish(messaging.as_ref(), &entry, Revision(2), MirrorValue::Float(2.0))
                .await
                .is_err()
        );
        assert_eq!(
            binding.last_published().await.map(|p| p.revision),
            Some(Revision(1))
        );

        binding
            .publish(messaging.as_ref(), &entry, Revision(3), MirrorValue::Float(3.0))
            .await
            .unwrap();
        assert_eq!(messaging.published("b/x").len(), 2);
    }
}
