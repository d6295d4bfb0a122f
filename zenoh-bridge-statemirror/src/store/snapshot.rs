//! Local copy of the store state with change dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use statemirror_common::StoreValue;

use super::{ChangeListener, Entry, Revision, SyncOutcome};

#[derive(Debug, Clone)]
struct Stored {
    value: StoreValue,
    revision: Revision,
}

#[derive(Default)]
struct Inner {
    owners: BTreeMap<String, BTreeMap<String, Stored>>,
    listeners: HashMap<Entry, Vec<Arc<ChangeListener>>>,
    revision: u64,
    populated: bool,
}

/// The locally known state of a store.
///
/// Listeners are invoked after the lock is released, so a listener may read
/// the snapshot again.
#[derive(Default)]
pub struct Snapshot {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Snapshot")
            .field("owners", &inner.owners.len())
            .field("revision", &inner.revision)
            .field("populated", &inner.populated)
            .finish_non_exhaustive()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owners(&self) -> Vec<String> {
        self.inner.lock().owners.keys().cloned().collect()
    }

    pub fn values(&self, owner: &str) -> Vec<String> {
        self.inner
            .lock()
            .owners
            .get(owner)
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, entry: &Entry) -> Option<(StoreValue, Revision)> {
        let inner = self.inner.lock();
        let stored = inner.owners.get(&entry.owner)?.get(&entry.value)?;
        Some((stored.value.clone(), stored.revision))
    }

    pub fn listen(&self, entry: &Entry, listener: ChangeListener) {
        self.inner
            .lock()
            .listeners
            .entry(entry.clone())
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn is_populated(&self) -> bool {
        self.inner.lock().populated
    }

    /// Apply a batch of remote values.
    ///
    /// Unchanged values are ignored. Each changed value gets the next
    /// revision and is delivered to the listeners of its entry.
    pub fn ingest<I>(&self, updates: I, populated: bool) -> SyncOutcome
    where
        I: IntoIterator<Item = (Entry, StoreValue)>,
    {
        let mut pending = Vec::new();
        let mut outcome = SyncOutcome::default();

        {
            let mut inner = self.inner.lock();

            for (entry, value) in updates {
                let unchanged = inner
                    .owners
                    .get(&entry.owner)
                    .and_then(|values| values.get(&entry.value))
                    .is_some_and(|stored| stored.value == value);
                if unchanged {
                    continue;
                }

                inner.revision += 1;
                let revision = Revision(inner.revision);
                outcome.changed += 1;

                if let Some(listeners) = inner.listeners.get(&entry) {
                    pending.push((listeners.clone(), value.clone(), revision));
                }

                inner
                    .owners
                    .entry(entry.owner)
                    .or_default()
                    .insert(entry.value, Stored { value, revision });
            }

            inner.populated |= populated;
            outcome.populated = inner.populated;
        }

        for (listeners, value, revision) in pending {
            for listener in listeners {
                listener(&value, revision);
                outcome.notified += 1;
            }
        }

        outcome
    }
}
