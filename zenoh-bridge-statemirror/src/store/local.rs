//! In-process store with a simulated remote side.
//!
//! Writes made through a [`RemoteWriter`] are staged and only become
//! visible to the bridge on the next [`StateStore::sync`], the same way a
//! remote store's changes only arrive when the client syncs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use statemirror_common::StoreValue;

use super::{ChangeListener, Entry, Revision, Snapshot, StateStore, SyncOutcome};
use crate::error::{BridgeError, Result};

#[derive(Debug, Default)]
struct Staging {
    pending: Vec<(Entry, StoreValue)>,
    complete: bool,
}

/// Remote side of a [`LocalStore`].
#[derive(Debug, Clone)]
pub struct RemoteWriter {
    staging: Arc<Mutex<Staging>>,
}

impl RemoteWriter {
    /// Write a value; it is delivered on the next sync.
    pub fn set(&self, owner: &str, value: &str, data: impl Into<StoreValue>) {
        self.staging
            .lock()
            .pending
            .push((Entry::new(owner, value), data.into()));
    }

    /// Mark the initial population as complete.
    ///
    /// The sync that drains the writes made before this call reports the
    /// store as populated.
    pub fn complete_population(&self) {
        self.staging.lock().complete = true;
    }
}

/// In-process [`StateStore`].
#[derive(Debug)]
pub struct LocalStore {
    snapshot: Snapshot,
    staging: Arc<Mutex<Staging>>,
    connected: AtomicBool,
    refused_connects: AtomicUsize,
    failing_syncs: AtomicUsize,
    syncs: AtomicU64,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            snapshot: Snapshot::new(),
            staging: Arc::new(Mutex::new(Staging::default())),
            connected: AtomicBool::new(false),
            refused_connects: AtomicUsize::new(0),
            failing_syncs: AtomicUsize::new(0),
            syncs: AtomicU64::new(0),
        }
    }

    /// Handle for writing on the remote side.
    pub fn writer(&self) -> RemoteWriter {
        RemoteWriter {
            staging: self.staging.clone(),
        }
    }

    /// Refuse the next `attempts` connection attempts.
    pub fn refuse_connects(self, attempts: usize) -> Self {
        self.refused_connects.store(attempts, Ordering::SeqCst);
        self
    }

    /// Fail the next `rounds` sync rounds.
    pub fn fail_syncs(&self, rounds: usize) {
        self.failing_syncs.store(rounds, Ordering::SeqCst);
    }

    /// Number of sync rounds attempted so far.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Decrement `counter` if it is non-zero, returning whether it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl StateStore for LocalStore {
    async fn connect(&self) -> Result<()> {
        if take_one(&self.refused_connects) {
            return Err(BridgeError::connection("local store refused the connection"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        self.syncs.fetch_add(1, Ordering::SeqCst);

        if !self.is_connected() {
            return Err(BridgeError::sync("not connected"));
        }
        if take_one(&self.failing_syncs) {
            return Err(BridgeError::sync("injected sync failure"));
        }

        let (updates, complete) = {
            let mut staging = self.staging.lock();
            (std::mem::take(&mut staging.pending), staging.complete)
        };

        Ok(self.snapshot.ingest(updates, complete))
    }

    fn owners(&self) -> Vec<String> {
        self.snapshot.owners()
    }

    fn values(&self, owner: &str) -> Vec<String> {
        self.snapshot.values(owner)
    }

    fn get(&self, entry: &Entry) -> Option<(StoreValue, Revision)> {
        self.snapshot.get(entry)
    }

    fn on_change(&self, entry: &Entry, listener: ChangeListener) {
        self.snapshot.listen(entry, listener);
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
