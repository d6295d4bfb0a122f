//! The shared-state store collaborator.
//!
//! The bridge only relies on the [`StateStore`] trait. Two implementations
//! are provided:
//!
//! - [`LocalStore`]: in-process store whose remote side is driven through a
//!   [`RemoteWriter`]; used by tests and the demo mode
//! - [`ZenohStore`]: pulls a remote store by querying `<key_expr>/**` on
//!   every sync round
//!
//! Both keep their state in a [`Snapshot`], which assigns revisions and
//! dispatches change notifications.

mod local;
mod remote;
mod snapshot;

use std::future::Future;

use statemirror_common::StoreValue;

use crate::error::Result;

pub use local::{LocalStore, RemoteWriter};
pub use remote::ZenohStore;
pub use snapshot::Snapshot;

/// One mirrored value: an owner (store member) and a value name under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    pub owner: String,
    pub value: String,
}

impl Entry {
    pub fn new(owner: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.owner, self.value)
    }
}

/// Store-wide change counter. Every ingested change gets a greater revision
/// than all changes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(pub u64);

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Callback invoked with the new value of an entry.
///
/// Runs on whichever task performs the sync, so it must not block.
pub type ChangeListener = Box<dyn Fn(&StoreValue, Revision) + Send + Sync>;

/// Result of one synchronization round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether the store has completed its initial population.
    pub populated: bool,
    /// Number of entries whose value changed or appeared.
    pub changed: usize,
    /// Number of listener invocations performed.
    pub notified: usize,
}

/// A shared-state store that can be mirrored.
pub trait StateStore: Send + Sync + 'static {
    /// Establish the connection to the store.
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Pull the latest remote state and deliver change notifications.
    fn sync(&self) -> impl Future<Output = Result<SyncOutcome>> + Send;

    /// Currently known owners.
    fn owners(&self) -> Vec<String>;

    /// Currently known value names under an owner.
    fn values(&self, owner: &str) -> Vec<String>;

    /// Current value of an entry and the revision it was written at.
    fn get(&self, entry: &Entry) -> Option<(StoreValue, Revision)>;

    /// Register a callback for future changes of an entry.
    fn on_change(&self, entry: &Entry, listener: ChangeListener);

    /// Release the connection.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}
