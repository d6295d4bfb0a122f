//! Zenoh bridge mirroring a shared-state store.
//!
//! Every value found in a remote shared-state store is republished on its
//! own typed Zenoh channel and kept up to date from the store's change
//! notifications.
//!
//! # Overview
//!
//! - [`StateStore`] and [`Messaging`]: the store and middleware collaborators
//! - [`SyncPump`]: periodic store synchronization with a readiness signal
//! - [`discover`]: one-shot enumeration of the store's entries
//! - [`PublisherRegistry`]: one channel per sanitized name
//! - [`ChangeListenerBridge`] and [`Relay`]: seeding and change propagation
//! - [`Bridge`]: startup sequencing and shutdown
//! - [`BridgeRunner`]: process lifecycle (logging, status, presence, signals)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zenoh_bridge_statemirror::{Bridge, LocalStore, MemoryMessaging, MirrorConfig};
//!
//! let store = Arc::new(LocalStore::new());
//! let messaging = Arc::new(MemoryMessaging::new());
//!
//! let mut bridge = Bridge::new(store, messaging, MirrorConfig::default());
//! let report = bridge.start().await?;
//! // ...
//! bridge.shutdown().await;
//! ```

pub mod args;
pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod listener;
pub mod liveliness;
pub mod messaging;
pub mod pump;
pub mod registry;
pub mod runner;
pub mod stats;
pub mod status;
pub mod store;

pub use args::BridgeArgs;
pub use bridge::{Bridge, BridgeState, DiscoveryReport};
pub use config::{BridgeConfig, MirrorConfig, StatemirrorConfig, StoreConfig};
pub use discovery::{Discovery, discover};
pub use error::{BridgeError, Result};
pub use listener::{ChangeListenerBridge, Relay};
pub use messaging::{
    ChannelConfig, MemoryChannel, MemoryMessaging, Messaging, ZenohChannel, ZenohMessaging,
};
pub use pump::{ReadySignal, SyncPump};
pub use registry::{Binding, PublishOutcome, Published, PublisherRegistry};
pub use runner::BridgeRunner;
pub use stats::{MirrorStats, StatsSnapshot};
pub use status::{BridgeStatus, StatusPublisher};
pub use store::{Entry, LocalStore, RemoteWriter, Revision, StateStore, SyncOutcome, ZenohStore};

// Re-export commonly used types from statemirror-common
pub use statemirror_common::{
    Format, MirrorMessage, MirrorValue, SanitizedName, StoreValue, ValueKind, sanitize,
};
