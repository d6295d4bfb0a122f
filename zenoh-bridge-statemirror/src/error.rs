//! Error types for the mirroring bridge.

use statemirror_common::{SanitizedName, ValueKind};
use thiserror::Error;

use crate::store::Entry;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The shared-state store is unreachable.
    #[error("Store connection failed: {0}")]
    ConnectionFailure(String),

    /// One synchronization round against the store failed.
    #[error("Store sync failed: {0}")]
    SyncTransientFailure(String),

    /// The store never signalled that its initial population completed.
    #[error("Store did not finish initial population within {timeout_ms}ms")]
    DiscoveryTimedOut { timeout_ms: u64 },

    /// A channel name is already bound with a different value type.
    #[error("Channel {name} is bound as {existing}, refusing {requested}")]
    TypeConflict {
        name: SanitizedName,
        existing: ValueKind,
        requested: ValueKind,
    },

    /// The value of an entry has no channel representation.
    #[error("Entry {entry} holds an unsupported {found} value")]
    UnsupportedType { entry: Entry, found: &'static str },

    /// An enumerated entry had no value when read.
    #[error("Entry {entry} has no value")]
    MissingValue { entry: Entry },

    /// Publishing a single message failed.
    #[error("Failed to publish to {key}: {message}")]
    PublishFailure { key: String, message: String },

    /// Zenoh session error.
    #[error("Zenoh session error: {0}")]
    ZenohSession(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Liveliness token error.
    #[error("Liveliness error: {0}")]
    Liveliness(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a store connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailure(msg.into())
    }

    /// Create a transient sync error.
    pub fn sync(msg: impl Into<String>) -> Self {
        Self::SyncTransientFailure(msg.into())
    }

    /// Create a liveliness error.
    pub fn liveliness(msg: impl Into<String>) -> Self {
        Self::Liveliness(msg.into())
    }

    /// Whether this error aborts the bridge.
    ///
    /// Everything else is isolated to one entry or one sync tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure(_)
                | Self::DiscoveryTimedOut { .. }
                | Self::Config(_)
                | Self::ConfigNotFound { .. }
                | Self::ConfigParse(_)
                | Self::ConfigValidation(_)
        )
    }
}

impl From<zenoh::Error> for BridgeError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<statemirror_common::Error> for BridgeError {
    fn from(err: statemirror_common::Error) -> Self {
        use statemirror_common::Error as Common;
        match err {
            Common::Config(msg) => Self::Config(msg),
            Common::Zenoh(e) => Self::ZenohSession(e.to_string()),
            e @ (Common::Encode { .. } | Common::Decode { .. }) => {
                Self::Serialization(e.to_string())
            }
        }
    }
}
