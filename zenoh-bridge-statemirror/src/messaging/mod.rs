//! The publish/subscribe collaborator channels are created on.
//!
//! - [`ZenohMessaging`]: one Zenoh advanced publisher per channel
//! - [`MemoryMessaging`]: records creations and publishes in memory

mod advanced;
mod memory;

use std::future::Future;

use statemirror_common::{MirrorMessage, SanitizedName, ValueKind};

use crate::error::Result;

pub use advanced::{ChannelConfig, ZenohChannel, ZenohMessaging};
pub use memory::{MemoryChannel, MemoryMessaging};

/// Messaging middleware able to create typed channels and publish on them.
pub trait Messaging: Send + Sync + 'static {
    /// Handle of one output channel.
    type Channel: Send + Sync + 'static;

    /// Create the output channel `name` carrying values of `kind`.
    fn create_channel(
        &self,
        name: &SanitizedName,
        kind: ValueKind,
    ) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Publish a message on a channel.
    fn publish(
        &self,
        channel: &Self::Channel,
        message: &MirrorMessage,
    ) -> impl Future<Output = Result<()>> + Send;
}
