//! In-memory messaging that records what the bridge does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use statemirror_common::{MirrorMessage, SanitizedName, ValueKind};

use super::Messaging;
use crate::error::{BridgeError, Result};

/// Channel handle issued by [`MemoryMessaging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChannel {
    /// Creation sequence number, unique per messaging instance.
    pub id: usize,
    pub name: SanitizedName,
    pub kind: ValueKind,
}

#[derive(Debug, Default)]
struct Recorded {
    created: Vec<MemoryChannel>,
    published: HashMap<SanitizedName, Vec<MirrorMessage>>,
}

/// [`Messaging`] implementation keeping every creation and publish in memory.
#[derive(Debug, Default)]
pub struct MemoryMessaging {
    recorded: Mutex<Recorded>,
    failing_publishes: AtomicUsize,
    create_delay: Option<Duration>,
}

impl MemoryMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every channel creation, widening the window for concurrent
    /// creation requests.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Fail the next `count` publishes.
    pub fn fail_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// All channels created so far, in creation order.
    pub fn created(&self) -> Vec<MemoryChannel> {
        self.recorded.lock().created.clone()
    }

    /// Number of channels created for `name`.
    pub fn creations(&self, name: &str) -> usize {
        self.recorded
            .lock()
            .created
            .iter()
            .filter(|channel| channel.name.as_str() == name)
            .count()
    }

    /// Messages published on `name`, oldest first.
    pub fn published(&self, name: &str) -> Vec<MirrorMessage> {
        self.recorded
            .lock()
            .published
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent message published on `name`.
    pub fn last_published(&self, name: &str) -> Option<MirrorMessage> {
        self.published(name).pop()
    }
}

impl Messaging for MemoryMessaging {
    type Channel = MemoryChannel;

    async fn create_channel(&self, name: &SanitizedName, kind: ValueKind) -> Result<MemoryChannel> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let mut recorded = self.recorded.lock();
        let channel = MemoryChannel {
            id: recorded.created.len(),
            name: name.clone(),
            kind,
        };
        recorded.created.push(channel.clone());
        Ok(channel)
    }

    async fn publish(&self, channel: &MemoryChannel, message: &MirrorMessage) -> Result<()> {
        let failed = self
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BridgeError::PublishFailure {
                key: channel.name.to_string(),
                message: "injected publish failure".to_string(),
            });
        }

        self.recorded
            .lock()
            .published
            .entry(channel.name.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
