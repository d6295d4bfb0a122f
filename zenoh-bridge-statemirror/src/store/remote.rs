//! Remote store reached through Zenoh queries.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use zenoh::Session;

use statemirror_common::{StoreValue, decode_auto, parse_store_key};

use super::{ChangeListener, Entry, Revision, Snapshot, StateStore, SyncOutcome};
use crate::config::StoreConfig;
use crate::error::{BridgeError, Result};

/// [`StateStore`] backed by a remote store that answers Zenoh queries.
///
/// Every sync issues `get("<key_expr>/**")` and ingests the replies. A reply
/// key `<key_expr>/<owner>/<a>/<b>` is the entry `(owner, "a.b")` and its
/// payload a JSON or CBOR encoded [`StoreValue`]. The store counts as
/// populated once a completed query returned at least one value.
pub struct ZenohStore {
    config: StoreConfig,
    session: Mutex<Option<Session>>,
    snapshot: Snapshot,
}

impl std::fmt::Debug for ZenohStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohStore")
            .field("endpoint", &self.config.endpoint)
            .field("key_expr", &self.config.key_expr)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl ZenohStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            snapshot: Snapshot::new(),
        }
    }

    fn session(&self) -> Result<Session> {
        self.session
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::sync("store session is not open"))
    }

    fn selector(&self) -> String {
        format!("{}/**", self.config.key_expr)
    }
}

impl StateStore for ZenohStore {
    async fn connect(&self) -> Result<()> {
        let session = statemirror_common::connect(&self.config.zenoh())
            .await
            .map_err(|e| BridgeError::connection(format!("{}: {}", self.config.endpoint, e)))?;

        info!(
            endpoint = %self.config.endpoint,
            key_expr = %self.config.key_expr,
            "Connected to store"
        );

        *self.session.lock() = Some(session);
        Ok(())
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        let session = self.session()?;
        let selector = self.selector();

        let replies = session
            .get(selector.as_str())
            .timeout(Duration::from_millis(self.config.query_timeout_ms))
            .await
            .map_err(|e| BridgeError::sync(format!("query {} failed: {}", selector, e)))?;

        let mut updates = Vec::new();
        while let Ok(reply) = replies.recv_async().await {
            match reply.result() {
                Ok(sample) => {
                    let key = sample.key_expr().as_str();
                    let Some((owner, value)) = parse_store_key(&self.config.key_expr, key) else {
                        trace!(key = %key, "Ignoring key outside the store layout");
                        continue;
                    };

                    let payload = sample.payload().to_bytes();
                    match decode_auto::<StoreValue>(&payload) {
                        Ok(data) => updates.push((Entry::new(owner, value), data)),
                        Err(e) => {
                            debug!(key = %key, error = %e, "Undecodable store payload");
                        }
                    }
                }
                Err(err) => {
                    warn!(selector = %selector, error = ?err, "Store replied with an error");
                }
            }
        }

        let populated = !updates.is_empty();
        Ok(self.snapshot.ingest(updates, populated))
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
        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Error closing store session");
            }
        }
    }
}
