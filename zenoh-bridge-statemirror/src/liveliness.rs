//! Presence of the bridge as a Zenoh liveliness token.
//!
//! Subscribers to `<key_prefix>/@/alive` see the bridge appear when the
//! token is declared and disappear when it is undeclared, dropped or the
//! process dies.

use std::sync::Arc;

use zenoh::Session;
use zenoh::liveliness::LivelinessToken;

use statemirror_common::alive_key;

use crate::error::{BridgeError, Result};

/// Liveliness token held for the lifetime of the bridge.
#[derive(Debug)]
pub struct Presence {
    key: String,
    token: LivelinessToken,
}

impl Presence {
    /// Declare the bridge alive under `key_prefix`.
    pub async fn declare(session: &Arc<Session>, key_prefix: &str) -> Result<Self> {
        let key = alive_key(key_prefix);

        let token = session
            .liveliness()
            .declare_token(key.as_str())
            .await
            .map_err(|e| BridgeError::liveliness(format!("Failed to declare bridge token: {}", e)))?;

        tracing::info!(key = %key, "Bridge liveliness token declared");
        Ok(Self { key, token })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Withdraw the token before the session closes.
    pub async fn undeclare(self) {
        if let Err(e) = self.token.undeclare().await {
            tracing::warn!(key = %self.key, error = %e, "Failed to undeclare liveliness token");
        } else {
            tracing::debug!(key = %self.key, "Bridge liveliness token undeclared");
        }
    }
}
