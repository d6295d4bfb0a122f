use serde::Serialize;
use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

const MODES: [&str; 3] = ["client", "peer", "router"];

/// Open a Zenoh session from a [`ZenohConfig`].
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_config(config)?;

    tracing::debug!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Opening Zenoh session"
    );

    let session = zenoh::open(zenoh_config).await?;
    tracing::debug!(zid = %session.zid(), "Zenoh session open");

    Ok(session)
}

/// Set `key` of a native configuration to the JSON form of `value`.
fn insert<T: Serialize + ?Sized>(config: &mut zenoh::Config, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| Error::Config(format!("Failed to serialize {}: {}", key, e)))?;
    config
        .insert_json5(key, &json)
        .map_err(|e| Error::Config(format!("Failed to set {}: {}", key, e)))
}

/// Translate a [`ZenohConfig`] into a native Zenoh configuration.
pub fn build_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    if !MODES.contains(&config.mode.as_str()) {
        return Err(Error::Config(format!(
            "Invalid Zenoh mode '{}', expected one of {:?}",
            config.mode, MODES
        )));
    }

    let mut zenoh_config = zenoh::Config::default();
    insert(&mut zenoh_config, "mode", config.mode.as_str())?;
    if !config.connect.is_empty() {
        insert(&mut zenoh_config, "connect/endpoints", &config.connect)?;
    }
    if !config.listen.is_empty() {
        insert(&mut zenoh_config, "listen/endpoints", &config.listen)?;
    }

    Ok(zenoh_config)
}
