//! statemirror common library
//!
//! This crate provides shared types and utilities for the statemirror bridge:
//!
//! - [`value`] - Mirrored value model (`StoreValue`, `MirrorValue`, `MirrorMessage`)
//! - [`keyexpr`] - Entry name sanitizing and key expression builders
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Zenoh and logging configuration sections
//! - [`session`] - Zenoh session management
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod value;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, ZenohConfig};
pub use error::{Error, Result};
pub use keyexpr::{
    KEY_PREFIX, STORE_SEPARATOR, SanitizedName, TARGET_SEPARATOR, alive_key, build_key,
    mirror_wildcard, parse_store_key, sanitize, status_key,
};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;
pub use value::{
    MirrorMessage, MirrorValue, StoreValue, UnsupportedValue, ValueKind,
    current_timestamp_millis,
};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
