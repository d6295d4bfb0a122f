//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Command line of the mirroring bridge.
#[derive(Parser, Debug, Clone)]
#[command(about = "Mirror a shared-state store onto Zenoh channels", version)]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long, default_value = "statemirror.json5")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Mirror an in-process store fed with synthetic values instead of the
    /// configured remote store.
    #[arg(long)]
    pub demo: bool,
}
