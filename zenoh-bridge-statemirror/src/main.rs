//! Zenoh bridge mirroring a shared-state store.
//!
//! Discovers every value of the configured store and republishes each one
//! on its own Zenoh channel under `<key_prefix>/<owner>/<value path>`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use zenoh_bridge_statemirror::{
    BridgeArgs, BridgeConfig, BridgeRunner, LocalStore, RemoteWriter, StatemirrorConfig,
    ZenohStore,
};

/// Configuration used by `--demo` when no config file exists.
const DEMO_CONFIG: &str = r#"{ store: { endpoint: "local" } }"#;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse();

    let config = if args.demo && !args.config.exists() {
        StatemirrorConfig::parse(DEMO_CONFIG)?
    } else {
        StatemirrorConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    };

    let runner = BridgeRunner::new("statemirror", config, Some(&args)).await?;

    if args.demo {
        let store = Arc::new(LocalStore::new());
        let writer = tokio::spawn(feed_demo_store(store.writer()));

        tracing::info!("Demo mode: mirroring an in-process store");
        let result = runner.run(store, "demo").await;
        writer.abort();
        result?;
    } else {
        let store_config = runner.config().store.clone();
        let source = store_config.endpoint.clone();

        tracing::info!(
            store = %source,
            key_expr = %store_config.key_expr,
            "Mirroring remote store"
        );
        runner.run(Arc::new(ZenohStore::new(store_config)), &source).await?;
    }

    Ok(())
}

/// Populate a small robot state and keep changing it.
async fn feed_demo_store(writer: RemoteWriter) {
    writer.set("arm", "joint.1.position", 0.0);
    writer.set("arm", "joint.2.position", 0.0);
    writer.set("arm", "gripper.closed", false);
    writer.set("base", "odometry.pose", vec![0.0, 0.0, 0.0]);
    writer.set("base", "mode", "idle");
    writer.set("base", "tick", 0i64);
    writer.complete_population();

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut tick = 0i64;
    loop {
        ticker.tick().await;
        tick += 1;

        let t = tick as f64 / 10.0;
        writer.set("arm", "joint.1.position", t.sin());
        writer.set("arm", "joint.2.position", t.cos());
        writer.set("arm", "gripper.closed", tick % 50 < 25);
        writer.set("base", "odometry.pose", vec![t.cos(), t.sin(), t]);
        writer.set("base", "mode", if tick % 100 < 50 { "idle" } else { "moving" });
        writer.set("base", "tick", tick);
    }
}
