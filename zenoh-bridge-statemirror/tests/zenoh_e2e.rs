//! End-to-end tests publishing mirrored values through Zenoh.
//!
//! Zenoh requires a multi-thread tokio runtime. Each test uses a unique key
//! prefix to avoid interference.

use std::sync::Arc;
use std::time::Duration;

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use statemirror_common::session::build_config;
use statemirror_common::{ZenohConfig, decode_auto, encode, mirror_wildcard};
use zenoh_bridge_statemirror::{
    Bridge, ChannelConfig, Entry, Format, LocalStore, Messaging, MirrorConfig, MirrorMessage,
    MirrorValue, StateStore, StoreConfig, StoreValue, ValueKind, ZenohMessaging, ZenohStore,
    sanitize,
};

fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_channel_publish_reaches_subscriber() {
    let prefix = unique_prefix();
    let session = Arc::new(
        zenoh::open(zenoh::Config::default())
            .await
            .expect("Failed to open Zenoh session"),
    );

    let subscriber = session
        .declare_subscriber(mirror_wildcard(&prefix))
        .await
        .expect("Failed to create subscriber");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let messaging = ZenohMessaging::new(
        session.clone(),
        &prefix,
        Format::Cbor,
        ChannelConfig::cache_only(1),
    );
    let channel = messaging
        .create_channel(&sanitize("arm", "joint.1"), ValueKind::Float)
        .await
        .expect("Failed to create channel");
    assert_eq!(channel.key(), format!("{}/arm/joint/1", prefix));

    let message = MirrorMessage::new("arm", "joint.1", MirrorValue::Float(0.25));
    messaging
        .publish(&channel, &message)
        .await
        .expect("Failed to publish");

    let sample = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive message");

    assert_eq!(sample.key_expr().as_str(), format!("{}/arm/joint/1", prefix));
    let decoded: MirrorMessage =
        decode_auto(&sample.payload().to_bytes()).expect("Failed to decode");
    assert_eq!(decoded.data, MirrorValue::Float(0.25));
    assert_eq!(decoded.kind, ValueKind::Float);

    drop(subscriber);
    drop(channel);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bridge_mirrors_store_onto_zenoh() {
    let prefix = unique_prefix();
    let session = Arc::new(
        zenoh::open(zenoh::Config::default())
            .await
            .expect("Failed to open Zenoh session"),
    );

    let subscriber = session
        .declare_subscriber(mirror_wildcard(&prefix))
        .await
        .expect("Failed to create subscriber");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let store = Arc::new(LocalStore::new());
    let writer = store.writer();
    writer.set("b", "x.y", 3.5);
    writer.complete_population();

    let messaging = Arc::new(ZenohMessaging::new(
        session.clone(),
        &prefix,
        Format::Json,
        ChannelConfig::cache_only(1),
    ));
    let config = MirrorConfig {
        key_prefix: prefix.clone(),
        sync_interval_ms: 5,
        ..MirrorConfig::default()
    };

    let mut bridge = Bridge::new(store, messaging, config);
    let report = bridge.start().await.expect("Bridge failed to start");
    assert_eq!(report.bound, 1);

    let seeded = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for seed")
        .expect("Failed to receive seed");
    assert_eq!(sample_key(&seeded), format!("{}/b/x/y", prefix));
    let decoded: MirrorMessage = decode_auto(&seeded.payload().to_bytes()).unwrap();
    assert_eq!(decoded.data, MirrorValue::Float(3.5));

    writer.set("b", "x.y", 4.5);
    let update = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for update")
        .expect("Failed to receive update");
    let decoded: MirrorMessage = decode_auto(&update.payload().to_bytes()).unwrap();
    assert_eq!(decoded.data, MirrorValue::Float(4.5));

    bridge.shutdown().await;
    drop(bridge);
    drop(subscriber);
    session.close().await.expect("Failed to close session");
}

/// Replies served by the test store, as `(key, payload)`.
type Replies = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zenoh_store_ingests_query_replies() {
    let key_expr = unique_prefix();
    let port = 20000 + (std::process::id() % 20000) as u16;
    let endpoint = format!("tcp/127.0.0.1:{}", port);

    let server_config = ZenohConfig {
        mode: "peer".to_string(),
        connect: Vec::new(),
        listen: vec![endpoint.clone()],
    };
    let server = zenoh::open(build_config(&server_config).unwrap())
        .await
        .expect("Failed to open store session");
    let queryable = server
        .declare_queryable(mirror_wildcard(&key_expr))
        .await
        .expect("Failed to declare queryable");

    let replies: Replies = Arc::new(Mutex::new(Vec::new()));
    let answered = Arc::new(AtomicUsize::new(0));
    let serve = {
        let (replies, answered) = (replies.clone(), answered.clone());
        tokio::spawn(async move {
            while let Ok(query) = queryable.recv_async().await {
                let batch = replies.lock().clone();
                for (key, payload) in batch {
                    query.reply(key, payload).await.expect("Failed to reply");
                }
                answered.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let store = ZenohStore::new(StoreConfig {
        endpoint,
        key_expr: key_expr.clone(),
        mode: "peer".to_string(),
        query_timeout_ms: 500,
    });
    store.connect().await.expect("Failed to connect store");

    // No values yet: the query is answered but the store stays unpopulated.
    for _ in 0..50 {
        let outcome = store.sync().await.expect("sync failed");
        assert!(!outcome.populated);
        if answered.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(answered.load(Ordering::SeqCst) > 0, "queryable never reached");
    assert!(store.owners().is_empty());

    *replies.lock() = vec![
        (format!("{}/b/x/y", key_expr), b"3.5".to_vec()),
        (
            format!("{}/b/mode", key_expr),
            encode(&StoreValue::from("idle"), Format::Cbor).unwrap(),
        ),
        (format!("{}/b/broken", key_expr), b"\xff\xff".to_vec()),
        (format!("{}/b", key_expr), b"1".to_vec()),
    ];

    let outcome = store.sync().await.expect("sync failed");
    assert!(outcome.populated);
    assert_eq!(outcome.changed, 2);

    assert_eq!(store.owners(), vec!["b".to_string()]);
    let mut values = store.values("b");
    values.sort();
    assert_eq!(values, vec!["mode".to_string(), "x.y".to_string()]);

    let (pose, pose_revision) = store.get(&Entry::new("b", "x.y")).unwrap();
    let (mode, mode_revision) = store.get(&Entry::new("b", "mode")).unwrap();
    assert_eq!(pose, StoreValue::Number(3.5));
    assert_eq!(mode, StoreValue::Text("idle".to_string()));
    assert_ne!(pose_revision, mode_revision);
    assert!(store.get(&Entry::new("b", "broken")).is_none());

    // Only the changed value gets a new revision.
    replies.lock()[0].1 = b"4.5".to_vec();
    let outcome = store.sync().await.expect("sync failed");
    assert_eq!(outcome.changed, 1);
    let (pose, revision) = store.get(&Entry::new("b", "x.y")).unwrap();
    assert_eq!(pose, StoreValue::Number(4.5));
    assert!(revision > pose_revision.max(mode_revision));
    assert_eq!(store.get(&Entry::new("b", "mode")).unwrap().1, mode_revision);

    store.disconnect().await;
    serve.abort();
    server.close().await.expect("Failed to close session");
}

fn sample_key(sample: &zenoh::sample::Sample) -> String {
    sample.key_expr().as_str().to_string()
}
