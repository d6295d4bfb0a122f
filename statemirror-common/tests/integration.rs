//! Integration tests for statemirror-common library.

use statemirror_common::{
    Format, MirrorMessage, MirrorValue, StoreValue, ValueKind, build_key, decode, decode_auto,
    encode, mirror_wildcard, parse_store_key, sanitize,
};

#[test]
fn test_store_payload_to_channel_message() {
    // A remote store publishes `statestore/b/x/y` with a bare JSON number
    let (owner, value) = parse_store_key("statestore", "statestore/b/x/y").expect("parse failed");
    assert_eq!(owner, "b");
    assert_eq!(value, "x.y");

    let stored: StoreValue = decode_auto(b"3.5").expect("decode failed");
    let data = MirrorValue::try_from(stored).expect("conversion failed");

    // It lands on the channel `statemirror/b/x/y`
    let name = sanitize(&owner, &value);
    assert_eq!(build_key("statemirror", &name), "statemirror/b/x/y");

    let message = MirrorMessage::new(owner, value, data);
    assert_eq!(message.kind, ValueKind::Float);

    // Encode as JSON
    let json_bytes = encode(&message, Format::Json).expect("JSON encode failed");
    let decoded: MirrorMessage = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded, message);

    // Auto-decode CBOR
    let cbor_bytes = encode(&message, Format::Cbor).expect("CBOR encode failed");
    let auto_decoded: MirrorMessage = decode_auto(&cbor_bytes).expect("Auto decode failed");
    assert_eq!(auto_decoded.data, MirrorValue::Float(3.5));
}

#[test]
fn test_vector_values_keep_their_shape() {
    let stored: StoreValue = decode_auto(b"[0.1, 0.2, 0.3]").expect("decode failed");
    let data = MirrorValue::try_from(stored).expect("conversion failed");
    assert_eq!(data.kind(), ValueKind::FloatArray);

    let message = MirrorMessage::new("arm", "joints", data);
    let bytes = encode(&message, Format::Json).expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("invalid json");
    assert_eq!(json["data"], serde_json::json!([0.1, 0.2, 0.3]));
}

#[test]
fn test_every_sanitized_key_matches_the_wildcard_prefix() {
    let wildcard = mirror_wildcard("statemirror");
    let prefix = wildcard.trim_end_matches("**");

    for (owner, value) in [("b", "x.y"), ("cam", "frame.rate"), ("x", "*")] {
        let key = build_key("statemirror", &sanitize(owner, value));
        assert!(key.starts_with(prefix), "{key} not under {wildcard}");
        assert!(!key.contains('*'));
    }
}
