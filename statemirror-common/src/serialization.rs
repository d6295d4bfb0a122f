//! Payload encoding of store values and mirrored messages.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format of a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON, readable with any Zenoh tool.
    #[default]
    Json,

    /// CBOR, compact for high-rate values.
    Cbor,
}

impl Format {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Cbor => f.write_str("cbor"),
        }
    }
}

/// Encode a value in `format`.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(|e| Error::encode(format, e)),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf).map_err(|e| Error::encode(format, e))?;
            Ok(buf)
        }
    }
}

/// Decode a value encoded in `format`.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(|e| Error::decode(format, e)),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::decode(format, e)),
    }
}

/// Guess the format of a payload.
///
/// Store payloads are often bare scalars, so anything that parses as JSON is
/// treated as JSON and everything else as CBOR.
pub fn detect_format(data: &[u8]) -> Format {
    if serde_json::from_slice::<serde::de::IgnoredAny>(data).is_ok() {
        Format::Json
    } else {
        Format::Cbor
    }
}

/// Decode a payload of unknown format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    decode(data, detect_format(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MirrorMessage, MirrorValue, StoreValue};

    #[test]
    fn test_cbor_is_smaller() {
        let message = MirrorMessage::new("robot", "pose.x", MirrorValue::Float(1.25));

        let json = encode(&message, Format::Json).unwrap();
        let cbor = encode(&message, Format::Cbor).unwrap();

        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(b"{\"key\": \"value\"}"), Format::Json);
        assert_eq!(detect_format(b"[1, 2, 3]"), Format::Json);
        assert_eq!(detect_format(b"3.5"), Format::Json);
        assert_eq!(detect_format(b"\"text\""), Format::Json);
        assert_eq!(detect_format(b"\xa1\x63key\x65value"), Format::Cbor);
    }

    #[test]
    fn test_auto_decode_store_values() {
        let json: StoreValue = decode_auto(b"3.5").unwrap();
        assert_eq!(json, StoreValue::Number(3.5));

        let cbor = encode(&StoreValue::Text("idle".to_string()), Format::Cbor).unwrap();
        let decoded: StoreValue = decode_auto(&cbor).unwrap();
        assert_eq!(decoded, StoreValue::Text("idle".to_string()));
    }

    #[test]
    fn test_decode_error_names_format() {
        let err = decode::<StoreValue>(b"\xff\xff", Format::Cbor).unwrap_err();
        assert!(matches!(err, Error::Decode { format: Format::Cbor, .. }));
        assert!(err.to_string().starts_with("Failed to decode cbor payload"));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(Format::Json.mime_type(), "application/json");
        assert_eq!(Format::Cbor.mime_type(), "application/cbor");
    }
}
