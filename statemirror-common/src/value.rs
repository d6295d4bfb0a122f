use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A value as held by the shared-state store.
///
/// The store is schema-less: anything the remote side writes ends up here.
/// Only some shapes can be mirrored, see [`MirrorValue::try_from`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StoreValue {
    /// Boolean flag.
    Boolean(bool),

    /// Integral number.
    Integer(i64),

    /// Floating point number.
    Number(f64),

    /// Text value.
    Text(String),

    /// Numeric vector. Scalars are commonly stored as one-element vectors.
    Vector(Vec<f64>),

    /// Any other shape (objects, null, mixed arrays).
    Structured(serde_json::Value),
}

impl StoreValue {
    /// Short name of the value shape, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Boolean(_) => "boolean",
            StoreValue::Integer(_) => "integer",
            StoreValue::Number(_) => "number",
            StoreValue::Text(_) => "text",
            StoreValue::Vector(v) if v.is_empty() => "empty vector",
            StoreValue::Vector(_) => "vector",
            StoreValue::Structured(serde_json::Value::Null) => "null",
            StoreValue::Structured(serde_json::Value::Object(_)) => "object",
            StoreValue::Structured(_) => "structured",
        }
    }
}

impl From<f64> for StoreValue {
    fn from(v: f64) -> Self {
        StoreValue::Number(v)
    }
}

impl From<i64> for StoreValue {
    fn from(v: i64) -> Self {
        StoreValue::Integer(v)
    }
}

impl From<bool> for StoreValue {
    fn from(v: bool) -> Self {
        StoreValue::Boolean(v)
    }
}

impl From<&str> for StoreValue {
    fn from(v: &str) -> Self {
        StoreValue::Text(v.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(v: String) -> Self {
        StoreValue::Text(v)
    }
}

impl From<Vec<f64>> for StoreValue {
    fn from(v: Vec<f64>) -> Self {
        StoreValue::Vector(v)
    }
}

/// A value that has a channel representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MirrorValue {
    /// Boolean flag.
    Boolean(bool),

    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit float.
    Float(f64),

    /// UTF-8 text.
    Text(String),

    /// Array of 64-bit floats.
    FloatArray(Vec<f64>),
}

impl MirrorValue {
    /// The channel type this value is published on.
    pub fn kind(&self) -> ValueKind {
        match self {
            MirrorValue::Boolean(_) => ValueKind::Boolean,
            MirrorValue::Integer(_) => ValueKind::Integer,
            MirrorValue::Float(_) => ValueKind::Float,
            MirrorValue::Text(_) => ValueKind::Text,
            MirrorValue::FloatArray(_) => ValueKind::FloatArray,
        }
    }

    /// Fit the value onto a channel of `kind`.
    ///
    /// Integers widen onto float channels, since JSON writers emit whole
    /// floats such as `4.0` as `4`. Any other kind change yields `None`.
    pub fn coerce(self, kind: ValueKind) -> Option<MirrorValue> {
        match (self, kind) {
            (MirrorValue::Integer(i), ValueKind::Float) => Some(MirrorValue::Float(i as f64)),
            (value, kind) if value.kind() == kind => Some(value),
            _ => None,
        }
    }
}

/// Error returned when a [`StoreValue`] has no channel representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no channel representation for {found} values")]
pub struct UnsupportedValue {
    /// Shape of the rejected value.
    pub found: &'static str,
}

impl TryFrom<StoreValue> for MirrorValue {
    type Error = UnsupportedValue;

    fn try_from(value: StoreValue) -> Result<Self, Self::Error> {
        match value {
            StoreValue::Boolean(b) => Ok(MirrorValue::Boolean(b)),
            StoreValue::Integer(i) => Ok(MirrorValue::Integer(i)),
            StoreValue::Number(n) => Ok(MirrorValue::Float(n)),
            StoreValue::Text(t) => Ok(MirrorValue::Text(t)),
            StoreValue::Vector(v) => match v.as_slice() {
                [] => Err(UnsupportedValue {
                    found: "empty vector",
                }),
                [single] => Ok(MirrorValue::Float(*single)),
                _ => Ok(MirrorValue::FloatArray(v)),
            },
            other @ StoreValue::Structured(_) => Err(UnsupportedValue {
                found: other.type_name(),
            }),
        }
    }
}

/// Type tag of an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    Text,
    FloatArray,
}

impl ValueKind {
    /// Get the string representation used in messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::FloatArray => "float_array",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message published on an output channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorMessage {
    /// Unix epoch milliseconds when the value was relayed.
    pub timestamp: i64,

    /// Owner (store member) the value belongs to.
    pub owner: String,

    /// Value name inside the owner, in store notation (e.g. "pose.x").
    pub value: String,

    /// Channel type.
    pub kind: ValueKind,

    /// The mirrored value.
    pub data: MirrorValue,
}

impl MirrorMessage {
    /// Create a new message with the current timestamp.
    pub fn new(owner: impl Into<String>, value: impl Into<String>, data: MirrorValue) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            owner: owner.into(),
            value: value.into(),
            kind: data.kind(),
            data,
        }
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_value_untagged_decoding() {
        let v: StoreValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(v, StoreValue::Number(3.5));

        let v: StoreValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, StoreValue::Integer(7));

        let v: StoreValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, StoreValue::Boolean(true));

        let v: StoreValue = serde_json::from_str("[1.0, 2.5]").unwrap();
        assert_eq!(v, StoreValue::Vector(vec![1.0, 2.5]));

        let v: StoreValue = serde_json::from_str(r#"{"w": 640}"#).unwrap();
        assert_eq!(v.type_name(), "object");
    }

    #[test]
    fn test_conversion_to_mirror_value() {
        assert_eq!(
            MirrorValue::try_from(StoreValue::Number(3.5)),
            Ok(MirrorValue::Float(3.5))
        );
        assert_eq!(
            MirrorValue::try_from(StoreValue::Vector(vec![2.0])),
            Ok(MirrorValue::Float(2.0))
        );
        assert_eq!(
            MirrorValue::try_from(StoreValue::Vector(vec![1.0, 2.0])),
            Ok(MirrorValue::FloatArray(vec![1.0, 2.0]))
        );
        assert_eq!(
            MirrorValue::try_from(StoreValue::from("idle")),
            Ok(MirrorValue::Text("idle".to_string()))
        );
    }

    #[test]
    fn test_unsupported_values() {
        let err = MirrorValue::try_from(StoreValue::Vector(Vec::new())).unwrap_err();
        assert_eq!(err.found, "empty vector");

        let err = MirrorValue::try_from(StoreValue::Structured(serde_json::Value::Null))
            .unwrap_err();
        assert_eq!(err.found, "null");
        assert_eq!(err.to_string(), "no channel representation for null values");
    }

    #[test]
    fn test_message_payload_carries_bare_value() {
        let message = MirrorMessage::new("b", "x.y", MirrorValue::Float(3.5));
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();

        assert_eq!(json["data"], serde_json::json!(3.5));
        assert_eq!(json["kind"], "float");
        assert_eq!(json["owner"], "b");
        assert_eq!(json["value"], "x.y");
    }

    #[test]
    fn test_whole_numbers_widen_onto_float_channels() {
        let whole: StoreValue = serde_json::from_str("4").unwrap();
        let value = MirrorValue::try_from(whole).unwrap();

        assert_eq!(value.clone().coerce(ValueKind::Float), Some(MirrorValue::Float(4.0)));
        assert_eq!(value.coerce(ValueKind::Integer), Some(MirrorValue::Integer(4)));
        assert_eq!(MirrorValue::Float(4.5).coerce(ValueKind::Integer), None);
        assert_eq!(MirrorValue::Boolean(true).coerce(ValueKind::Float), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ValueKind::FloatArray.to_string(), "float_array");
        assert_eq!(MirrorValue::Boolean(false).kind(), ValueKind::Boolean);
    }
}
