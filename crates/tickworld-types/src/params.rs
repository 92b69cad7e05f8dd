//! Action parameter values.
//!
//! Parameters are opaque to the pipeline: they are signed, queued, and
//! handed to the state-transition engine exactly as submitted. They are
//! still typed, as a closed set of value kinds, so that serialization and
//! engine dispatch never have to guess what an untyped JSON value meant.
//!
//! On the wire every value is adjacently tagged:
//!
//! ```json
//! {"kind": "integer", "value": 3}
//! {"kind": "bytes", "value": "0xdeadbeef"}
//! {"kind": "list", "value": [{"kind": "string", "value": "north"}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::AgentAddress;

/// A single action argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    /// A signed integer.
    Integer(i64),
    /// A UTF-8 string.
    String(String),
    /// An agent address.
    Address(AgentAddress),
    /// Raw bytes, hex encoded on the wire.
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    /// A nested sequence of values.
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Return the integer payload, if this is an [`ParamValue::Integer`].
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Name of the value kind, matching the wire tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::Address(_) => "address",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<AgentAddress> for ParamValue {
    fn from(value: AgentAddress) -> Self {
        Self::Address(value)
    }
}

/// `0x`-prefixed hex encoding for byte payloads.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(&text);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integer_is_adjacently_tagged() {
        let value = serde_json::to_value(ParamValue::Integer(-4)).unwrap();
        assert_eq!(value, json!({"kind": "integer", "value": -4}));
    }

    #[test]
    fn bytes_travel_as_hex() {
        let value = serde_json::to_value(ParamValue::Bytes(vec![0xde, 0xad])).unwrap();
        assert_eq!(value, json!({"kind": "bytes", "value": "0xdead"}));

        let back: ParamValue =
            serde_json::from_value(json!({"kind": "bytes", "value": "0xDEAD"})).unwrap();
        assert_eq!(back, ParamValue::Bytes(vec![0xde, 0xad]));

        let upper: ParamValue =
            serde_json::from_value(json!({"kind": "bytes", "value": "0XBEEF"})).unwrap();
        assert_eq!(upper, ParamValue::Bytes(vec![0xbe, 0xef]));
    }

    #[test]
    fn nested_list_parses() {
        let parsed: ParamValue = serde_json::from_value(json!({
            "kind": "list",
            "value": [
                {"kind": "integer", "value": 1},
                {"kind": "string", "value": "north"}
            ]
        }))
        .unwrap();
        assert_eq!(
            parsed,
            ParamValue::List(vec![ParamValue::Integer(1), ParamValue::from("north")])
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        let parsed = serde_json::from_value::<ParamValue>(json!({"kind": "float", "value": 1.5}));
        assert!(parsed.is_err());
    }

    #[test]
    fn kind_matches_wire_tag() {
        assert_eq!(ParamValue::List(Vec::new()).kind(), "list");
        assert_eq!(ParamValue::from(7).as_integer(), Some(7));
        assert_eq!(ParamValue::from("x").as_integer(), None);
    }
}
