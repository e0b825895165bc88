//! Raw byte payloads serialized as standard base64.

use std::fmt;
use std::ops::Deref;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Binary value of a secret or config map entry.
///
/// On the wire it is a standard-alphabet, padded base64 string.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteString(pub Vec<u8>);

impl ByteString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Decodes standard base64. CR and LF are ignored so wrapped encodings decode.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        let cleaned: String = encoded.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        STANDARD.decode(cleaned).map(Self)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl Deref for ByteString {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for ByteString {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for ByteString {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

// Secrets end up in logs through Debug; only the length is shown.
impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteString({} bytes)", self.0.len())
    }
}

impl Serialize for ByteString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        ByteString::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_base64() {
        let value = ByteString::from("hunter2");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"aHVudGVyMg==\"");
    }

    #[test]
    fn test_deserialize_rejects_invalid_base64() {
        assert!(serde_json::from_str::<ByteString>("\"not base64!\"").is_err());
    }

    #[test]
    fn test_from_base64_ignores_line_breaks() {
        let value = ByteString::from_base64("aHVu\r\ndGVy\nMg==").unwrap();
        assert_eq!(value.as_slice(), b"hunter2");
    }

    #[test]
    fn test_debug_hides_contents() {
        let value = ByteString::from("hunter2");
        assert_eq!(format!("{value:?}"), "ByteString(7 bytes)");
    }
}
