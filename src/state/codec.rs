//! Byte encodings for persisted scan state.
//!
//! Two interchangeable encodings are supported so that a sidecar written
//! with one can always be read back by a run configured with the other:
//! pretty-printed JSON, and a tagged binary form (`DDS\x01` followed by a
//! bincode payload).

use crate::error::{DedupError, Result};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Leading tag of the binary encoding
const BINARY_TAG: &[u8; 4] = b"DDS\x01";

/// Serialization used for the sidecar file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Human-readable JSON
    #[default]
    Json,
    /// Compact tagged bincode
    Binary,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Binary => "binary",
        }
    }

    /// The fallback encoding tried when decoding with `self` fails.
    pub fn other(self) -> Self {
        match self {
            Encoding::Json => Encoding::Binary,
            Encoding::Binary => Encoding::Json,
        }
    }

    /// Serializes `value` into a fresh buffer.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Encoding::Json => {
                serde_json::to_vec_pretty(value).map_err(|e| DedupError::Encode(e.to_string()))
            }
            Encoding::Binary => {
                let payload =
                    bincode::serialize(value).map_err(|e| DedupError::Encode(e.to_string()))?;
                let mut out = Vec::with_capacity(BINARY_TAG.len() + payload.len());
                out.extend_from_slice(BINARY_TAG);
                out.extend_from_slice(&payload);
                Ok(out)
            }
        }
    }

    /// Deserializes `bytes` produced by [`Encoding::encode`].
    ///
    /// The error is a plain message; callers attach the file path.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> std::result::Result<T, String> {
        match self {
            Encoding::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Encoding::Binary => {
                let payload = bytes
                    .strip_prefix(BINARY_TAG.as_slice())
                    .ok_or_else(|| "missing binary state tag".to_string())?;
                bincode::deserialize(payload).map_err(|e| e.to_string())
            }
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u64,
        stamp: i64,
    }

    fn sample() -> Sample {
        Sample {
            name: "holiday".into(),
            count: 42,
            stamp: 1_700_000_000_123,
        }
    }

    #[test]
    fn test_other_is_symmetric() {
        assert_eq!(Encoding::Json.other(), Encoding::Binary);
        assert_eq!(Encoding::Binary.other(), Encoding::Json);
    }

    #[test]
    fn test_binary_is_tagged() {
        let bytes = Encoding::Binary.encode(&sample()).unwrap();
        assert!(bytes.starts_with(BINARY_TAG));
    }

    #[test]
    fn test_decoding_with_wrong_encoding_fails() {
        let json = Encoding::Json.encode(&sample()).unwrap();
        let binary = Encoding::Binary.encode(&sample()).unwrap();

        assert!(Encoding::Binary.decode::<Sample>(&json).is_err());
        assert!(Encoding::Json.decode::<Sample>(&binary).is_err());
        assert_eq!(Encoding::Json.decode::<Sample>(&json).unwrap(), sample());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Encoding::Json.decode::<Sample>(b"not json").is_err());
        assert!(Encoding::Binary.decode::<Sample>(b"DDS\x01\xff").is_err());
    }
}
