//! Blob encoding for persisted state.
//!
//! Every persisted value (task snapshot, action log, user profile) is stored
//! as one blob. The format is chosen per store: JSON keeps the on-device
//! layout readable, postcard keeps it compact.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for blob encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode error ({format}): {message}")]
    Encode {
        /// Format that was used.
        format: BlobFormat,
        /// Underlying serializer message.
        message: String,
    },
    /// Deserialization failed.
    #[error("decode error ({format}): {message}")]
    Decode {
        /// Format that was used.
        format: BlobFormat,
        /// Underlying deserializer message.
        message: String,
    },
}

/// On-disk encoding of persisted blobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobFormat {
    /// UTF-8 JSON via `serde_json`.
    #[default]
    Json,
    /// Compact binary via `postcard`.
    Postcard,
}

impl std::fmt::Display for BlobFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Postcard => write!(f, "postcard"),
        }
    }
}

impl std::str::FromStr for BlobFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "postcard" => Ok(Self::Postcard),
            other => Err(format!("unknown blob format: {other}")),
        }
    }
}

/// Encodes `value` into a blob.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if the value cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(format: BlobFormat, value: &T) -> Result<Vec<u8>, CodecError> {
    let result = match format {
        BlobFormat::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
        BlobFormat::Postcard => postcard::to_allocvec(value).map_err(|e| e.to_string()),
    };
    result.map_err(|message| CodecError::Encode { format, message })
}

/// Decodes a blob produced by [`encode`] with the same format.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(format: BlobFormat, bytes: &[u8]) -> Result<T, CodecError> {
    let result = match format {
        BlobFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
        BlobFormat::Postcard => postcard::from_bytes(bytes).map_err(|e| e.to_string()),
    };
    result.map_err(|message| CodecError::Decode { format, message })
}
