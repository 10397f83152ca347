//! Error types for the protocol layer.

/// Errors raised while encoding, decoding, or interpreting protocol data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The data parsed but makes no sense, e.g. an unknown assignment mode.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
