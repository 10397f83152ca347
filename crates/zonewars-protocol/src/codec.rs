//! Codec trait and the JSON implementation used for the ledger file and
//! for shipping commands/replies across process boundaries.
//!
//! Callers only depend on [`Codec`], so a compact binary format can be
//! dropped in later without touching the ledger or the coordinator.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so a codec can live inside long-running tasks
/// and be shared between them.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// The pretty variant indents with two spaces, which keeps the ledger file
/// readable and diff-friendly for admins who edit balances by hand.
///
/// ```rust
/// use zonewars_protocol::{Codec, Command, JsonCodec};
///
/// let codec = JsonCodec::compact();
/// let bytes = codec.encode(&Command::Pause).unwrap();
/// let back: Command = codec.decode(&bytes).unwrap();
/// assert_eq!(back, Command::Pause);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

#[cfg(feature = "json")]
impl JsonCodec {
    /// Single-line JSON.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        if self.pretty {
            serde_json::to_vec_pretty(value).map_err(ProtocolError::Encode)
        } else {
            serde_json::to_vec(value).map_err(ProtocolError::Encode)
        }
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
