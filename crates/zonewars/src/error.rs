//! Unified error type for ZoneWars.

use zonewars_channels::ChannelError;
use zonewars_ledger::LedgerError;
use zonewars_match::MatchError;
use zonewars_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// The coordinator returns this single type; `?` converts sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum ZoneWarsError {
    /// A match-level error (bad input, wrong state, no session).
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A ledger persistence error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A channel platform error outside of a relocation pass.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The background task setting up a match panicked or was cancelled.
    #[error("match setup did not complete: {0}")]
    Setup(#[from] tokio::task::JoinError),
}

impl ZoneWarsError {
    /// The match error inside, if this is one.
    pub fn as_match(&self) -> Option<&MatchError> {
        match self {
            Self::Match(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use zonewars_protocol::ArenaId;

    use super::*;

    #[test]
    fn test_from_match_error() {
        let err: ZoneWarsError = MatchError::NoActiveSession(ArenaId(3)).into();
        assert!(matches!(err.as_match(), Some(MatchError::NoActiveSession(_))));
        assert_eq!(err.to_string(), "there is no active match in arena A-3");
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ZoneWarsError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, ZoneWarsError::Protocol(_)));
        assert!(err.as_match().is_none());
    }

    #[test]
    fn test_from_ledger_error() {
        let err: ZoneWarsError = LedgerError::Persist("disk full".into()).into();
        assert!(matches!(err, ZoneWarsError::Ledger(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_from_channel_error() {
        let err: ZoneWarsError = ChannelError::Unavailable("gateway down".into()).into();
        assert!(matches!(err, ZoneWarsError::Channel(_)));
    }

    #[tokio::test]
    async fn test_from_join_error() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let err: ZoneWarsError = task.await.unwrap_err().into();
        assert!(matches!(err, ZoneWarsError::Setup(_)));
        assert!(err.to_string().starts_with("match setup did not complete"));
    }
}
