//! Error types for the ledger layer.

use zonewars_protocol::ProtocolError;

/// Errors raised while persisting balances.
///
/// Loading never produces one of these: a missing or unreadable ledger
/// file yields an empty ledger. Saving does, but [`Ledger::adjust`]
/// swallows them; only [`Ledger::try_adjust`] under
/// [`Durability::Strict`] hands them back.
///
/// [`Ledger::adjust`]: crate::Ledger::adjust
/// [`Ledger::try_adjust`]: crate::Ledger::try_adjust
/// [`Durability::Strict`]: crate::Durability::Strict
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reading or writing the backing file failed.
    #[error("ledger i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The balances could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The store refused the write for another reason.
    #[error("ledger persist failed: {0}")]
    Persist(String),
}
