//! Error types for channel provisioning.

use zonewars_protocol::{ChannelId, GroupId};

/// Errors a [`ChannelProvisioner`](crate::ChannelProvisioner) can report.
///
/// Callers in the session layer treat every one of these as non-fatal for
/// moves and deletions; only channel creation failures abort a command.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel doesn't exist (deleted out from under us, or never did).
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// The group doesn't exist.
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// The platform refused the operation (missing permission, participant
    /// not connected to voice, rate limited, ...).
    #[error("rejected by platform: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}
