//! Error types for the match layer.

use zonewars_channels::ChannelError;
use zonewars_protocol::{ArenaId, ParticipantId};

use crate::{SessionState, TeamIndex};

/// Errors that can occur during match operations.
///
/// Every variant is a precondition failure detected before any side
/// effect, except [`Provisioning`](Self::Provisioning), which is raised
/// after partially created channels have been cleaned up again. A failed
/// participant move is never an error; it shows up in a
/// [`RelocationReport`](crate::RelocationReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Malformed or insufficient command parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The arena already has a match (or one is being set up).
    #[error("a match is already active in arena {0}")]
    SessionAlreadyActive(ArenaId),

    /// The arena has no match to operate on.
    #[error("there is no active match in arena {0}")]
    NoActiveSession(ArenaId),

    /// A trade named a participant who isn't on the team they were
    /// supposed to come from.
    #[error("{participant} is not on {team}")]
    NotOnExpectedTeam {
        participant: ParticipantId,
        team: TeamIndex,
    },

    #[error("the match is already paused")]
    AlreadyPaused,

    #[error("the match is not paused")]
    NotPaused,

    /// The operation needs a live match, but the session is in `{0}`.
    #[error("the match is not active (state: {0})")]
    NotActive(SessionState),

    /// The winning team index was neither 0 nor 1.
    #[error("winning team must be 0 or 1, got {0}")]
    InvalidTeamIndex(usize),

    /// The session has ended; its handle is stale.
    #[error("the match has already ended")]
    SessionEnded,

    /// Match channels could not be created.
    #[error("failed to set up match channels: {0}")]
    Provisioning(#[source] ChannelError),
}
