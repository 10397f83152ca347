//! Match configuration and the session state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MatchError;

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Settings shared by every session a coordinator runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Smallest allowed team.
    pub min_team_size: usize,

    /// Largest allowed team.
    pub max_team_size: usize,

    /// Points each winner gains and each loser pays when a match ends.
    pub award: i64,

    /// Upper bound on a single participant move, including the lookup of
    /// where they are. A move that takes longer is reported as timed out
    /// and the pass carries on without it. Other platform queries (channel
    /// checks, deletes) share the same bound.
    pub move_timeout: Duration,

    /// Name of the channel group (category) created per match.
    pub group_name: String,

    /// Name of the shared channel everyone is moved to on pause.
    pub lobby_name: String,

    /// Team channels are named `"{prefix} 1"` and `"{prefix} 2"`.
    pub team_channel_prefix: String,

    /// Command queue depth of each session actor.
    pub command_buffer: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_team_size: 2,
            max_team_size: 4,
            award: 10,
            move_timeout: Duration::from_secs(10),
            group_name: "ZoneWars Match".to_string(),
            lobby_name: "Lobby".to_string(),
            team_channel_prefix: "Team".to_string(),
            command_buffer: 64,
        }
    }
}

impl MatchConfig {
    /// Rejects configurations no match could run under.
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.min_team_size == 0 || self.min_team_size > self.max_team_size {
            return Err(MatchError::InvalidInput(format!(
                "team size range {}..={} is empty",
                self.min_team_size, self.max_team_size
            )));
        }
        if self.award < 0 {
            return Err(MatchError::InvalidInput("award cannot be negative".into()));
        }
        if self.move_timeout.is_zero() {
            return Err(MatchError::InvalidInput("move timeout must be positive".into()));
        }
        Ok(())
    }

    /// Rejects team sizes outside `min_team_size..=max_team_size`.
    pub fn validate_team_size(&self, team_size: usize) -> Result<(), MatchError> {
        if (self.min_team_size..=self.max_team_size).contains(&team_size) {
            Ok(())
        } else {
            Err(MatchError::InvalidInput(format!(
                "team size must be between {} and {}, got {team_size}",
                self.min_team_size, self.max_team_size
            )))
        }
    }

    /// Name of the channel for team `index` (0-based).
    pub fn team_channel_name(&self, index: usize) -> String {
        format!("{} {}", self.team_channel_prefix, index + 1)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a match session.
///
/// ```text
/// Forming → Active ⇄ Paused
///    │         │        │
///    └─────────┴──→ Ended ←──┘
/// ```
///
/// - **Forming**: teams and channels exist, nobody has been moved yet.
/// - **Active**: participants sit in their team channels.
/// - **Paused**: everyone is in the lobby; the pre-pause locations are held
///   for the next resume.
/// - **Ended**: channels deleted. Terminal. Points are settled unless the
///   session was abandoned, which is the only way out of Forming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Forming,
    Active,
    Paused,
    Ended,
}

impl SessionState {
    /// `true` for Active and Paused: a match is under way.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns `true` if moving from `self` to `target` is a legal
    /// transition. Re-activating an active session is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Forming, Self::Active)
                | (Self::Forming, Self::Ended)
                | (Self::Active, Self::Active)
                | (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Active, Self::Ended)
                | (Self::Paused, Self::Ended)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forming => write!(f, "Forming"),
            Self::Active => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
