//! The command surface: what a chat front-end can ask the coordinator to
//! do, and what it gets back.
//!
//! These types are deliberately free of any platform detail. A slash
//! command handler parses its options into a [`Command`], hands it to the
//! coordinator together with the arena and invoker, and renders the
//! [`Reply`] however it likes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Participant, ParticipantId, ProtocolError, SessionId};

// ---------------------------------------------------------------------------
// AssignMode
// ---------------------------------------------------------------------------

/// How the two teams of a new session are formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignMode {
    /// Shuffle the roster and split it in half.
    Random,
    /// Two captains anchor the teams; the rest are dealt out at random.
    Draft,
    /// The caller lists both teams explicitly.
    Manual,
}

impl FromStr for AssignMode {
    type Err = ProtocolError;

    /// Parses `random`, `draft` or `manual`, ignoring case and
    /// surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "draft" => Ok(Self::Draft),
            "manual" => Ok(Self::Manual),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown mode '{other}', expected random, draft or manual"
            ))),
        }
    }
}

impl fmt::Display for AssignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Draft => f.write_str("draft"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Parameters of the create-session command.
///
/// Token lists are raw, user-entered strings (mentions or numeric ids).
/// They are resolved into participants by the coordinator's roster
/// resolver; tokens that don't resolve are dropped, so validation always
/// happens on the resolved lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub mode: AssignMode,
    pub team_size: usize,
    /// Full roster. Required for `random` and `draft`.
    #[serde(default)]
    pub roster: Vec<String>,
    /// Exactly two captains. Required for `draft`.
    #[serde(default)]
    pub captains: Vec<String>,
    /// Team 1 members. Required for `manual`.
    #[serde(default)]
    pub team1: Vec<String>,
    /// Team 2 members. Required for `manual`.
    #[serde(default)]
    pub team2: Vec<String>,
}

impl CreateSessionRequest {
    /// A random-split request over `roster`.
    pub fn random(team_size: usize, roster: Vec<String>) -> Self {
        Self {
            mode: AssignMode::Random,
            team_size,
            roster,
            captains: Vec::new(),
            team1: Vec::new(),
            team2: Vec::new(),
        }
    }

    /// A captain-draft request over `roster`.
    pub fn draft(team_size: usize, roster: Vec<String>, captains: Vec<String>) -> Self {
        Self {
            mode: AssignMode::Draft,
            captains,
            ..Self::random(team_size, roster)
        }
    }

    /// A manual request with both teams spelled out.
    pub fn manual(team_size: usize, team1: Vec<String>, team2: Vec<String>) -> Self {
        Self {
            mode: AssignMode::Manual,
            team1,
            team2,
            ..Self::random(team_size, Vec::new())
        }
    }
}

/// Every operation the coordinator exposes, in serializable form.
///
/// `#[serde(tag = "command")]` gives `{ "command": "End", "winning_team": 0 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    CreateSession(CreateSessionRequest),
    /// Swap `from_team1` (currently on team 1) with `from_team2`.
    Trade {
        from_team1: ParticipantId,
        from_team2: ParticipantId,
    },
    Pause,
    Resume,
    /// End the match. `winning_team` is 0 for team 1, 1 for team 2.
    End { winning_team: usize },
    /// Balance of `participant`, or of the invoker when absent.
    Balance { participant: Option<ParticipantId> },
    /// Top balances; defaults to 10 entries.
    Leaderboard { top: Option<usize> },
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Aggregate result of one relocation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationSummary {
    /// Moves that were issued and succeeded.
    pub moved: usize,
    /// Participants already in the right place.
    pub unchanged: usize,
    /// Moves that failed or timed out.
    pub failed: usize,
}

impl RelocationSummary {
    /// `true` when every participant ended up where they should be.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// A participant together with their ledger balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub participant: ParticipantId,
    pub balance: i64,
}

/// What the coordinator answers to a successful [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply")]
pub enum Reply {
    SessionCreated {
        session: SessionId,
        teams: [Vec<Participant>; 2],
        relocation: RelocationSummary,
    },
    Traded {
        to_team2: Participant,
        to_team1: Participant,
        relocation: RelocationSummary,
    },
    Paused { relocation: RelocationSummary },
    Resumed { relocation: RelocationSummary },
    Ended {
        /// 0 for team 1, 1 for team 2.
        winning_team: usize,
        winners: Vec<Participant>,
        losers: Vec<Participant>,
        award: i64,
        balances: Vec<BalanceEntry>,
    },
    Balance(BalanceEntry),
    Leaderboard { entries: Vec<BalanceEntry> },
}
