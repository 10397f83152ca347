//! Match sessions for ZoneWars.
//!
//! Everything that happens between "these players want a match" and "the
//! match is over":
//!
//! - [`assign`] / [`assign_teams`] split a roster into two teams
//! - [`Session`] is the lifecycle state machine that moves participants
//!   between voice channels as the match is activated, paused, resumed,
//!   traded and ended
//! - [`spawn_session`] runs a session as its own task behind a
//!   [`SessionHandle`]
//! - [`SessionRegistry`] keeps at most one session per arena
//!
//! Channel moves go through [`ChannelProvisioner`](zonewars_channels::ChannelProvisioner)
//! and are allowed to fail one by one; each relocation pass reports what
//! happened to every participant in a [`RelocationReport`].

mod assign;
mod claim;
mod config;
mod error;
mod handle;
mod registry;
mod relocation;
mod session;
mod team;

use std::sync::Arc;

pub use assign::{Assignment, assign, assign_teams};
pub use claim::ClaimOnce;
pub use config::{MatchConfig, SessionState};
pub use error::MatchError;
pub use handle::{SessionHandle, spawn_session};
pub use registry::SessionRegistry;
pub use relocation::{MoveOutcome, Relocation, RelocationReport};
pub use session::{MatchChannels, MatchOutcome, Session, SessionInfo, TradeOutcome};
pub use team::{Team, TeamIndex, check_teams};

/// The ledger as shared between the coordinator and every session actor.
pub type SharedLedger = Arc<tokio::sync::Mutex<zonewars_ledger::Ledger>>;
