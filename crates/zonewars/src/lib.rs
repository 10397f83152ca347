//! # ZoneWars
//!
//! Team match coordinator for voice-chat communities.
//!
//! ZoneWars splits a list of players into two teams, creates a voice
//! channel per team plus a shared lobby, and moves everyone around as the
//! match is started, paused, resumed, traded and ended. Finished matches
//! move points on a persistent ledger: each winner gains the award, each
//! loser pays it.
//!
//! The chat platform itself stays outside: plug it in through
//! [`ChannelProvisioner`](zonewars_channels::ChannelProvisioner) for voice
//! channels and [`RosterResolver`] for turning typed player names into
//! participants.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use zonewars::prelude::*;
//!
//! # async fn run() -> Result<(), ZoneWarsError> {
//! let roster = StaticRoster::new()
//!     .with_member(ArenaId(1), Participant::new(1, "ann"))
//!     .with_member(ArenaId(1), Participant::new(2, "bob"))
//!     .with_member(ArenaId(1), Participant::new(3, "cat"))
//!     .with_member(ArenaId(1), Participant::new(4, "dan"));
//! let coordinator = CoordinatorBuilder::new()
//!     .build(Arc::new(MemoryProvisioner::new()), roster)?;
//!
//! let request = CreateSessionRequest::random(2, vec!["1, 2, 3, 4".into()]);
//! coordinator.create_session(ArenaId(1), request).await?;
//! coordinator.end(ArenaId(1), 0).await?;
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod error;
mod roster;

pub use coordinator::{Coordinator, CoordinatorBuilder, SessionStarted};
pub use error::ZoneWarsError;
pub use roster::{RosterResolver, StaticRoster, parse_participant_token};

/// Common imports for ZoneWars users.
pub mod prelude {
    pub use crate::{Coordinator, CoordinatorBuilder, RosterResolver, StaticRoster, ZoneWarsError};
    pub use zonewars_channels::{ChannelProvisioner, MemoryProvisioner};
    pub use zonewars_ledger::{Durability, Ledger, LedgerConfig};
    pub use zonewars_match::{MatchConfig, MatchError, MoveOutcome, SessionState, TeamIndex};
    pub use zonewars_protocol::{
        ArenaId, AssignMode, Command, CreateSessionRequest, Participant, ParticipantId, Reply,
    };
}
