//! Shared vocabulary for ZoneWars.
//!
//! - **Types** ([`ParticipantId`], [`ArenaId`], [`ChannelId`], [`Participant`], ...)
//!   identify the things the coordinator moves around.
//! - **Commands** ([`Command`], [`CreateSessionRequest`], [`Reply`]) are the
//!   platform-neutral command surface.
//! - **Codec** ([`Codec`], [`JsonCodec`]) turns those values into bytes,
//!   e.g. for the ledger file.
//!
//! ```text
//! Chat front-end → Command → Coordinator → Reply → Chat front-end
//! ```

mod codec;
mod command;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::{
    AssignMode, BalanceEntry, Command, CreateSessionRequest, RelocationSummary, Reply,
};
pub use error::ProtocolError;
pub use types::{ArenaId, ChannelId, GroupId, Participant, ParticipantId, SessionId};
