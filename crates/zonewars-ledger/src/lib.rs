//! Persistent balance ledger for ZoneWars.
//!
//! Every finished match moves points: winners gain, losers pay. This
//! crate keeps those running totals.
//!
//! - [`Ledger`]: the authoritative in-memory balances, `get`/`adjust`
//!   and the leaderboard
//! - [`LedgerStore`]: the persistence seam, with [`JsonFileStore`] for
//!   disk and [`MemoryStore`] for tests
//! - [`LedgerConfig`] / [`Durability`]: where to persist and how loudly
//!   to complain when that fails
//!
//! Durability is best-effort by default: a failed write never takes a
//! match down with it.

mod config;
mod error;
mod ledger;
mod store;

pub use config::{Durability, LedgerConfig};
pub use error::LedgerError;
pub use ledger::{DEFAULT_LEADERBOARD_SIZE, Ledger, Settlement};
pub use store::{JsonFileStore, LedgerStore, MemoryStore};
