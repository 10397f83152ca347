//! The balance ledger: participant → running point total.

use std::collections::HashMap;

use zonewars_protocol::{BalanceEntry, ParticipantId};

use crate::{Durability, JsonFileStore, LedgerConfig, LedgerError, LedgerStore, MemoryStore};

/// Default number of entries in a leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// What [`Ledger::settle`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// New balance of every adjusted participant, in input order.
    pub balances: Vec<BalanceEntry>,
    /// `false` if the save failed under [`Durability::Strict`].
    pub persisted: bool,
}

/// Running reward/penalty balances, keyed by participant.
///
/// The in-memory map is authoritative for the lifetime of the process.
/// Every change is followed by a save of the whole map; whether a failed
/// save is reported depends on the [`Durability`] and on which method the
/// caller chose:
///
/// | method | `BestEffort` | `Strict` |
/// |---|---|---|
/// | [`adjust`](Self::adjust) | logged, swallowed | logged, swallowed |
/// | [`try_adjust`](Self::try_adjust) | logged, swallowed | returned as `Err` |
///
/// In both cases the in-memory balance has already changed.
pub struct Ledger {
    balances: HashMap<ParticipantId, i64>,
    store: Box<dyn LedgerStore>,
    durability: Durability,
}

impl Ledger {
    /// Opens a ledger over `store`, loading whatever it holds.
    pub fn open(store: impl LedgerStore, durability: Durability) -> Self {
        let balances = store.load();
        Self {
            balances,
            store: Box::new(store),
            durability,
        }
    }

    /// Opens the JSON-file ledger described by `config`.
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::open(JsonFileStore::new(&config.path), config.durability)
    }

    /// An empty ledger that never touches disk.
    pub fn in_memory() -> Self {
        Self::open(MemoryStore::new(), Durability::BestEffort)
    }

    /// The balance of `participant`; 0 if they've never been adjusted.
    pub fn get(&self, participant: ParticipantId) -> i64 {
        self.balances.get(&participant).copied().unwrap_or(0)
    }

    /// Adds `delta` to the balance of `participant` and persists.
    ///
    /// Never fails: a persistence error is logged and the in-memory value
    /// stays authoritative. Returns the new balance.
    pub fn adjust(&mut self, participant: ParticipantId, delta: i64) -> i64 {
        let balance = self.apply(participant, delta);
        if let Err(e) = self.store.save(&self.balances) {
            tracing::warn!(%participant, delta, error = %e, "ledger save failed");
        }
        balance
    }

    /// Like [`adjust`](Self::adjust), but under [`Durability::Strict`] a
    /// failed save is returned to the caller. The in-memory balance is
    /// updated either way.
    pub fn try_adjust(
        &mut self,
        participant: ParticipantId,
        delta: i64,
    ) -> Result<i64, LedgerError> {
        let balance = self.apply(participant, delta);
        match self.store.save(&self.balances) {
            Ok(()) => Ok(balance),
            Err(e) => {
                tracing::warn!(%participant, delta, error = %e, "ledger save failed");
                match self.durability {
                    Durability::BestEffort => Ok(balance),
                    Durability::Strict => Err(e),
                }
            }
        }
    }

    /// Applies every `(participant, delta)` pair, then saves once.
    ///
    /// Saving blocks on the store. Call this from a blocking context, e.g.
    /// `tokio::task::spawn_blocking`, when the store touches disk.
    pub fn settle(&mut self, deltas: &[(ParticipantId, i64)]) -> Settlement {
        let balances = deltas
            .iter()
            .map(|&(participant, delta)| BalanceEntry {
                participant,
                balance: self.apply(participant, delta),
            })
            .collect();
        let persisted = match self.store.save(&self.balances) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(changes = deltas.len(), error = %e, "ledger save failed");
                self.durability == Durability::BestEffort
            }
        };
        Settlement {
            balances,
            persisted,
        }
    }

    fn apply(&mut self, participant: ParticipantId, delta: i64) -> i64 {
        let entry = self.balances.entry(participant).or_insert(0);
        *entry = entry.saturating_add(delta);
        tracing::debug!(%participant, delta, balance = *entry, "balance adjusted");
        *entry
    }

    /// The `top` highest balances, descending. Ties are ordered by
    /// participant id so the board is stable between calls.
    pub fn leaderboard(&self, top: usize) -> Vec<BalanceEntry> {
        let mut entries: Vec<BalanceEntry> = self
            .balances
            .iter()
            .map(|(participant, balance)| BalanceEntry {
                participant: *participant,
                balance: *balance,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.participant.cmp(&b.participant))
        });
        entries.truncate(top);
        entries
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Number of participants with a recorded balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("entries", &self.balances.len())
            .field("durability", &self.durability)
            .finish()
    }
}
