//! Ledger configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How hard the ledger tries to make a balance change durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Persist after every change; a failed write is logged and
    /// forgotten. The in-memory balance stays authoritative.
    #[default]
    BestEffort,
    /// Same write path, but [`Ledger::try_adjust`](crate::Ledger::try_adjust)
    /// reports the failed write to its caller.
    Strict,
}

/// Configuration for the balance ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The JSON file balances are kept in.
    pub path: PathBuf,
    pub durability: Durability,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bsn_data.json"),
            durability: Durability::BestEffort,
        }
    }
}
