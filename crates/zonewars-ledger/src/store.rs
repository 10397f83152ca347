//! Where balances live between restarts.
//!
//! [`LedgerStore`] is a plain key-value persistence seam. The ledger owns
//! the authoritative in-memory map and hands a full snapshot to the store
//! after every change.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use zonewars_protocol::{Codec, JsonCodec, ParticipantId};

use crate::LedgerError;

/// Loads and saves the full balance map.
///
/// Synchronous, so the ledger can hold a `Box<dyn LedgerStore>`. A store
/// that writes files blocks the calling thread; async callers run ledger
/// writes on the blocking pool.
pub trait LedgerStore: Send + Sync + 'static {
    /// Loads every stored balance. A missing or corrupt store yields an
    /// empty map; this never fails.
    fn load(&self) -> HashMap<ParticipantId, i64>;

    /// Replaces the stored balances with `balances`.
    fn save(&self, balances: &HashMap<ParticipantId, i64>) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Keeps balances in a pretty-printed JSON object keyed by the stringified
/// participant id:
///
/// ```json
/// {
///   "123456789": 20,
///   "987654321": -10
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    codec: JsonCodec,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: JsonCodec::pretty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<HashMap<ParticipantId, i64>, LedgerError> {
        let bytes = std::fs::read(&self.path)?;
        let raw: HashMap<String, i64> = self.codec.decode(&bytes)?;
        raw.into_iter()
            .map(|(key, balance)| {
                key.trim()
                    .parse::<u64>()
                    .map(|id| (ParticipantId(id), balance))
                    .map_err(|_| LedgerError::Persist(format!("bad participant key '{key}'")))
            })
            .collect()
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> HashMap<ParticipantId, i64> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no ledger file yet, starting empty");
            return HashMap::new();
        }
        match self.read() {
            Ok(balances) => {
                tracing::info!(
                    path = %self.path.display(),
                    entries = balances.len(),
                    "ledger loaded"
                );
                balances
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ledger file unreadable, starting empty"
                );
                HashMap::new()
            }
        }
    }

    fn save(&self, balances: &HashMap<ParticipantId, i64>) -> Result<(), LedgerError> {
        // BTreeMap over the numeric id keeps the file in a stable order.
        let ordered: BTreeMap<ParticipantId, i64> =
            balances.iter().map(|(id, b)| (*id, *b)).collect();
        let raw: Vec<(String, i64)> = ordered
            .into_iter()
            .map(|(id, b)| (id.0.to_string(), b))
            .collect();
        let bytes = self.codec.encode(&JsonObject(&raw))?;

        // Write beside the target and rename so a crash mid-write never
        // leaves a truncated ledger behind.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Serializes ordered `(key, value)` pairs as a JSON object.
struct JsonObject<'a>(&'a [(String, i64)]);

impl serde::Serialize for JsonObject<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A store that keeps the last saved snapshot in memory. Saves can be made
/// to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<HashMap<ParticipantId, i64>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `balances`.
    pub fn with_balances(balances: HashMap<ParticipantId, i64>) -> Self {
        Self {
            saved: Mutex::new(balances),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The last successfully saved snapshot.
    pub fn saved(&self) -> HashMap<ParticipantId, i64> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> HashMap<ParticipantId, i64> {
        self.saved()
    }

    fn save(&self, balances: &HashMap<ParticipantId, i64>) -> Result<(), LedgerError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LedgerError::Persist("store is read-only".into()));
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = balances.clone();
        Ok(())
    }
}

/// `Arc<S>` is a store too, so tests can keep a handle on the store they
/// gave the ledger.
impl<S: LedgerStore> LedgerStore for std::sync::Arc<S> {
    fn load(&self) -> HashMap<ParticipantId, i64> {
        (**self).load()
    }

    fn save(&self, balances: &HashMap<ParticipantId, i64>) -> Result<(), LedgerError> {
        (**self).save(balances)
    }
}
