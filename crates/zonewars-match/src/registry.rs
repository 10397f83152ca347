//! Session registry: at most one match per arena.

use std::collections::HashMap;

use zonewars_protocol::{ArenaId, SessionId};

use crate::{MatchError, SessionHandle};

#[derive(Debug)]
enum Slot {
    /// Claimed while a session is being set up.
    Forming,
    Live(SessionHandle),
}

/// Tracks which arena has a match.
///
/// An arena is claimed with [`reserve`](Self::reserve) before any channel
/// is created, so two concurrent create requests for the same arena can't
/// both get through. The registry holds no lock of its own; callers share
/// it behind a mutex and never hold that across channel work.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: HashMap<ArenaId, Slot>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `arena` for a session that is being set up.
    pub fn reserve(&mut self, arena: ArenaId) -> Result<(), MatchError> {
        if self.slots.contains_key(&arena) {
            return Err(MatchError::SessionAlreadyActive(arena));
        }
        self.slots.insert(arena, Slot::Forming);
        Ok(())
    }

    /// Drops a reservation after a failed setup. Live sessions are untouched.
    pub fn release(&mut self, arena: ArenaId) {
        if matches!(self.slots.get(&arena), Some(Slot::Forming)) {
            self.slots.remove(&arena);
        }
    }

    /// Installs a live session, replacing the arena's reservation if any.
    pub fn create(&mut self, arena: ArenaId, handle: SessionHandle) -> Result<(), MatchError> {
        if matches!(self.slots.get(&arena), Some(Slot::Live(_))) {
            return Err(MatchError::SessionAlreadyActive(arena));
        }
        tracing::info!(%arena, session = %handle.session_id(), "session registered");
        self.slots.insert(arena, Slot::Live(handle));
        Ok(())
    }

    /// The live session of `arena`.
    pub fn get(&self, arena: ArenaId) -> Option<SessionHandle> {
        match self.slots.get(&arena) {
            Some(Slot::Live(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// `true` if `arena` has a live session or one being set up.
    pub fn is_claimed(&self, arena: ArenaId) -> bool {
        self.slots.contains_key(&arena)
    }

    /// Removes the live session of `arena`, but only if it is `session_id`.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, arena: ArenaId, session_id: SessionId) -> bool {
        let matches = matches!(
            self.slots.get(&arena),
            Some(Slot::Live(handle)) if handle.session_id() == session_id
        );
        if matches {
            self.slots.remove(&arena);
            tracing::info!(%arena, session = %session_id, "session removed");
        }
        matches
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arenas with a live session.
    pub fn arenas(&self) -> Vec<ArenaId> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .map(|(arena, _)| *arena)
            .collect()
    }
}
