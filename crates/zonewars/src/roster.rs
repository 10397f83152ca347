//! Turning raw user input into participants.
//!
//! Commands name players the way a chat user types them: mentions like
//! `<@123>` or `<@!123>`, or bare numeric ids, separated by commas. The
//! [`RosterResolver`] trait hides how those are checked against the
//! arena's actual members.

use std::collections::HashMap;
use std::future::Future;

use zonewars_protocol::{ArenaId, Participant, ParticipantId};

/// Resolves user-supplied player tokens into participants of an arena.
///
/// Tokens that can't be resolved are dropped, not reported. Callers catch
/// the resulting short list with their own count checks ("exactly 4
/// players are required"), the same way a user would see it.
///
/// [`StaticRoster`] is the in-tree implementation: a fixed member list per
/// arena.
///
/// ```rust
/// use zonewars::StaticRoster;
/// use zonewars_protocol::{ArenaId, Participant, ParticipantId};
///
/// let roster = StaticRoster::new().with_member(ArenaId(1), Participant::new(42, "alice"));
/// assert!(roster.member(ArenaId(1), ParticipantId(42)).is_some());
/// assert!(roster.member(ArenaId(2), ParticipantId(42)).is_none());
/// ```
pub trait RosterResolver: Send + Sync + 'static {
    /// Resolves `tokens` against the members of `arena`, in input order.
    /// Each token may hold several comma-separated entries.
    fn resolve(
        &self,
        arena: ArenaId,
        tokens: &[String],
    ) -> impl Future<Output = Vec<Participant>> + Send;
}

/// Parses one entry: `<@id>`, `<@!id>` or a bare id.
pub fn parse_participant_token(token: &str) -> Option<ParticipantId> {
    let token = token.trim();
    let raw = match token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        Some(inner) => inner.strip_prefix('!').unwrap_or(inner),
        None => token,
    };
    raw.parse::<u64>().ok().map(ParticipantId)
}

/// Splits comma-separated tokens into individual non-empty entries.
fn split_tokens(tokens: &[String]) -> impl Iterator<Item = &str> {
    tokens
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A fixed member directory per arena.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    members: HashMap<ArenaId, HashMap<ParticipantId, Participant>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant` to the member list of `arena`.
    pub fn add_member(&mut self, arena: ArenaId, participant: Participant) {
        self.members
            .entry(arena)
            .or_default()
            .insert(participant.id, participant);
    }

    /// Builder-style [`add_member`](Self::add_member).
    pub fn with_member(mut self, arena: ArenaId, participant: Participant) -> Self {
        self.add_member(arena, participant);
        self
    }

    pub fn member(&self, arena: ArenaId, id: ParticipantId) -> Option<&Participant> {
        self.members.get(&arena).and_then(|m| m.get(&id))
    }
}

impl RosterResolver for StaticRoster {
    async fn resolve(&self, arena: ArenaId, tokens: &[String]) -> Vec<Participant> {
        split_tokens(tokens)
            .filter_map(|token| {
                let found = parse_participant_token(token).and_then(|id| self.member(arena, id));
                if found.is_none() {
                    tracing::debug!(%arena, token, "dropping unresolved player token");
                }
                found.cloned()
            })
            .collect()
    }
}
