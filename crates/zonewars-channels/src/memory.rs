//! In-memory [`ChannelProvisioner`] with fault injection.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use zonewars_protocol::{ChannelId, GroupId, ParticipantId};

use crate::{ChannelError, ChannelProvisioner};

#[derive(Debug, Clone)]
struct ChannelEntry {
    name: String,
    group: Option<GroupId>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    groups: HashMap<GroupId, String>,
    channels: HashMap<ChannelId, ChannelEntry>,
    /// Where each connected participant currently is.
    locations: HashMap<ParticipantId, ChannelId>,
    /// Participants whose moves are rejected.
    failing: HashSet<ParticipantId>,
    /// Participants whose moves never complete.
    stalled: HashSet<ParticipantId>,
    /// Participants whose location lookups never complete.
    stalled_lookups: HashSet<ParticipantId>,
    /// Channel existence checks never complete.
    stalled_channel_checks: bool,
    /// Remaining channel creations before they start failing.
    creations_left: Option<usize>,
    /// Every successful move, in order.
    moves: Vec<(ParticipantId, Option<ChannelId>)>,
}

impl Inner {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A fake chat platform that keeps voice state in memory.
///
/// Behaves like a real platform where it matters to the session layer:
/// only participants connected to voice can be moved, moving into a
/// deleted channel fails, and deleting a channel drops everyone in it.
/// Faults can be injected per participant.
///
/// ```rust
/// use zonewars_channels::MemoryProvisioner;
/// use zonewars_protocol::ParticipantId;
///
/// let platform = MemoryProvisioner::new();
/// let general = platform.add_channel("General");
/// platform.connect(ParticipantId(1), general);
/// assert_eq!(platform.location(ParticipantId(1)), Some(general));
/// ```
#[derive(Debug, Default)]
pub struct MemoryProvisioner {
    inner: Mutex<Inner>,
}

impl MemoryProvisioner {
    /// Creates an empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a standalone channel, e.g. the arena's everyday voice rooms.
    pub fn add_channel(&self, name: &str) -> ChannelId {
        let mut inner = self.lock();
        let id = ChannelId(inner.allocate());
        inner.channels.insert(
            id,
            ChannelEntry {
                name: name.to_string(),
                group: None,
            },
        );
        id
    }

    /// Connects `participant` to voice in `channel`, bypassing fault
    /// injection. Simulates the user joining on their own.
    pub fn connect(&self, participant: ParticipantId, channel: ChannelId) {
        self.lock().locations.insert(participant, channel);
    }

    /// Disconnects `participant` from voice on their own accord.
    pub fn disconnect(&self, participant: ParticipantId) {
        self.lock().locations.remove(&participant);
    }

    /// Where `participant` is right now.
    pub fn location(&self, participant: ParticipantId) -> Option<ChannelId> {
        self.lock().locations.get(&participant).copied()
    }

    /// Makes every move of `participant` fail with [`ChannelError::Rejected`].
    pub fn fail_moves(&self, participant: ParticipantId) {
        self.lock().failing.insert(participant);
    }

    /// Makes every move of `participant` hang forever.
    pub fn stall_moves(&self, participant: ParticipantId) {
        self.lock().stalled.insert(participant);
    }

    /// Makes every location lookup of `participant` hang forever.
    pub fn stall_lookups(&self, participant: ParticipantId) {
        self.lock().stalled_lookups.insert(participant);
    }

    /// Makes every channel existence check hang while `stall` is set.
    pub fn stall_channel_checks(&self, stall: bool) {
        self.lock().stalled_channel_checks = stall;
    }

    /// Removes any injected fault for `participant`.
    pub fn clear_faults(&self, participant: ParticipantId) {
        let mut inner = self.lock();
        inner.failing.remove(&participant);
        inner.stalled.remove(&participant);
        inner.stalled_lookups.remove(&participant);
    }

    /// Lets `count` more channel creations succeed, then fails the rest.
    pub fn fail_channel_creation_after(&self, count: usize) {
        self.lock().creations_left = Some(count);
    }

    /// Deletes a channel behind the coordinator's back.
    pub fn remove_channel(&self, channel: ChannelId) {
        let mut inner = self.lock();
        inner.channels.remove(&channel);
        inner.locations.retain(|_, at| *at != channel);
    }

    /// The name of `channel`, if it exists.
    pub fn channel_name(&self, channel: ChannelId) -> Option<String> {
        self.lock().channels.get(&channel).map(|c| c.name.clone())
    }

    /// The group `channel` belongs to, if any.
    pub fn channel_group(&self, channel: ChannelId) -> Option<GroupId> {
        self.lock().channels.get(&channel).and_then(|c| c.group)
    }

    /// Number of channels that currently exist.
    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// Number of groups that currently exist.
    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    /// Every successful move so far, oldest first.
    pub fn moves(&self) -> Vec<(ParticipantId, Option<ChannelId>)> {
        self.lock().moves.clone()
    }
}

impl ChannelProvisioner for MemoryProvisioner {
    async fn create_group(&self, name: &str) -> Result<GroupId, ChannelError> {
        let mut inner = self.lock();
        let id = GroupId(inner.allocate());
        inner.groups.insert(id, name.to_string());
        Ok(id)
    }

    async fn create_channel(&self, group: GroupId, name: &str) -> Result<ChannelId, ChannelError> {
        let mut inner = self.lock();
        if !inner.groups.contains_key(&group) {
            return Err(ChannelError::GroupNotFound(group));
        }
        match inner.creations_left {
            Some(0) => {
                return Err(ChannelError::Rejected(format!(
                    "cannot create channel '{name}'"
                )));
            }
            Some(n) => inner.creations_left = Some(n - 1),
            None => {}
        }
        let id = ChannelId(inner.allocate());
        inner.channels.insert(
            id,
            ChannelEntry {
                name: name.to_string(),
                group: Some(group),
            },
        );
        Ok(id)
    }

    async fn move_participant(
        &self,
        participant: ParticipantId,
        target: Option<ChannelId>,
    ) -> Result<(), ChannelError> {
        let stalled = self.lock().stalled.contains(&participant);
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut inner = self.lock();
        if inner.failing.contains(&participant) {
            return Err(ChannelError::Rejected(format!(
                "cannot move {participant}"
            )));
        }
        match target {
            Some(channel) => {
                if !inner.channels.contains_key(&channel) {
                    return Err(ChannelError::ChannelNotFound(channel));
                }
                if !inner.locations.contains_key(&participant) {
                    return Err(ChannelError::Rejected(format!(
                        "{participant} is not connected to voice"
                    )));
                }
                inner.locations.insert(participant, channel);
            }
            None => {
                inner.locations.remove(&participant);
            }
        }
        inner.moves.push((participant, target));
        tracing::debug!(%participant, ?target, "participant moved");
        Ok(())
    }

    async fn current_channel(&self, participant: ParticipantId) -> Option<ChannelId> {
        let stalled = self.lock().stalled_lookups.contains(&participant);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.location(participant)
    }

    async fn channel_exists(&self, channel: ChannelId) -> bool {
        let stalled = self.lock().stalled_channel_checks;
        if stalled {
            std::future::pending::<()>().await;
        }
        self.lock().channels.contains_key(&channel)
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        if inner.channels.remove(&channel).is_none() {
            return Err(ChannelError::ChannelNotFound(channel));
        }
        inner.locations.retain(|_, at| *at != channel);
        tracing::debug!(%channel, "channel deleted");
        Ok(())
    }

    async fn delete_group(&self, group: GroupId) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        if inner.groups.remove(&group).is_none() {
            return Err(ChannelError::GroupNotFound(group));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    #[tokio::test]
    async fn test_create_channel_requires_existing_group() {
        let platform = MemoryProvisioner::new();
        let result = platform.create_channel(GroupId(999), "Lobby").await;
        assert!(matches!(result, Err(ChannelError::GroupNotFound(_))));
    }

    #[tokio::test]
    async fn test_move_participant_updates_location_and_log() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let group = platform.create_group("Match").await.unwrap();
        let lobby = platform.create_channel(group, "Lobby").await.unwrap();
        platform.connect(pid(1), general);

        platform.move_participant(pid(1), Some(lobby)).await.unwrap();

        assert_eq!(platform.location(pid(1)), Some(lobby));
        assert_eq!(platform.moves(), vec![(pid(1), Some(lobby))]);
        assert_eq!(platform.channel_group(lobby), Some(group));
    }

    #[tokio::test]
    async fn test_move_offline_participant_is_rejected() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");

        let result = platform.move_participant(pid(1), Some(general)).await;

        assert!(matches!(result, Err(ChannelError::Rejected(_))));
        assert_eq!(platform.location(pid(1)), None);
    }

    #[tokio::test]
    async fn test_move_to_none_disconnects() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        platform.connect(pid(1), general);

        platform.move_participant(pid(1), None).await.unwrap();

        assert_eq!(platform.location(pid(1)), None);
    }

    #[tokio::test]
    async fn test_move_to_deleted_channel_fails() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let gone = platform.add_channel("Gone");
        platform.connect(pid(1), general);
        platform.remove_channel(gone);

        let result = platform.move_participant(pid(1), Some(gone)).await;

        assert!(matches!(result, Err(ChannelError::ChannelNotFound(c)) if c == gone));
        assert!(!platform.channel_exists(gone).await);
    }

    #[tokio::test]
    async fn test_fail_moves_injects_rejection() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let other = platform.add_channel("Other");
        platform.connect(pid(1), general);
        platform.fail_moves(pid(1));

        assert!(platform.move_participant(pid(1), Some(other)).await.is_err());

        platform.clear_faults(pid(1));
        assert!(platform.move_participant(pid(1), Some(other)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_moves_never_completes() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        platform.connect(pid(1), general);
        platform.stall_moves(pid(1));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            platform.move_participant(pid(1), None),
        )
        .await;

        assert!(result.is_err(), "stalled move should time out");
        assert_eq!(platform.location(pid(1)), Some(general));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_lookups_and_channel_checks() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        platform.connect(pid(1), general);
        platform.stall_lookups(pid(1));
        platform.stall_channel_checks(true);

        let lookup =
            tokio::time::timeout(Duration::from_secs(5), platform.current_channel(pid(1))).await;
        let check =
            tokio::time::timeout(Duration::from_secs(5), platform.channel_exists(general)).await;
        assert!(lookup.is_err());
        assert!(check.is_err());

        platform.clear_faults(pid(1));
        platform.stall_channel_checks(false);
        assert_eq!(platform.current_channel(pid(1)).await, Some(general));
        assert!(platform.channel_exists(general).await);
    }

    #[tokio::test]
    async fn test_delete_channel_drops_occupants() {
        let platform = MemoryProvisioner::new();
        let group = platform.create_group("Match").await.unwrap();
        let team = platform.create_channel(group, "Team 1").await.unwrap();
        platform.connect(pid(1), team);

        platform.delete_channel(team).await.unwrap();

        assert_eq!(platform.location(pid(1)), None);
        assert!(platform.delete_channel(team).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_channel_creation_after_budget() {
        let platform = MemoryProvisioner::new();
        let group = platform.create_group("Match").await.unwrap();
        platform.fail_channel_creation_after(1);

        assert!(platform.create_channel(group, "Lobby").await.is_ok());
        assert!(platform.create_channel(group, "Team 1").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_group_twice_fails() {
        let platform = MemoryProvisioner::new();
        let group = platform.create_group("Match").await.unwrap();

        platform.delete_group(group).await.unwrap();

        assert_eq!(platform.group_count(), 0);
        assert!(matches!(
            platform.delete_group(group).await,
            Err(ChannelError::GroupNotFound(_))
        ));
    }
}
