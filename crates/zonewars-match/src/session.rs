//! The match session state machine.
//!
//! A [`Session`] owns the two teams, the channels created for the match,
//! and the location records that let pause/resume and end put everybody
//! back where they belong. It is driven by exactly one task at a time (see
//! [`spawn_session`](crate::spawn_session)); nothing in here is shared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use zonewars_channels::{ChannelError, ChannelProvisioner};
use zonewars_ledger::Settlement;
use zonewars_protocol::{
    ArenaId, BalanceEntry, ChannelId, GroupId, Participant, ParticipantId, SessionId,
};

use crate::claim::ClaimOnce;
use crate::relocation::{Relocation, RelocationReport, bounded, relocate};
use crate::{MatchConfig, MatchError, SessionState, SharedLedger, Team, TeamIndex, check_teams};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The channels created for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchChannels {
    pub group: GroupId,
    pub lobby: ChannelId,
    /// `teams[i]` is the home channel of team `i`.
    pub teams: [ChannelId; 2],
}

impl MatchChannels {
    pub fn team(&self, team: TeamIndex) -> ChannelId {
        self.teams[team.index()]
    }
}

/// Result of a successful trade.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    /// The participant who moved from team 1 to team 2.
    pub to_team2: Participant,
    /// The participant who moved from team 2 to team 1.
    pub to_team1: Participant,
    /// Empty while paused: nobody is moved until the next resume.
    pub relocation: RelocationReport,
}

/// Result of ending a match.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub session: SessionId,
    pub winner: TeamIndex,
    pub winners: Vec<Participant>,
    pub losers: Vec<Participant>,
    /// Points gained by each winner and paid by each loser.
    pub award: i64,
    /// Post-match balance of every participant, winners first.
    pub balances: Vec<BalanceEntry>,
    /// `false` if a ledger save failed under strict durability. The
    /// balances above are applied in memory either way.
    pub persisted: bool,
    /// The pass that returned a paused match to its team channels first.
    pub resume: Option<RelocationReport>,
    /// The pass that returned everyone to where they came from.
    pub returns: RelocationReport,
}

/// A snapshot of a session, safe to hand out of the actor.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session: SessionId,
    pub arena: ArenaId,
    pub state: SessionState,
    pub teams: [Team; 2],
    pub channels: MatchChannels,
}

/// One match in one arena.
pub struct Session<P: ChannelProvisioner> {
    id: SessionId,
    arena: ArenaId,
    state: SessionState,
    teams: [Team; 2],
    channels: MatchChannels,
    /// Where each participant was before the match first moved them.
    originals: ClaimOnce<ParticipantId, Option<ChannelId>>,
    /// Where each connected participant was when the match was paused.
    /// Empty whenever the session isn't paused.
    pre_pause: HashMap<ParticipantId, ChannelId>,
    provisioner: Arc<P>,
    config: MatchConfig,
}

impl<P: ChannelProvisioner> Session<P> {
    /// Wraps already existing channels in a new session in the Forming state.
    pub fn new(
        arena: ArenaId,
        teams: [Team; 2],
        channels: MatchChannels,
        provisioner: Arc<P>,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        check_teams(&teams, teams[0].len())?;
        if teams[0].is_empty() {
            return Err(MatchError::InvalidInput("teams cannot be empty".into()));
        }
        let id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Self {
            id,
            arena,
            state: SessionState::Forming,
            teams,
            channels,
            originals: ClaimOnce::new(),
            pre_pause: HashMap::new(),
            provisioner,
            config,
        })
    }

    /// Creates the match group, lobby and team channels, then the session.
    ///
    /// If any channel can't be created, everything created so far is
    /// deleted again and [`MatchError::Provisioning`] is returned.
    pub async fn provision(
        arena: ArenaId,
        teams: [Team; 2],
        provisioner: Arc<P>,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        check_teams(&teams, teams[0].len())?;

        let group = provisioner
            .create_group(&config.group_name)
            .await
            .map_err(MatchError::Provisioning)?;

        let mut created = Vec::with_capacity(3);
        let names = [
            config.lobby_name.clone(),
            config.team_channel_name(0),
            config.team_channel_name(1),
        ];
        for name in &names {
            match provisioner.create_channel(group, name).await {
                Ok(channel) => created.push(channel),
                Err(e) => {
                    tracing::warn!(%arena, channel = %name, error = %e, "channel creation failed, rolling back");
                    rollback(&*provisioner, group, &created).await;
                    return Err(MatchError::Provisioning(e));
                }
            }
        }

        let channels = MatchChannels {
            group,
            lobby: created[0],
            teams: [created[1], created[2]],
        };
        tracing::info!(%arena, %group, lobby = %channels.lobby, "match channels created");

        match Self::new(arena, teams, channels, Arc::clone(&provisioner), config) {
            Ok(session) => Ok(session),
            Err(e) => {
                rollback(&*provisioner, group, &created).await;
                Err(e)
            }
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn teams(&self) -> &[Team; 2] {
        &self.teams
    }

    pub fn channels(&self) -> &MatchChannels {
        &self.channels
    }

    /// The channel `participant` was in before the match, if recorded.
    pub fn original_location(&self, participant: ParticipantId) -> Option<Option<ChannelId>> {
        self.originals.get(&participant).copied()
    }

    /// The pre-pause location of `participant`. Always `None` unless paused.
    pub fn pre_pause_location(&self, participant: ParticipantId) -> Option<ChannelId> {
        self.pre_pause.get(&participant).copied()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session: self.id,
            arena: self.arena,
            state: self.state,
            teams: self.teams.clone(),
            channels: self.channels,
        }
    }

    /// Every participant with the team they're on.
    fn roster(&self) -> impl Iterator<Item = (TeamIndex, ParticipantId)> + '_ {
        TeamIndex::BOTH
            .into_iter()
            .flat_map(move |team| self.teams[team.index()].ids().map(move |id| (team, id)))
    }

    fn ensure_not_ended(&self) -> Result<(), MatchError> {
        if self.state == SessionState::Ended {
            Err(MatchError::SessionEnded)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, target: SessionState) {
        debug_assert!(self.state.can_transition_to(target));
        tracing::info!(
            arena = %self.arena,
            session = %self.id,
            from = %self.state,
            to = %target,
            "session state changed"
        );
        self.state = target;
    }

    async fn run_pass(&self, moves: Vec<Relocation>) -> RelocationReport {
        relocate(&*self.provisioner, moves, self.config.move_timeout).await
    }

    /// Where each of `participants` is right now, looked up concurrently.
    /// The outer `None` marks a lookup that timed out.
    async fn locate(
        &self,
        participants: &[ParticipantId],
    ) -> Vec<(ParticipantId, Option<Option<ChannelId>>)> {
        let timeout = self.config.move_timeout;
        let lookups = participants.iter().map(|&participant| async move {
            let found = bounded(
                timeout,
                "current_channel",
                self.provisioner.current_channel(participant),
            )
            .await;
            (participant, found)
        });
        join_all(lookups).await
    }

    /// The subset of `channels` that still exists. A check that times out
    /// counts as gone.
    async fn surviving(&self, channels: Vec<ChannelId>) -> HashSet<ChannelId> {
        let unique: HashSet<ChannelId> = channels.into_iter().collect();
        let timeout = self.config.move_timeout;
        let checks = unique.into_iter().map(|channel| async move {
            let exists = bounded(
                timeout,
                "channel_exists",
                self.provisioner.channel_exists(channel),
            )
            .await;
            exists.unwrap_or(false).then_some(channel)
        });
        join_all(checks).await.into_iter().flatten().collect()
    }

    // -----------------------------------------------------------------------
    // activate
    // -----------------------------------------------------------------------

    /// Moves everyone into their team channel.
    ///
    /// The first time a participant is seen, their current channel is
    /// recorded as where they came from. If that lookup times out nothing
    /// is recorded and the next activate tries again. Calling this on an
    /// already active session re-runs the pass.
    pub async fn activate(&mut self) -> Result<RelocationReport, MatchError> {
        self.ensure_not_ended()?;
        if self.state.is_paused() {
            return Err(MatchError::AlreadyPaused);
        }

        let roster: Vec<(TeamIndex, ParticipantId)> = self.roster().collect();
        let unclaimed: Vec<ParticipantId> = roster
            .iter()
            .map(|(_, participant)| *participant)
            .filter(|participant| !self.originals.contains(participant))
            .collect();
        for (participant, found) in self.locate(&unclaimed).await {
            match found {
                Some(current) => {
                    self.originals.claim(participant, current);
                }
                None => tracing::warn!(
                    arena = %self.arena,
                    %participant,
                    "original channel unknown"
                ),
            }
        }

        let moves = roster
            .into_iter()
            .map(|(team, participant)| Relocation::new(participant, Some(self.channels.team(team))))
            .collect();
        let report = self.run_pass(moves).await;

        if self.state != SessionState::Active {
            self.transition(SessionState::Active);
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // trade
    // -----------------------------------------------------------------------

    /// Swaps `from_team1` (on team 1) with `from_team2` (on team 2). Each
    /// takes the other's slot.
    pub async fn trade(
        &mut self,
        from_team1: ParticipantId,
        from_team2: ParticipantId,
    ) -> Result<TradeOutcome, MatchError> {
        self.ensure_not_ended()?;
        if !self.state.is_live() {
            return Err(MatchError::NotActive(self.state));
        }

        let slot_a = self.teams[0].position(from_team1).ok_or(MatchError::NotOnExpectedTeam {
            participant: from_team1,
            team: TeamIndex::First,
        })?;
        let slot_b = self.teams[1].position(from_team2).ok_or(MatchError::NotOnExpectedTeam {
            participant: from_team2,
            team: TeamIndex::Second,
        })?;

        let incoming = self.teams[1].members()[slot_b].clone();
        let to_team2 = self.teams[0].replace(slot_a, incoming);
        let to_team1 = self.teams[1].replace(slot_b, to_team2.clone());

        tracing::info!(
            arena = %self.arena,
            session = %self.id,
            to_team2 = %to_team2.id,
            to_team1 = %to_team1.id,
            "participants traded"
        );

        let [first, second] = self.channels.teams;
        let relocation = if self.state.is_paused() {
            // Whoever was in their old team channel when the match paused
            // should resume into the new one.
            if self.pre_pause.get(&from_team1) == Some(&first) {
                self.pre_pause.insert(from_team1, second);
            }
            if self.pre_pause.get(&from_team2) == Some(&second) {
                self.pre_pause.insert(from_team2, first);
            }
            RelocationReport::default()
        } else {
            self.run_pass(vec![
                Relocation::new(from_team1, Some(second)),
                Relocation::new(from_team2, Some(first)),
            ])
            .await
        };

        Ok(TradeOutcome {
            to_team2,
            to_team1,
            relocation,
        })
    }

    // -----------------------------------------------------------------------
    // pause / resume
    // -----------------------------------------------------------------------

    /// Records where every connected participant is, then moves everyone
    /// to the lobby.
    pub async fn pause(&mut self) -> Result<RelocationReport, MatchError> {
        self.ensure_not_ended()?;
        match self.state {
            SessionState::Paused => return Err(MatchError::AlreadyPaused),
            SessionState::Active => {}
            other => return Err(MatchError::NotActive(other)),
        }

        self.pre_pause.clear();
        let roster: Vec<ParticipantId> = self.roster().map(|(_, p)| p).collect();
        for (participant, found) in self.locate(&roster).await {
            if let Some(Some(channel)) = found {
                self.pre_pause.insert(participant, channel);
            }
        }

        let lobby = self.channels.lobby;
        let moves = roster
            .into_iter()
            .map(|participant| Relocation::new(participant, Some(lobby)))
            .collect();
        let report = self.run_pass(moves).await;

        self.transition(SessionState::Paused);
        Ok(report)
    }

    /// Returns everyone to where they were when the match paused, or to
    /// their team channel if that place is gone or unknown.
    pub async fn resume(&mut self) -> Result<RelocationReport, MatchError> {
        self.ensure_not_ended()?;
        if !self.state.is_paused() {
            return Err(MatchError::NotPaused);
        }
        let report = self.resume_pass().await;
        self.transition(SessionState::Active);
        Ok(report)
    }

    async fn resume_pass(&mut self) -> RelocationReport {
        let surviving = self
            .surviving(self.pre_pause.values().copied().collect())
            .await;
        let moves = self
            .roster()
            .map(|(team, participant)| {
                let target = self
                    .pre_pause
                    .get(&participant)
                    .copied()
                    .filter(|channel| surviving.contains(channel))
                    .unwrap_or(self.channels.team(team));
                Relocation::new(participant, Some(target))
            })
            .collect();
        let report = self.run_pass(moves).await;
        self.pre_pause.clear();
        report
    }

    /// Sends everyone back to their original channel, or disconnects them
    /// if there is none or it no longer exists.
    async fn return_pass(&self) -> RelocationReport {
        let originals: Vec<(ParticipantId, Option<ChannelId>)> = self
            .roster()
            .map(|(_, participant)| {
                let original = self.originals.get(&participant).copied().flatten();
                (participant, original)
            })
            .collect();
        let surviving = self
            .surviving(originals.iter().filter_map(|(_, channel)| *channel).collect())
            .await;
        let moves = originals
            .into_iter()
            .map(|(participant, original)| {
                let target = original.filter(|channel| surviving.contains(channel));
                Relocation::new(participant, target)
            })
            .collect();
        self.run_pass(moves).await
    }

    // -----------------------------------------------------------------------
    // end
    // -----------------------------------------------------------------------

    /// Settles the match and tears it down.
    ///
    /// Order of effects:
    /// 1. a paused match is resumed first
    /// 2. every winner gains `award`, every loser pays it
    /// 3. everyone goes back to their original channel, or is disconnected
    ///    if they had none or it no longer exists
    /// 4. team channels, lobby and group are deleted
    ///
    /// Only step 2 touches state that outlives the session, and it always
    /// runs: failed or stalled platform calls in step 1 never skip it.
    /// Every platform call is bounded by `move_timeout`.
    pub async fn end(
        &mut self,
        winner: TeamIndex,
        ledger: &SharedLedger,
    ) -> Result<MatchOutcome, MatchError> {
        self.ensure_not_ended()?;
        if !self.state.is_live() {
            return Err(MatchError::NotActive(self.state));
        }

        let resume = if self.state.is_paused() {
            Some(self.resume_pass().await)
        } else {
            None
        };

        let winners = self.teams[winner.index()].members().to_vec();
        let losers = self.teams[winner.other().index()].members().to_vec();
        let award = self.config.award;

        let deltas: Vec<(ParticipantId, i64)> = winners
            .iter()
            .map(|p| (p.id, award))
            .chain(losers.iter().map(|p| (p.id, -award)))
            .collect();
        let Settlement {
            balances,
            persisted,
        } = settle(ledger, deltas).await;

        let returns = self.return_pass().await;

        self.teardown().await;
        self.transition(SessionState::Ended);

        tracing::info!(
            arena = %self.arena,
            session = %self.id,
            %winner,
            award,
            persisted,
            "match ended"
        );

        Ok(MatchOutcome {
            session: self.id,
            winner,
            winners,
            losers,
            award,
            balances,
            persisted,
            resume,
            returns,
        })
    }

    // -----------------------------------------------------------------------
    // abandon
    // -----------------------------------------------------------------------

    /// Shuts down a match nobody can reach anymore. Participants who were
    /// moved go back to where they came from and the match channels are
    /// deleted. The ledger is not touched.
    pub async fn abandon(&mut self) -> RelocationReport {
        if self.state == SessionState::Ended {
            return RelocationReport::default();
        }
        let returns = if self.state == SessionState::Forming {
            RelocationReport::default()
        } else {
            self.return_pass().await
        };
        self.teardown().await;
        self.transition(SessionState::Ended);
        returns
    }

    async fn teardown(&self) {
        let MatchChannels {
            group,
            lobby,
            teams: [first, second],
        } = self.channels;
        let timeout = self.config.move_timeout;
        for channel in [first, second, lobby] {
            let deleted = bounded(
                timeout,
                "delete_channel",
                self.provisioner.delete_channel(channel),
            )
            .await;
            if let Some(Err(e)) = deleted {
                log_cleanup_failure(self.arena, &e);
            }
        }
        let deleted = bounded(timeout, "delete_group", self.provisioner.delete_group(group)).await;
        if let Some(Err(e)) = deleted {
            log_cleanup_failure(self.arena, &e);
        }
    }
}

impl<P: ChannelProvisioner> std::fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("arena", &self.arena)
            .field("state", &self.state)
            .field("teams", &self.teams)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// Applies `deltas` on the blocking pool; a file-backed ledger writes to
/// disk on every settlement.
async fn settle(ledger: &SharedLedger, deltas: Vec<(ParticipantId, i64)>) -> Settlement {
    let ledger = Arc::clone(ledger);
    let task = tokio::task::spawn_blocking(move || ledger.blocking_lock().settle(&deltas));
    match task.await {
        Ok(settlement) => settlement,
        Err(e) => {
            tracing::error!(error = %e, "ledger settlement did not complete");
            Settlement::default()
        }
    }
}

fn log_cleanup_failure(arena: ArenaId, error: &ChannelError) {
    tracing::warn!(%arena, %error, "match cleanup step failed");
}

async fn rollback<P: ChannelProvisioner>(provisioner: &P, group: GroupId, created: &[ChannelId]) {
    for channel in created {
        if let Err(e) = provisioner.delete_channel(*channel).await {
            tracing::warn!(%channel, error = %e, "rollback: channel delete failed");
        }
    }
    if let Err(e) = provisioner.delete_group(group).await {
        tracing::warn!(%group, error = %e, "rollback: group delete failed");
    }
}
