//! `Coordinator` builder and command surface.
//!
//! This is the entry point for running ZoneWars. It ties together all the
//! layers: roster resolution → team assignment → session actors → ledger.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use zonewars_channels::ChannelProvisioner;
use zonewars_ledger::{DEFAULT_LEADERBOARD_SIZE, Ledger, LedgerConfig};
use zonewars_match::{
    Assignment, MatchChannels, MatchConfig, MatchError, MatchOutcome, RelocationReport, Session,
    SessionHandle, SessionInfo, SessionRegistry, SharedLedger, Team, TeamIndex, TradeOutcome,
    assign_teams, spawn_session,
};
use zonewars_protocol::{
    ArenaId, AssignMode, BalanceEntry, Command, CreateSessionRequest, Participant, ParticipantId,
    Reply, SessionId,
};

use crate::{RosterResolver, ZoneWarsError};

/// What `create_session` hands back.
#[derive(Debug, Clone)]
pub struct SessionStarted {
    pub session: SessionId,
    pub teams: [Team; 2],
    pub channels: MatchChannels,
    /// The pass that moved everyone into their team channels.
    pub relocation: RelocationReport,
}

/// Where the coordinator's ledger comes from.
enum LedgerSource {
    Config(LedgerConfig),
    Ready(Ledger),
}

/// Builder for configuring a [`Coordinator`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use zonewars::prelude::*;
///
/// let coordinator = CoordinatorBuilder::new()
///     .match_config(MatchConfig { award: 25, ..MatchConfig::default() })
///     .ledger(Ledger::in_memory())
///     .build(Arc::new(MemoryProvisioner::new()), StaticRoster::new())
///     .unwrap();
/// assert_eq!(coordinator.config().award, 25);
/// ```
pub struct CoordinatorBuilder {
    match_config: MatchConfig,
    ledger: LedgerSource,
}

impl CoordinatorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            match_config: MatchConfig::default(),
            ledger: LedgerSource::Config(LedgerConfig::default()),
        }
    }

    /// Sets the match configuration.
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    /// Opens the ledger file described by `config` at build time.
    pub fn ledger_config(mut self, config: LedgerConfig) -> Self {
        self.ledger = LedgerSource::Config(config);
        self
    }

    /// Uses an already opened ledger.
    pub fn ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = LedgerSource::Ready(ledger);
        self
    }

    /// Builds the coordinator over the given platform and roster.
    pub fn build<P: ChannelProvisioner, R: RosterResolver>(
        self,
        provisioner: Arc<P>,
        resolver: R,
    ) -> Result<Coordinator<P, R>, ZoneWarsError> {
        self.match_config.validate()?;

        let ledger = match self.ledger {
            LedgerSource::Config(config) => Ledger::from_config(&config),
            LedgerSource::Ready(ledger) => ledger,
        };

        Ok(Coordinator {
            provisioner,
            resolver,
            ledger: Arc::new(tokio::sync::Mutex::new(ledger)),
            registry: Mutex::new(SessionRegistry::new()),
            config: self.match_config,
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs matches for any number of arenas.
///
/// All methods take `&self`; share the coordinator behind an `Arc` to call
/// it from many tasks. Operations on different arenas never wait for each
/// other. Operations on the same arena are queued by the arena's session
/// actor and run one at a time.
pub struct Coordinator<P: ChannelProvisioner, R: RosterResolver> {
    provisioner: Arc<P>,
    resolver: R,
    ledger: SharedLedger,
    /// Only locked for map lookups and updates, never across an await.
    registry: Mutex<SessionRegistry>,
    config: MatchConfig,
}

fn lock_registry(registry: &Mutex<SessionRegistry>) -> MutexGuard<'_, SessionRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds an arena's forming slot for one `create_session` call and frees
/// it on drop, including when the call is cancelled. `release` leaves a
/// live slot alone, so a successful create is unaffected.
struct Reservation<'a> {
    registry: &'a Mutex<SessionRegistry>,
    arena: ArenaId,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        lock_registry(self.registry).release(self.arena);
    }
}

/// An actor that has stopped means the match is over as far as callers
/// are concerned.
fn no_session(arena: ArenaId) -> impl FnOnce(MatchError) -> MatchError {
    move |e| match e {
        MatchError::SessionEnded => MatchError::NoActiveSession(arena),
        other => other,
    }
}

/// Provisions the match channels, starts the actor and moves everyone in.
async fn launch_session<P: ChannelProvisioner>(
    arena: ArenaId,
    teams: [Team; 2],
    provisioner: Arc<P>,
    ledger: SharedLedger,
    config: MatchConfig,
) -> Result<(SessionHandle, RelocationReport, SessionInfo), MatchError> {
    let buffer = config.command_buffer;
    let session = Session::provision(arena, teams, provisioner, config).await?;
    let handle = spawn_session(session, ledger, buffer);
    let relocation = handle.activate().await?;
    let info = handle.info().await?;
    Ok((handle, relocation, info))
}

impl<P: ChannelProvisioner, R: RosterResolver> Coordinator<P, R> {
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn provisioner(&self) -> &Arc<P> {
        &self.provisioner
    }

    /// The shared ledger.
    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Arenas that currently have a match.
    pub async fn active_arenas(&self) -> Vec<ArenaId> {
        self.registry().arenas()
    }

    fn registry(&self) -> MutexGuard<'_, SessionRegistry> {
        lock_registry(&self.registry)
    }

    fn session(&self, arena: ArenaId) -> Result<SessionHandle, MatchError> {
        self.registry()
            .get(arena)
            .ok_or(MatchError::NoActiveSession(arena))
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Builds teams, creates the match channels and moves everyone in.
    ///
    /// The arena is claimed before anything else happens; a second create
    /// for the same arena fails with
    /// [`SessionAlreadyActive`](MatchError::SessionAlreadyActive) even
    /// while the first is still setting up.
    ///
    /// Dropping the returned future frees the arena right away. Channel
    /// setup keeps running in the background and is torn down again once
    /// it finishes, since no one is left to end the match.
    pub async fn create_session(
        &self,
        arena: ArenaId,
        request: CreateSessionRequest,
    ) -> Result<SessionStarted, ZoneWarsError> {
        self.registry().reserve(arena)?;
        let _reservation = Reservation {
            registry: &self.registry,
            arena,
        };

        let result = self.start_session(arena, request).await;
        if let Err(e) = &result {
            tracing::info!(%arena, error = %e, "match creation failed");
        }
        result
    }

    async fn start_session(
        &self,
        arena: ArenaId,
        request: CreateSessionRequest,
    ) -> Result<SessionStarted, ZoneWarsError> {
        self.config.validate_team_size(request.team_size)?;
        let assignment = self.resolve_assignment(arena, &request).await?;
        let teams = assign_teams(assignment, request.team_size)?;

        let launch = tokio::spawn(launch_session(
            arena,
            teams,
            Arc::clone(&self.provisioner),
            Arc::clone(&self.ledger),
            self.config.clone(),
        ));
        let (handle, relocation, info) = launch.await??;
        self.registry().create(arena, handle)?;

        tracing::info!(
            %arena,
            session = %info.session,
            mode = %request.mode,
            team_size = request.team_size,
            moved = relocation.summary().moved,
            "match created"
        );

        Ok(SessionStarted {
            session: info.session,
            teams: info.teams,
            channels: info.channels,
            relocation,
        })
    }

    async fn resolve_assignment(
        &self,
        arena: ArenaId,
        request: &CreateSessionRequest,
    ) -> Result<Assignment, ZoneWarsError> {
        let assignment = match request.mode {
            AssignMode::Random => Assignment::Random {
                roster: self.resolve_required(arena, &request.roster, "players").await?,
            },
            AssignMode::Draft => Assignment::Draft {
                roster: self.resolve_required(arena, &request.roster, "players").await?,
                captains: self.resolve_required(arena, &request.captains, "captains").await?,
            },
            AssignMode::Manual => {
                if request.team1.is_empty() || request.team2.is_empty() {
                    return Err(MatchError::InvalidInput(
                        "manual mode needs players for both teams".into(),
                    )
                    .into());
                }
                Assignment::Manual {
                    team1: self.resolver.resolve(arena, &request.team1).await,
                    team2: self.resolver.resolve(arena, &request.team2).await,
                }
            }
        };
        Ok(assignment)
    }

    async fn resolve_required(
        &self,
        arena: ArenaId,
        tokens: &[String],
        what: &str,
    ) -> Result<Vec<Participant>, MatchError> {
        if tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(MatchError::InvalidInput(format!("no {what} specified")));
        }
        Ok(self.resolver.resolve(arena, tokens).await)
    }

    // -----------------------------------------------------------------------
    // session commands
    // -----------------------------------------------------------------------

    /// Swaps `from_team1` (on team 1) with `from_team2` (on team 2).
    pub async fn trade(
        &self,
        arena: ArenaId,
        from_team1: ParticipantId,
        from_team2: ParticipantId,
    ) -> Result<TradeOutcome, ZoneWarsError> {
        let handle = self.session(arena)?;
        Ok(handle
            .trade(from_team1, from_team2)
            .await
            .map_err(no_session(arena))?)
    }

    /// Moves everyone in the arena's match to the lobby.
    pub async fn pause(&self, arena: ArenaId) -> Result<RelocationReport, ZoneWarsError> {
        let handle = self.session(arena)?;
        Ok(handle.pause().await.map_err(no_session(arena))?)
    }

    /// Moves everyone back to where they were before the pause.
    pub async fn resume(&self, arena: ArenaId) -> Result<RelocationReport, ZoneWarsError> {
        let handle = self.session(arena)?;
        Ok(handle.resume().await.map_err(no_session(arena))?)
    }

    /// Ends the arena's match with `winning_team` (0 or 1) as the winner,
    /// settles the ledger and frees the arena.
    pub async fn end(
        &self,
        arena: ArenaId,
        winning_team: usize,
    ) -> Result<MatchOutcome, ZoneWarsError> {
        let handle = self.session(arena)?;
        let winner = TeamIndex::try_from(winning_team)?;
        let result = handle.end(winner).await;
        if matches!(result, Ok(_) | Err(MatchError::SessionEnded)) {
            self.registry().remove(arena, handle.session_id());
        }
        Ok(result.map_err(no_session(arena))?)
    }

    /// A snapshot of the arena's match.
    pub async fn session_info(&self, arena: ArenaId) -> Result<SessionInfo, ZoneWarsError> {
        let handle = self.session(arena)?;
        Ok(handle.info().await.map_err(no_session(arena))?)
    }

    // -----------------------------------------------------------------------
    // ledger
    // -----------------------------------------------------------------------

    pub async fn balance(&self, participant: ParticipantId) -> BalanceEntry {
        let balance = self.ledger.lock().await.get(participant);
        BalanceEntry {
            participant,
            balance,
        }
    }

    /// The top balances, 10 unless `top` says otherwise.
    pub async fn leaderboard(&self, top: Option<usize>) -> Vec<BalanceEntry> {
        self.ledger
            .lock()
            .await
            .leaderboard(top.unwrap_or(DEFAULT_LEADERBOARD_SIZE))
    }

    // -----------------------------------------------------------------------
    // dispatch
    // -----------------------------------------------------------------------

    /// Runs a serialized [`Command`] issued by `invoker` in `arena`.
    pub async fn dispatch(
        &self,
        arena: ArenaId,
        invoker: ParticipantId,
        command: Command,
    ) -> Result<Reply, ZoneWarsError> {
        tracing::debug!(%arena, %invoker, ?command, "dispatching command");
        let reply = match command {
            Command::CreateSession(request) => {
                let started = self.create_session(arena, request).await?;
                let [first, second] = started.teams;
                Reply::SessionCreated {
                    session: started.session,
                    teams: [first.into_members(), second.into_members()],
                    relocation: started.relocation.summary(),
                }
            }
            Command::Trade {
                from_team1,
                from_team2,
            } => {
                let outcome = self.trade(arena, from_team1, from_team2).await?;
                Reply::Traded {
                    to_team2: outcome.to_team2,
                    to_team1: outcome.to_team1,
                    relocation: outcome.relocation.summary(),
                }
            }
            Command::Pause => Reply::Paused {
                relocation: self.pause(arena).await?.summary(),
            },
            Command::Resume => Reply::Resumed {
                relocation: self.resume(arena).await?.summary(),
            },
            Command::End { winning_team } => {
                let outcome = self.end(arena, winning_team).await?;
                Reply::Ended {
                    winning_team: outcome.winner.index(),
                    winners: outcome.winners,
                    losers: outcome.losers,
                    award: outcome.award,
                    balances: outcome.balances,
                }
            }
            Command::Balance { participant } => {
                Reply::Balance(self.balance(participant.unwrap_or(invoker)).await)
            }
            Command::Leaderboard { top } => Reply::Leaderboard {
                entries: self.leaderboard(top).await,
            },
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use zonewars_channels::MemoryProvisioner;
    use zonewars_ledger::LedgerConfig;

    use super::*;
    use crate::StaticRoster;

    #[test]
    fn test_build_rejects_invalid_match_config() {
        let result = CoordinatorBuilder::new()
            .match_config(MatchConfig {
                min_team_size: 0,
                ..MatchConfig::default()
            })
            .ledger(Ledger::in_memory())
            .build(Arc::new(MemoryProvisioner::new()), StaticRoster::new());

        assert!(matches!(
            result,
            Err(ZoneWarsError::Match(MatchError::InvalidInput(_)))
        ));
    }

    #[tokio::test]
    async fn test_build_from_ledger_config_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"7": 30}"#).unwrap();

        let coordinator = CoordinatorBuilder::new()
            .ledger_config(LedgerConfig {
                path,
                ..LedgerConfig::default()
            })
            .build(Arc::new(MemoryProvisioner::new()), StaticRoster::new())
            .unwrap();

        assert_eq!(coordinator.balance(ParticipantId(7)).await.balance, 30);
    }
}
