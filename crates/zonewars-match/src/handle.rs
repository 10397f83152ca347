//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Commands for a session are processed one at a time, in arrival order,
//! so two operations on the same arena can never interleave. Different
//! arenas run in different tasks and never wait on each other.

use tokio::sync::{mpsc, oneshot};
use zonewars_channels::ChannelProvisioner;
use zonewars_protocol::{ArenaId, ParticipantId, SessionId};

use crate::{
    MatchError, MatchOutcome, RelocationReport, Session, SessionInfo, SessionState, SharedLedger,
    TeamIndex, TradeOutcome,
};

type Reply<T> = oneshot::Sender<Result<T, MatchError>>;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Activate {
        reply: Reply<RelocationReport>,
    },
    Trade {
        from_team1: ParticipantId,
        from_team2: ParticipantId,
        reply: Reply<TradeOutcome>,
    },
    Pause {
        reply: Reply<RelocationReport>,
    },
    Resume {
        reply: Reply<RelocationReport>,
    },
    End {
        winner: TeamIndex,
        reply: Reply<MatchOutcome>,
    },
    GetInfo {
        reply: oneshot::Sender<SessionInfo>,
    },
}

/// Handle to a running session actor.
///
/// Cheap to clone. Once the session has ended its actor is gone, and every
/// call on a leftover handle returns [`MatchError::SessionEnded`]. Dropping
/// the last handle of a session that never ended makes the actor abandon
/// it: participants are sent back and the match channels deleted.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    arena: ArenaId,
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Activate { .. } => "Activate",
            Self::Trade { .. } => "Trade",
            Self::Pause { .. } => "Pause",
            Self::Resume { .. } => "Resume",
            Self::End { .. } => "End",
            Self::GetInfo { .. } => "GetInfo",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| MatchError::SessionEnded)?;
        reply_rx.await.map_err(|_| MatchError::SessionEnded)?
    }

    /// Moves everyone into their team channels. See [`Session::activate`].
    pub async fn activate(&self) -> Result<RelocationReport, MatchError> {
        self.request(|reply| SessionCommand::Activate { reply }).await
    }

    pub async fn trade(
        &self,
        from_team1: ParticipantId,
        from_team2: ParticipantId,
    ) -> Result<TradeOutcome, MatchError> {
        self.request(|reply| SessionCommand::Trade {
            from_team1,
            from_team2,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> Result<RelocationReport, MatchError> {
        self.request(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<RelocationReport, MatchError> {
        self.request(|reply| SessionCommand::Resume { reply }).await
    }

    /// Ends the match. The actor stops after a successful end.
    pub async fn end(&self, winner: TeamIndex) -> Result<MatchOutcome, MatchError> {
        self.request(|reply| SessionCommand::End { winner, reply }).await
    }

    pub async fn info(&self) -> Result<SessionInfo, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| MatchError::SessionEnded)?;
        reply_rx.await.map_err(|_| MatchError::SessionEnded)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor<P: ChannelProvisioner> {
    session: Session<P>,
    ledger: SharedLedger,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<P: ChannelProvisioner> SessionActor<P> {
    async fn run(mut self) {
        let arena = self.session.arena();
        let session_id = self.session.id();
        tracing::info!(%arena, session = %session_id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Activate { reply } => {
                    let _ = reply.send(self.session.activate().await);
                }
                SessionCommand::Trade {
                    from_team1,
                    from_team2,
                    reply,
                } => {
                    let _ = reply.send(self.session.trade(from_team1, from_team2).await);
                }
                SessionCommand::Pause { reply } => {
                    let _ = reply.send(self.session.pause().await);
                }
                SessionCommand::Resume { reply } => {
                    let _ = reply.send(self.session.resume().await);
                }
                SessionCommand::End { winner, reply } => {
                    let result = self.session.end(winner, &self.ledger).await;
                    let ended = result.is_ok();
                    let _ = reply.send(result);
                    if ended {
                        break;
                    }
                }
                SessionCommand::GetInfo { reply } => {
                    let _ = reply.send(self.session.info());
                }
            }
        }

        if self.session.state() != SessionState::Ended {
            // Every handle is gone, so nobody can end this match anymore.
            tracing::warn!(%arena, session = %session_id, "session abandoned, tearing down");
            self.session.abandon().await;
        }

        tracing::info!(%arena, session = %session_id, "session actor stopped");
    }
}

/// Spawns the actor for `session` and returns a handle to it.
///
/// `buffer` bounds the command queue; senders wait when it is full.
pub fn spawn_session<P: ChannelProvisioner>(
    session: Session<P>,
    ledger: SharedLedger,
    buffer: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let handle = SessionHandle {
        arena: session.arena(),
        session_id: session.id(),
        sender: tx,
    };

    let actor = SessionActor {
        session,
        ledger,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    handle
}
