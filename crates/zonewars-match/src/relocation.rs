//! Relocation passes: one batch of participant moves.
//!
//! A pass issues every move at once and waits for all of them. Each move is
//! bounded by a timeout and reported individually; nothing in a pass can
//! fail the pass itself.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use zonewars_channels::ChannelProvisioner;
use zonewars_protocol::{ChannelId, ParticipantId, RelocationSummary};

/// One requested move. `target == None` means "disconnect from voice".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub participant: ParticipantId,
    pub target: Option<ChannelId>,
}

impl Relocation {
    pub fn new(participant: ParticipantId, target: Option<ChannelId>) -> Self {
        Self {
            participant,
            target,
        }
    }
}

/// What happened to one participant during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move was issued and succeeded.
    Moved,
    /// The participant was already where they should be; no move issued.
    Unchanged,
    /// The platform refused the move.
    Failed(String),
    /// The move didn't complete within the configured timeout.
    TimedOut,
}

impl MoveOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::TimedOut)
    }
}

/// Per-participant outcomes of one relocation pass, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    outcomes: Vec<(Relocation, MoveOutcome)>,
}

impl RelocationReport {
    pub fn outcomes(&self) -> &[(Relocation, MoveOutcome)] {
        &self.outcomes
    }

    /// The outcome for `participant`, if they were part of the pass.
    pub fn outcome(&self, participant: ParticipantId) -> Option<&MoveOutcome> {
        self.outcomes
            .iter()
            .find(|(r, _)| r.participant == participant)
            .map(|(_, outcome)| outcome)
    }

    /// Participants whose move failed or timed out.
    pub fn failed(&self) -> Vec<ParticipantId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(r, _)| r.participant)
            .collect()
    }

    pub fn summary(&self) -> RelocationSummary {
        let mut summary = RelocationSummary::default();
        for (_, outcome) in &self.outcomes {
            match outcome {
                MoveOutcome::Moved => summary.moved += 1,
                MoveOutcome::Unchanged => summary.unchanged += 1,
                MoveOutcome::Failed(_) | MoveOutcome::TimedOut => summary.failed += 1,
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Appends the outcomes of `other`.
    pub fn merge(&mut self, other: RelocationReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Runs every move in `moves` concurrently and waits for all of them.
pub(crate) async fn relocate<P: ChannelProvisioner>(
    provisioner: &P,
    moves: Vec<Relocation>,
    timeout: Duration,
) -> RelocationReport {
    let passes = moves
        .into_iter()
        .map(|relocation| async move {
            let outcome = relocate_one(provisioner, relocation, timeout).await;
            (relocation, outcome)
        });
    let outcomes = join_all(passes).await;
    RelocationReport { outcomes }
}

/// Looks up where `participant` is and moves them if needed. The lookup
/// and the move share one `timeout`.
async fn relocate_one<P: ChannelProvisioner>(
    provisioner: &P,
    relocation: Relocation,
    timeout: Duration,
) -> MoveOutcome {
    let Relocation {
        participant,
        target,
    } = relocation;

    let step = async {
        if provisioner.current_channel(participant).await == target {
            return Ok(MoveOutcome::Unchanged);
        }
        provisioner
            .move_participant(participant, target)
            .await
            .map(|()| MoveOutcome::Moved)
    };

    match tokio::time::timeout(timeout, step).await {
        Ok(Ok(outcome)) => {
            if outcome == MoveOutcome::Moved {
                tracing::debug!(%participant, ?target, "participant relocated");
            }
            outcome
        }
        Ok(Err(e)) => {
            tracing::warn!(%participant, ?target, error = %e, "move failed");
            MoveOutcome::Failed(e.to_string())
        }
        Err(_) => {
            tracing::warn!(%participant, ?target, ?timeout, "move timed out");
            MoveOutcome::TimedOut
        }
    }
}

/// Runs one platform query, giving up after `timeout`. `None` means the
/// query timed out.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    what: &'static str,
    query: impl Future<Output = T>,
) -> Option<T> {
    match tokio::time::timeout(timeout, query).await {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(?timeout, query = what, "platform query timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use zonewars_channels::MemoryProvisioner;

    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_relocate_moves_and_skips() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let arena = platform.add_channel("Arena");
        platform.connect(pid(1), general);
        platform.connect(pid(2), arena);

        let report = relocate(
            &platform,
            vec![
                Relocation::new(pid(1), Some(arena)),
                Relocation::new(pid(2), Some(arena)),
            ],
            TIMEOUT,
        )
        .await;

        assert_eq!(report.outcome(pid(1)), Some(&MoveOutcome::Moved));
        assert_eq!(report.outcome(pid(2)), Some(&MoveOutcome::Unchanged));
        assert_eq!(
            report.summary(),
            RelocationSummary {
                moved: 1,
                unchanged: 1,
                failed: 0
            }
        );
        assert_eq!(platform.moves().len(), 1);
    }

    #[tokio::test]
    async fn test_relocate_failure_does_not_stop_others() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let arena = platform.add_channel("Arena");
        platform.connect(pid(1), general);
        platform.connect(pid(2), general);
        platform.fail_moves(pid(1));

        let report = relocate(
            &platform,
            vec![
                Relocation::new(pid(1), Some(arena)),
                Relocation::new(pid(2), Some(arena)),
            ],
            TIMEOUT,
        )
        .await;

        assert!(matches!(report.outcome(pid(1)), Some(MoveOutcome::Failed(_))));
        assert_eq!(report.outcome(pid(2)), Some(&MoveOutcome::Moved));
        assert_eq!(report.failed(), vec![pid(1)]);
        assert_eq!(platform.location(pid(2)), Some(arena));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relocate_stalled_move_times_out() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let arena = platform.add_channel("Arena");
        platform.connect(pid(1), general);
        platform.connect(pid(2), general);
        platform.stall_moves(pid(1));

        let report = relocate(
            &platform,
            vec![
                Relocation::new(pid(1), Some(arena)),
                Relocation::new(pid(2), Some(arena)),
            ],
            TIMEOUT,
        )
        .await;

        assert_eq!(report.outcome(pid(1)), Some(&MoveOutcome::TimedOut));
        assert_eq!(report.outcome(pid(2)), Some(&MoveOutcome::Moved));
        assert_eq!(report.summary().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relocate_stalled_lookup_times_out() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        let arena = platform.add_channel("Arena");
        platform.connect(pid(1), general);
        platform.connect(pid(2), general);
        platform.stall_lookups(pid(1));

        let report = relocate(
            &platform,
            vec![
                Relocation::new(pid(1), Some(arena)),
                Relocation::new(pid(2), Some(arena)),
            ],
            TIMEOUT,
        )
        .await;

        assert_eq!(report.outcome(pid(1)), Some(&MoveOutcome::TimedOut));
        assert_eq!(report.outcome(pid(2)), Some(&MoveOutcome::Moved));
        assert_eq!(platform.location(pid(1)), Some(general));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_gives_up_on_stalled_query() {
        let platform = MemoryProvisioner::new();
        let general = platform.add_channel("General");
        platform.stall_channel_checks(true);

        let found = bounded(TIMEOUT, "channel_exists", platform.channel_exists(general)).await;
        assert_eq!(found, None);

        platform.stall_channel_checks(false);
        let found = bounded(TIMEOUT, "channel_exists", platform.channel_exists(general)).await;
        assert_eq!(found, Some(true));
    }

    #[tokio::test]
    async fn test_relocate_disconnected_participant_to_none_is_unchanged() {
        let platform = MemoryProvisioner::new();

        let report = relocate(&platform, vec![Relocation::new(pid(1), None)], TIMEOUT).await;

        assert_eq!(report.outcome(pid(1)), Some(&MoveOutcome::Unchanged));
    }

    #[test]
    fn test_report_merge_and_len() {
        let mut report = RelocationReport::default();
        report.merge(RelocationReport {
            outcomes: vec![(Relocation::new(pid(1), None), MoveOutcome::Moved)],
        });
        assert_eq!(report.len(), 1);
        assert!(report.summary().is_clean());
    }
}
