//! End-to-end tests for the coordinator command surface, using the
//! in-memory provisioner and a static roster.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use zonewars::prelude::*;
use zonewars_protocol::ChannelId;

// =========================================================================
// Helpers
// =========================================================================

const ARENA: ArenaId = ArenaId(1);

fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn roster(ids: impl IntoIterator<Item = u64>) -> StaticRoster {
    ids.into_iter().fold(StaticRoster::new(), |roster, id| {
        roster.with_member(ARENA, Participant::new(id, format!("U{id}")))
    })
}

fn tokens(ids: &[u64]) -> Vec<String> {
    ids.iter().map(|id| format!("<@{id}>")).collect()
}

struct Fixture {
    platform: Arc<MemoryProvisioner>,
    general: ChannelId,
    coordinator: Coordinator<MemoryProvisioner, StaticRoster>,
}

/// Eight members, all connected to "General".
fn fixture() -> Fixture {
    let platform = Arc::new(MemoryProvisioner::new());
    let general = platform.add_channel("General");
    for id in 1..=8 {
        platform.connect(pid(id), general);
    }
    let coordinator = CoordinatorBuilder::new()
        .ledger(Ledger::in_memory())
        .build(Arc::clone(&platform), roster(1..=8))
        .unwrap();
    Fixture {
        platform,
        general,
        coordinator,
    }
}

fn is_match_error(err: &ZoneWarsError, check: impl Fn(&MatchError) -> bool) -> bool {
    err.as_match().is_some_and(check)
}

// =========================================================================
// create_session
// =========================================================================

#[tokio::test]
async fn test_create_random_then_end_awards_points() {
    let fx = fixture();

    let started = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();

    assert_eq!(started.teams[0].len(), 2);
    assert_eq!(started.teams[1].len(), 2);
    let all: HashSet<u64> = started
        .teams
        .iter()
        .flat_map(|t| t.ids())
        .map(|p| p.0)
        .collect();
    assert_eq!(all, (1..=4).collect());
    assert_eq!(started.relocation.summary().moved, 4);

    let outcome = fx.coordinator.end(ARENA, 0).await.unwrap();

    for winner in &outcome.winners {
        assert_eq!(fx.coordinator.balance(winner.id).await.balance, 10);
    }
    for loser in &outcome.losers {
        assert_eq!(fx.coordinator.balance(loser.id).await.balance, -10);
    }
    assert!(fx.coordinator.active_arenas().await.is_empty());
    assert!((1..=4).all(|id| fx.platform.location(pid(id)) == Some(fx.general)));
    assert_eq!(fx.platform.channel_count(), 1);
}

#[tokio::test]
async fn test_create_draft_puts_captains_on_distinct_teams() {
    let fx = fixture();

    let started = fx
        .coordinator
        .create_session(
            ARENA,
            CreateSessionRequest::draft(2, tokens(&[1, 2, 3, 4]), tokens(&[1, 2])),
        )
        .await
        .unwrap();

    assert!(started.teams[0].contains(pid(1)));
    assert!(started.teams[1].contains(pid(2)));
    assert_eq!(started.teams[0].len(), 2);
}

#[tokio::test]
async fn test_create_manual_overlap_leaves_no_session() {
    let fx = fixture();

    let err = fx
        .coordinator
        .create_session(
            ARENA,
            CreateSessionRequest::manual(2, tokens(&[1, 2]), tokens(&[1, 4])),
        )
        .await
        .unwrap_err();

    assert!(is_match_error(&err, |e| matches!(e, MatchError::InvalidInput(_))));
    assert!(fx.coordinator.active_arenas().await.is_empty());
    assert_eq!(fx.platform.group_count(), 0);

    // The arena isn't left reserved.
    fx.coordinator
        .create_session(
            ARENA,
            CreateSessionRequest::manual(2, tokens(&[1, 2]), tokens(&[3, 4])),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_second_session_in_arena_rejected() {
    let fx = fixture();
    fx.coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();

    let err = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[5, 6, 7, 8])))
        .await
        .unwrap_err();

    assert!(is_match_error(&err, |e| matches!(
        e,
        MatchError::SessionAlreadyActive(a) if *a == ARENA
    )));
    assert_eq!(fx.platform.group_count(), 1);
}

#[tokio::test]
async fn test_create_team_size_out_of_range_rejected() {
    let fx = fixture();

    let err = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(1, tokens(&[1, 2])))
        .await
        .unwrap_err();

    assert!(is_match_error(&err, |e| matches!(e, MatchError::InvalidInput(_))));
}

#[tokio::test]
async fn test_create_unknown_tokens_fail_count_check() {
    let fx = fixture();
    let mut players = tokens(&[1, 2, 3]);
    players.push("<@999>".into());

    let err = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, players))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("exactly 4 players"));
}

#[tokio::test]
async fn test_create_without_players_rejected() {
    let fx = fixture();

    let err = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, Vec::new()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no players"));
}

#[tokio::test]
async fn test_create_provisioning_failure_frees_arena() {
    let fx = fixture();
    fx.platform.fail_channel_creation_after(1);

    let err = fx
        .coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap_err();

    assert!(is_match_error(&err, |e| matches!(e, MatchError::Provisioning(_))));
    assert_eq!(fx.platform.group_count(), 0);
    assert_eq!(fx.platform.channel_count(), 1);
    assert!(fx.coordinator.session_info(ARENA).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_create_cancelled_mid_activate_frees_arena_and_cleans_up() {
    let fx = fixture();
    fx.platform.stall_moves(pid(1));

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        fx.coordinator
            .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4]))),
    )
    .await;

    assert!(cancelled.is_err());
    assert!(fx.coordinator.active_arenas().await.is_empty());

    // The detached setup finishes its pass, then tears itself down.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fx.platform.group_count(), 0);
    assert_eq!(fx.platform.channel_count(), 1);
    assert!((1..=4).all(|id| fx.platform.location(pid(id)) == Some(fx.general)));
    assert_eq!(fx.coordinator.balance(pid(1)).await.balance, 0);

    fx.platform.clear_faults(pid(1));
    fx.coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();
    let outcome = fx.coordinator.end(ARENA, 0).await.unwrap();
    assert_eq!(outcome.award, 10);
    assert_eq!(fx.platform.group_count(), 0);
}

#[tokio::test]
async fn test_arenas_run_independent_sessions() {
    let platform = Arc::new(MemoryProvisioner::new());
    let other = ArenaId(2);
    let roster = (1..=4).fold(roster(1..=4), |r, id| {
        r.with_member(other, Participant::new(id + 10, format!("V{id}")))
    });
    let coordinator = CoordinatorBuilder::new()
        .ledger(Ledger::in_memory())
        .build(Arc::clone(&platform), roster)
        .unwrap();

    let (a, b) = tokio::join!(
        coordinator.create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4]))),
        coordinator.create_session(other, CreateSessionRequest::random(2, tokens(&[11, 12, 13, 14]))),
    );

    assert_ne!(a.unwrap().session, b.unwrap().session);
    assert_eq!(coordinator.active_arenas().await.len(), 2);
    assert_eq!(platform.group_count(), 2);
}

// =========================================================================
// session commands
// =========================================================================

#[tokio::test]
async fn test_commands_without_session_report_no_active_session() {
    let fx = fixture();

    let pause = fx.coordinator.pause(ARENA).await.unwrap_err();
    let end = fx.coordinator.end(ARENA, 0).await.unwrap_err();

    assert!(is_match_error(&pause, |e| matches!(e, MatchError::NoActiveSession(_))));
    assert!(is_match_error(&end, |e| matches!(e, MatchError::NoActiveSession(_))));
}

#[tokio::test]
async fn test_end_invalid_team_index_keeps_session() {
    let fx = fixture();
    fx.coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();

    let err = fx.coordinator.end(ARENA, 2).await.unwrap_err();

    assert!(is_match_error(&err, |e| matches!(e, MatchError::InvalidTeamIndex(2))));
    assert_eq!(
        fx.coordinator.session_info(ARENA).await.unwrap().state,
        SessionState::Active
    );
    assert_eq!(fx.coordinator.balance(pid(1)).await.balance, 0);
}

#[tokio::test]
async fn test_end_twice_second_reports_no_session() {
    let fx = fixture();
    fx.coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();
    fx.coordinator.end(ARENA, 1).await.unwrap();

    let err = fx.coordinator.end(ARENA, 1).await.unwrap_err();

    assert!(is_match_error(&err, |e| matches!(e, MatchError::NoActiveSession(_))));
}

#[tokio::test(start_paused = true)]
async fn test_command_arriving_during_end_reports_no_session() {
    let fx = fixture();
    fx.coordinator
        .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
        .await
        .unwrap();
    // Holds the end in its return pass until the move times out.
    fx.platform.stall_moves(pid(1));
    let coordinator = Arc::new(fx.coordinator);

    let ending = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.end(ARENA, 0).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    let paused = coordinator.pause(ARENA).await;

    let err = paused.unwrap_err();
    assert!(is_match_error(&err, |e| matches!(e, MatchError::NoActiveSession(_))));
    let outcome = ending.await.unwrap().unwrap();
    assert_eq!(outcome.returns.outcome(pid(1)), Some(&MoveOutcome::TimedOut));
    assert!(coordinator.active_arenas().await.is_empty());
}

#[tokio::test]
async fn test_pause_trade_resume_end_flow() {
    let fx = fixture();
    fx.coordinator
        .create_session(
            ARENA,
            CreateSessionRequest::manual(2, tokens(&[1, 2]), tokens(&[3, 4])),
        )
        .await
        .unwrap();

    let paused = fx.coordinator.pause(ARENA).await.unwrap();
    assert_eq!(paused.summary().moved, 4);
    fx.coordinator.trade(ARENA, pid(1), pid(3)).await.unwrap();
    fx.coordinator.resume(ARENA).await.unwrap();

    let info = fx.coordinator.session_info(ARENA).await.unwrap();
    assert_eq!(fx.platform.location(pid(1)), Some(info.channels.teams[1]));
    assert_eq!(fx.platform.location(pid(3)), Some(info.channels.teams[0]));

    let outcome = fx.coordinator.end(ARENA, 0).await.unwrap();
    let winners: HashSet<u64> = outcome.winners.iter().map(|p| p.id.0).collect();
    assert_eq!(winners, HashSet::from([3, 2]));
}

#[tokio::test]
async fn test_trade_wrong_sides_rejected() {
    let fx = fixture();
    fx.coordinator
        .create_session(
            ARENA,
            CreateSessionRequest::manual(2, tokens(&[1, 2]), tokens(&[3, 4])),
        )
        .await
        .unwrap();

    let err = fx.coordinator.trade(ARENA, pid(1), pid(2)).await.unwrap_err();

    assert!(is_match_error(&err, |e| matches!(
        e,
        MatchError::NotOnExpectedTeam { team: TeamIndex::Second, .. }
    )));
}

// =========================================================================
// ledger commands and dispatch
// =========================================================================

#[tokio::test]
async fn test_leaderboard_defaults_to_ten() {
    let fx = fixture();
    {
        let mut ledger = fx.coordinator.ledger().lock().await;
        for id in 1..=12 {
            ledger.adjust(pid(id), id as i64);
        }
    }

    let board = fx.coordinator.leaderboard(None).await;

    assert_eq!(board.len(), 10);
    assert_eq!(board[0].participant, pid(12));
    assert_eq!(fx.coordinator.leaderboard(Some(3)).await.len(), 3);
}

#[tokio::test]
async fn test_dispatch_json_commands() {
    let fx = fixture();
    let invoker = pid(1);

    let create: Command = serde_json::from_str(
        r#"{"command":"CreateSession","mode":"manual","team_size":2,"team1":["1","2"],"team2":["<@3>","<@!4>"]}"#,
    )
    .unwrap();
    let reply = fx.coordinator.dispatch(ARENA, invoker, create).await.unwrap();
    assert!(matches!(reply, Reply::SessionCreated { ref teams, .. } if teams[0].len() == 2));

    let end: Command = serde_json::from_str(r#"{"command":"End","winning_team":1}"#).unwrap();
    let reply = fx.coordinator.dispatch(ARENA, invoker, end).await.unwrap();
    assert!(matches!(reply, Reply::Ended { winning_team: 1, award: 10, .. }));

    let balance = fx
        .coordinator
        .dispatch(ARENA, invoker, Command::Balance { participant: None })
        .await
        .unwrap();
    match balance {
        Reply::Balance(entry) => {
            assert_eq!(entry.participant, invoker);
            assert_eq!(entry.balance, -10);
        }
        other => panic!("unexpected reply {other:?}"),
    }

    let board = fx
        .coordinator
        .dispatch(ARENA, invoker, Command::Leaderboard { top: Some(2) })
        .await
        .unwrap();
    match board {
        Reply::Leaderboard { entries } => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].balance, 10);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_file_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig {
        path: dir.path().join("bsn_data.json"),
        ..LedgerConfig::default()
    };

    {
        let platform = Arc::new(MemoryProvisioner::new());
        let coordinator = CoordinatorBuilder::new()
            .ledger_config(config.clone())
            .build(platform, roster(1..=4))
            .unwrap();
        coordinator
            .create_session(ARENA, CreateSessionRequest::random(2, tokens(&[1, 2, 3, 4])))
            .await
            .unwrap();
        coordinator.end(ARENA, 0).await.unwrap();
    }

    let coordinator = CoordinatorBuilder::new()
        .ledger_config(config)
        .build(Arc::new(MemoryProvisioner::new()), StaticRoster::new())
        .unwrap();
    let total: i64 = total_balance(&coordinator).await;
    assert_eq!(total, 0);
    assert_eq!(coordinator.leaderboard(None).await.len(), 4);
}

async fn total_balance(coordinator: &Coordinator<MemoryProvisioner, StaticRoster>) -> i64 {
    let mut total = 0;
    for id in 1..=4 {
        total += coordinator.balance(pid(id)).await.balance;
    }
    total
}
