use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use zonewars::prelude::*;
use zonewars_protocol::{Codec, JsonCodec};

const ARENA: ArenaId = ArenaId(1);

// ---------------------------------------------------------------------------
// Fake community
// ---------------------------------------------------------------------------

const PLAYERS: [(u64, &str); 6] = [
    (101, "ann"),
    (102, "bob"),
    (103, "cat"),
    (104, "dan"),
    (105, "eve"),
    (106, "fay"),
];

fn community(platform: &MemoryProvisioner) -> StaticRoster {
    let general = platform.add_channel("General");
    PLAYERS
        .iter()
        .fold(StaticRoster::new(), |roster, (id, name)| {
            platform.connect(ParticipantId(*id), general);
            roster.with_member(ARENA, Participant::new(*id, *name))
        })
}

fn ledger_config() -> LedgerConfig {
    match std::env::var_os("ZONEWARS_LEDGER") {
        Some(path) => LedgerConfig {
            path: PathBuf::from(path),
            durability: Durability::Strict,
        },
        None => LedgerConfig::default(),
    }
}

// ---------------------------------------------------------------------------
// Scripted match
// ---------------------------------------------------------------------------

async fn run<P: ChannelProvisioner, R: RosterResolver>(
    coordinator: &Coordinator<P, R>,
    codec: &JsonCodec,
) -> Result<(), ZoneWarsError> {
    let admin = ParticipantId(PLAYERS[0].0);
    let mentions = PLAYERS
        .iter()
        .map(|(id, _)| format!("<@{id}>"))
        .collect::<Vec<_>>()
        .join(", ");

    let script = [
        Command::CreateSession(CreateSessionRequest::draft(
            3,
            vec![mentions],
            vec!["<@101>".into(), "<@104>".into()],
        )),
        Command::Pause,
        Command::Resume,
        Command::End { winning_team: 0 },
        Command::Balance { participant: None },
        Command::Leaderboard { top: None },
    ];

    for command in script {
        let reply = coordinator.dispatch(ARENA, admin, command).await?;
        let text = String::from_utf8_lossy(&codec.encode(&reply)?).into_owned();
        tracing::info!(reply = %text, "command done");
    }

    Ok(())
}

async fn trade_first_pair<P: ChannelProvisioner, R: RosterResolver>(
    coordinator: &Coordinator<P, R>,
) -> Result<(), ZoneWarsError> {
    let info = coordinator.session_info(ARENA).await?;
    let [first, second] = &info.teams;
    if let (Some(a), Some(b)) = (first.members().first(), second.members().first()) {
        let outcome = coordinator.trade(ARENA, a.id, b.id).await?;
        tracing::info!(
            to_team2 = %outcome.to_team2.label,
            to_team1 = %outcome.to_team1.label,
            "traded"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ZoneWarsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let platform = Arc::new(MemoryProvisioner::new());
    let roster = community(&platform);
    let coordinator = CoordinatorBuilder::new()
        .ledger_config(ledger_config())
        .build(Arc::clone(&platform), roster)?;
    let codec = JsonCodec::pretty();

    // A second arena with no match yet; commands there are rejected.
    if let Err(e) = coordinator.pause(ArenaId(2)).await {
        tracing::info!(error = %e, "expected rejection");
    }

    run(&coordinator, &codec).await?;

    // One more round, this time with a trade mid-match.
    let mentions: Vec<String> = PLAYERS.iter().map(|(id, _)| id.to_string()).collect();
    coordinator
        .create_session(ARENA, CreateSessionRequest::random(3, mentions))
        .await?;
    trade_first_pair(&coordinator).await?;
    let outcome = coordinator.end(ARENA, 1).await?;
    tracing::info!(
        award = outcome.award,
        persisted = outcome.persisted,
        channels_left = platform.channel_count(),
        "second match settled"
    );

    Ok(())
}
