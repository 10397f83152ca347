//! Team assignment: turning a resolved roster into two teams.
//!
//! [`assign`] is a pure function over its inputs and an RNG, so tests can
//! pin the outcome with a seeded generator. [`assign_teams`] is the same
//! thing with the thread-local RNG.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use zonewars_protocol::{AssignMode, Participant};

use crate::{MatchError, Team, check_teams};

/// The inputs of one team assignment, by mode.
#[derive(Debug, Clone)]
pub enum Assignment {
    /// Shuffle `roster` and split it down the middle.
    Random { roster: Vec<Participant> },
    /// `captains[0]` anchors team 1, `captains[1]` team 2, the rest of
    /// `roster` is dealt out at random.
    Draft {
        roster: Vec<Participant>,
        captains: Vec<Participant>,
    },
    /// Both teams given explicitly.
    Manual {
        team1: Vec<Participant>,
        team2: Vec<Participant>,
    },
}

impl Assignment {
    pub fn mode(&self) -> AssignMode {
        match self {
            Self::Random { .. } => AssignMode::Random,
            Self::Draft { .. } => AssignMode::Draft,
            Self::Manual { .. } => AssignMode::Manual,
        }
    }
}

/// Assigns teams using the thread-local RNG.
pub fn assign_teams(assignment: Assignment, team_size: usize) -> Result<[Team; 2], MatchError> {
    assign(assignment, team_size, &mut rand::rng())
}

/// Produces two teams of exactly `team_size` participants each.
///
/// # Errors
/// [`MatchError::InvalidInput`] when:
/// - `team_size` is 0
/// - random/draft: the roster isn't exactly `2 * team_size` distinct
///   participants
/// - draft: there aren't exactly two distinct captains, or a captain isn't
///   on the roster
/// - manual: a team has the wrong size, repeats a player, or the teams
///   overlap
pub fn assign<R: Rng + ?Sized>(
    assignment: Assignment,
    team_size: usize,
    rng: &mut R,
) -> Result<[Team; 2], MatchError> {
    if team_size == 0 {
        return Err(MatchError::InvalidInput("team size must be positive".into()));
    }

    let mode = assignment.mode();
    let teams = match assignment {
        Assignment::Random { roster } => random_split(roster, team_size, rng)?,
        Assignment::Draft { roster, captains } => draft(roster, captains, team_size, rng)?,
        Assignment::Manual { team1, team2 } => [Team::new(team1), Team::new(team2)],
    };

    check_teams(&teams, team_size)?;
    tracing::debug!(%mode, team_size, "teams assigned");
    Ok(teams)
}

fn check_roster(roster: &[Participant], team_size: usize) -> Result<(), MatchError> {
    let expected = team_size * 2;
    if roster.len() != expected {
        return Err(MatchError::InvalidInput(format!(
            "exactly {expected} players are required for a {team_size}v{team_size} match, got {}",
            roster.len()
        )));
    }
    let mut seen = HashSet::with_capacity(roster.len());
    if !roster.iter().all(|p| seen.insert(p.id)) {
        return Err(MatchError::InvalidInput(
            "the player list names someone more than once".into(),
        ));
    }
    Ok(())
}

fn random_split<R: Rng + ?Sized>(
    mut roster: Vec<Participant>,
    team_size: usize,
    rng: &mut R,
) -> Result<[Team; 2], MatchError> {
    check_roster(&roster, team_size)?;
    roster.shuffle(rng);
    let second = roster.split_off(team_size);
    Ok([Team::new(roster), Team::new(second)])
}

fn draft<R: Rng + ?Sized>(
    roster: Vec<Participant>,
    captains: Vec<Participant>,
    team_size: usize,
    rng: &mut R,
) -> Result<[Team; 2], MatchError> {
    check_roster(&roster, team_size)?;

    let [first_captain, second_captain]: [Participant; 2] = captains
        .try_into()
        .map_err(|_| MatchError::InvalidInput("exactly two captains must be specified".into()))?;
    if first_captain == second_captain {
        return Err(MatchError::InvalidInput(
            "the two captains must be different players".into(),
        ));
    }
    if !roster.contains(&first_captain) || !roster.contains(&second_captain) {
        return Err(MatchError::InvalidInput(
            "captains must be among the listed players".into(),
        ));
    }

    let mut pool: Vec<Participant> = roster
        .into_iter()
        .filter(|p| *p != first_captain && *p != second_captain)
        .collect();
    pool.shuffle(rng);

    let mut first = Team::new(vec![first_captain]);
    let mut second = Team::new(vec![second_captain]);

    // Deal one pick at a time, alternating.
    loop {
        let mut dealt = false;
        for team in [&mut first, &mut second] {
            if team.len() < team_size {
                if let Some(pick) = pool.pop() {
                    team.push(pick);
                    dealt = true;
                }
            }
        }
        if !dealt {
            break;
        }
    }

    // Unreachable with a validated roster; keeps the size invariant if the
    // pool ever runs out unevenly.
    for pick in pool {
        if first.len() < team_size {
            first.push(pick);
        } else if second.len() < team_size {
            second.push(pick);
        }
    }

    Ok([first, second])
}
