//! Teams and team indices.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use zonewars_protocol::{Participant, ParticipantId};

use crate::MatchError;

// ---------------------------------------------------------------------------
// TeamIndex
// ---------------------------------------------------------------------------

/// Which of the two teams. Converting from a raw `usize` is the single
/// place a bad winning-team index gets rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamIndex {
    First,
    Second,
}

impl TeamIndex {
    /// Both teams, in order.
    pub const BOTH: [TeamIndex; 2] = [TeamIndex::First, TeamIndex::Second];

    /// 0 for the first team, 1 for the second.
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// The opposing team.
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl TryFrom<usize> for TeamIndex {
    type Error = MatchError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::First),
            1 => Ok(Self::Second),
            other => Err(MatchError::InvalidTeamIndex(other)),
        }
    }
}

impl fmt::Display for TeamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team {}", self.index() + 1)
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// An ordered list of participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    members: Vec<Participant>,
}

impl Team {
    pub fn new(members: Vec<Participant>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Participant] {
        &self.members
    }

    pub fn ids(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.members.iter().map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.position(participant).is_some()
    }

    /// Slot of `participant` within the team.
    pub fn position(&self, participant: ParticipantId) -> Option<usize> {
        self.members.iter().position(|p| p.id == participant)
    }

    /// Puts `participant` into slot `index`, returning whoever was there.
    pub(crate) fn replace(&mut self, index: usize, participant: Participant) -> Participant {
        std::mem::replace(&mut self.members[index], participant)
    }

    pub(crate) fn push(&mut self, participant: Participant) {
        self.members.push(participant);
    }

    /// `true` if no participant appears twice in this team.
    pub fn has_unique_members(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.members.len());
        self.members.iter().all(|p| seen.insert(p.id))
    }

    /// `true` if the two teams share no participant.
    pub fn is_disjoint_from(&self, other: &Team) -> bool {
        let mine: HashSet<ParticipantId> = self.ids().collect();
        other.ids().all(|id| !mine.contains(&id))
    }

    pub fn into_members(self) -> Vec<Participant> {
        self.members
    }
}

impl From<Vec<Participant>> for Team {
    fn from(members: Vec<Participant>) -> Self {
        Self::new(members)
    }
}

/// Checks the two-team invariants: both teams have exactly `team_size`
/// members, nobody appears twice within a team, and nobody is on both.
pub fn check_teams(teams: &[Team; 2], team_size: usize) -> Result<(), MatchError> {
    for (index, team) in TeamIndex::BOTH.iter().zip(teams) {
        if team.len() != team_size {
            return Err(MatchError::InvalidInput(format!(
                "each team must have exactly {team_size} players, {index} has {}",
                team.len()
            )));
        }
        if !team.has_unique_members() {
            return Err(MatchError::InvalidInput(format!(
                "{index} lists a player more than once"
            )));
        }
    }
    if !teams[0].is_disjoint_from(&teams[1]) {
        return Err(MatchError::InvalidInput(
            "a player cannot be on both teams".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(ids: &[u64]) -> Team {
        Team::new(ids.iter().map(|id| Participant::new(*id, format!("p{id}"))).collect())
    }

    #[test]
    fn test_team_index_try_from() {
        assert_eq!(TeamIndex::try_from(0).unwrap(), TeamIndex::First);
        assert_eq!(TeamIndex::try_from(1).unwrap(), TeamIndex::Second);
        assert!(matches!(
            TeamIndex::try_from(2),
            Err(MatchError::InvalidTeamIndex(2))
        ));
    }

    #[test]
    fn test_team_index_other_and_display() {
        assert_eq!(TeamIndex::First.other(), TeamIndex::Second);
        assert_eq!(TeamIndex::Second.to_string(), "Team 2");
    }

    #[test]
    fn test_team_position_and_replace() {
        let mut t = team(&[1, 2, 3]);
        assert_eq!(t.position(ParticipantId(2)), Some(1));

        let old = t.replace(1, Participant::new(9, "p9"));

        assert_eq!(old.id, ParticipantId(2));
        assert!(t.contains(ParticipantId(9)));
        assert!(!t.contains(ParticipantId(2)));
    }

    #[test]
    fn test_check_teams_accepts_valid_pair() {
        assert!(check_teams(&[team(&[1, 2]), team(&[3, 4])], 2).is_ok());
    }

    #[test]
    fn test_check_teams_rejects_overlap() {
        let result = check_teams(&[team(&[1, 2]), team(&[1, 4])], 2);
        assert!(matches!(result, Err(MatchError::InvalidInput(msg)) if msg.contains("both teams")));
    }

    #[test]
    fn test_check_teams_rejects_wrong_size() {
        assert!(check_teams(&[team(&[1, 2, 5]), team(&[3, 4])], 2).is_err());
    }

    #[test]
    fn test_check_teams_rejects_duplicate_within_team() {
        assert!(check_teams(&[team(&[1, 1]), team(&[3, 4])], 2).is_err());
    }
}
