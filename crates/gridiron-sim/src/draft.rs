// Snake draft order and the league-wide draft ledger.

use std::collections::HashSet;

use gridiron_core::player::PlayerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("player {player_id} was already drafted")]
    AlreadyDrafted { player_id: PlayerId },

    #[error("team {team} found no eligible player in round {round}")]
    NoEligiblePlayer { team: usize, round: usize },
}

/// A single completed pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    /// 1-based overall pick number.
    pub pick_number: usize,
    /// Zero-based round.
    pub round: usize,
    pub team: usize,
    pub player_id: PlayerId,
}

/// Authoritative record of drafted players for one league.
///
/// Teams consult the ledger when choosing; recording the same player twice
/// is rejected.
#[derive(Debug, Clone, Default)]
pub struct DraftLedger {
    drafted: HashSet<PlayerId>,
    picks: Vec<DraftPick>,
}

impl DraftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drafted(&self, player_id: PlayerId) -> bool {
        self.drafted.contains(&player_id)
    }

    pub fn record(&mut self, round: usize, team: usize, player_id: PlayerId) -> Result<&DraftPick, DraftError> {
        if !self.drafted.insert(player_id) {
            return Err(DraftError::AlreadyDrafted { player_id });
        }
        self.picks.push(DraftPick {
            pick_number: self.picks.len() + 1,
            round,
            team,
            player_id,
        });
        Ok(&self.picks[self.picks.len() - 1])
    }

    pub fn picks(&self) -> &[DraftPick] {
        &self.picks
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

/// Pick order for a snake draft: `order` forward in even rounds, reversed in
/// odd rounds. Yields `(round, team)`.
pub fn snake_order(order: &[usize], rounds: usize) -> Vec<(usize, usize)> {
    (0..rounds)
        .flat_map(|round| {
            let teams: Vec<usize> = if round % 2 == 0 {
                order.to_vec()
            } else {
                order.iter().rev().copied().collect()
            };
            teams.into_iter().map(move |team| (round, team))
        })
        .collect()
}
