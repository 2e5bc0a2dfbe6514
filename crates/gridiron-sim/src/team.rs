// Simulated fantasy teams: draft strategies, player views, and lineups.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use gridiron_core::lineup::select_lineup;
use gridiron_core::oracle::{RosterContext, ScoringFlags, ScoringOracle};
use gridiron_core::player::{Player, PlayerId};
use gridiron_core::rankings::TeamRankings;
use gridiron_core::season::{load_players_dir, SeasonError, WeekData};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LeagueSettings;
use crate::draft::{DraftError, DraftLedger};

/// ADP assumed for players without one.
const UNRANKED_ADP: f64 = 999.0;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// How a team drafts and sets lineups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The subject team: ranks with the scoring oracle and always takes its
    /// top choice.
    DraftHelper,
    /// Lowest ADP first.
    AdpAggressive,
    /// Highest season projection first.
    ProjectedPointsAggressive,
    /// Lowest ADP first, plus the configured per-round position bonus.
    AdpWithDraftOrder,
    /// Highest season projection first, plus the per-round position bonus.
    ProjectedPointsWithDraftOrder,
}

impl Strategy {
    pub fn is_subject(&self) -> bool {
        matches!(self, Strategy::DraftHelper)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::DraftHelper => "draft_helper",
            Strategy::AdpAggressive => "adp_aggressive",
            Strategy::ProjectedPointsAggressive => "projected_points_aggressive",
            Strategy::AdpWithDraftOrder => "adp_with_draft_order",
            Strategy::ProjectedPointsWithDraftOrder => "projected_points_with_draft_order",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PlayerPool
// ---------------------------------------------------------------------------

/// One team's private view of the player pool.
#[derive(Debug, Clone)]
pub struct PlayerPool {
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
    week: u8,
}

impl PlayerPool {
    pub fn new(players: Vec<Player>) -> Self {
        let index = players.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        Self {
            players,
            index,
            week: 1,
        }
    }

    /// Load a fresh in-memory copy from a materialized data directory.
    pub fn load(dir: &Path) -> Result<Self, SeasonError> {
        Ok(Self::new(load_players_dir(dir)?))
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|&i| &self.players[i])
    }

    pub fn week(&self) -> u8 {
        self.week
    }

    /// Replace records with those in `snapshot` and move to `week`. Players
    /// missing from the snapshot keep their previous record.
    pub fn refresh(&mut self, week: u8, snapshot: &[Player]) {
        for player in snapshot {
            match self.index.get(&player.id) {
                Some(&i) => self.players[i] = player.clone(),
                None => {
                    self.index.insert(player.id, self.players.len());
                    self.players.push(player.clone());
                }
            }
        }
        self.week = week;
    }

    pub fn max_season_projection(&self) -> f64 {
        self.players
            .iter()
            .map(Player::season_projection)
            .fold(0.0, f64::max)
    }

    pub fn max_week_projection(&self, week: u8) -> f64 {
        self.players
            .iter()
            .map(|p| p.projected_for_week(week))
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// Read-only state a team needs to make a draft pick.
pub struct PickContext<'a> {
    pub ledger: &'a DraftLedger,
    /// Zero-based round.
    pub round: usize,
    pub rankings: &'a TeamRankings,
    pub settings: &'a LeagueSettings,
}

/// A league participant with its own projected and actual player views.
pub struct Team {
    pub index: usize,
    pub strategy: Strategy,
    projected: PlayerPool,
    actual: PlayerPool,
    roster: Vec<PlayerId>,
    oracle: Arc<dyn ScoringOracle>,
}

impl Team {
    pub fn new(
        index: usize,
        strategy: Strategy,
        projected: PlayerPool,
        actual: PlayerPool,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        Self {
            index,
            strategy,
            projected,
            actual,
            roster: Vec::new(),
            oracle,
        }
    }

    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    /// Rostered players as seen through the projected view.
    pub fn roster_players(&self) -> Vec<Player> {
        self.roster
            .iter()
            .filter_map(|id| self.projected.get(*id).cloned())
            .collect()
    }

    pub fn add_to_roster(&mut self, player_id: PlayerId) {
        self.roster.push(player_id);
    }

    fn has_room_for(&self, player: &Player, settings: &LeagueSettings) -> bool {
        let held = self
            .roster
            .iter()
            .filter_map(|id| self.projected.get(*id))
            .filter(|p| p.position == player.position)
            .count();
        held < settings.roster_limit(player.position)
    }

    /// Undrafted players this team still has room for, ranked best-first by
    /// strategy. Ties keep pool order.
    fn ranked_candidates(&self, ctx: &PickContext<'_>) -> Vec<&Player> {
        let roster = self.roster_players();
        let max_points = self.projected.max_season_projection();
        let mut scored: Vec<(&Player, f64)> = self
            .projected
            .players()
            .iter()
            .filter(|p| !ctx.ledger.is_drafted(p.id) && self.has_room_for(p, ctx.settings))
            .map(|p| {
                let adp = p.average_draft_position.unwrap_or(UNRANKED_ADP);
                let bonus = || self.oracle.draft_order_bonus(p.position, ctx.round);
                let key = match self.strategy {
                    Strategy::DraftHelper => {
                        let rc = RosterContext {
                            roster: &roster,
                            week: 1,
                            draft_round: Some(ctx.round),
                            rankings: ctx.rankings,
                            base_points: p.season_projection(),
                            max_points,
                        };
                        self.oracle.score(p, &rc, ScoringFlags::draft()).score
                    }
                    Strategy::AdpAggressive => -adp,
                    Strategy::ProjectedPointsAggressive => p.season_projection(),
                    Strategy::AdpWithDraftOrder => -adp + bonus(),
                    Strategy::ProjectedPointsWithDraftOrder => p.season_projection() + bonus(),
                };
                (p, key)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().map(|(p, _)| p).collect()
    }

    /// Choose a player. Opponents occasionally pick at random from their top
    /// candidates; the subject team always takes its first choice.
    pub fn select_pick<R: Rng>(&self, ctx: &PickContext<'_>, rng: &mut R) -> Result<PlayerId, DraftError> {
        let ranked = self.ranked_candidates(ctx);
        let Some(best) = ranked.first() else {
            return Err(DraftError::NoEligiblePlayer {
                team: self.index,
                round: ctx.round,
            });
        };
        if !self.strategy.is_subject() && rng.gen_bool(ctx.settings.human_error_rate) {
            let pool = ranked.len().min(ctx.settings.human_error_pool);
            return Ok(ranked[rng.gen_range(0..pool)].id);
        }
        Ok(best.id)
    }

    /// Move both views to a new week.
    pub fn refresh_week(&mut self, data: &WeekData) {
        self.projected.refresh(data.week, &data.projected);
        self.actual.refresh(data.week, &data.actual);
    }

    /// Starting lineup for the current week. The subject team ranks by the
    /// oracle's weekly score; opponents by raw weekly projection.
    pub fn select_lineup(&self, rankings: &TeamRankings) -> Vec<PlayerId> {
        let week = self.projected.week();
        let roster = self.roster_players();
        if self.strategy.is_subject() {
            let max_points = self.projected.max_week_projection(week);
            select_lineup(&roster, |p| {
                let rc = RosterContext {
                    roster: &roster,
                    week,
                    draft_round: None,
                    rankings,
                    base_points: p.projected_for_week(week),
                    max_points,
                };
                self.oracle.score(p, &rc, ScoringFlags::weekly()).score
            })
        } else {
            select_lineup(&roster, |p| p.projected_for_week(week))
        }
    }

    /// Realized points for `lineup` in the current week, from the actual view.
    pub fn lineup_points(&self, lineup: &[PlayerId]) -> f64 {
        let week = self.actual.week();
        lineup
            .iter()
            .filter_map(|id| self.actual.get(*id))
            .map(|p| p.actual_for_week(week))
            .sum()
    }
}
