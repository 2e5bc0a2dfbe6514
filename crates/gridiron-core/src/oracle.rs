// Player scoring: the oracle interface and a parameter-driven implementation.
//
// A score starts from a normalized projection, is scaled by tiered
// multipliers (ADP, player rating, team quality, recent performance), then
// adjusted additively (matchup, draft-order bonus, bye-week overlap).

use std::collections::HashMap;

use serde_json::Value;

use crate::params::ConfigDocument;
use crate::player::{Player, Position};
use crate::rankings::TeamRankings;

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Which scoring components apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringFlags {
    pub adp: bool,
    pub player_rating: bool,
    pub team_quality: bool,
    pub performance: bool,
    pub matchup: bool,
    pub draft_order: bool,
    pub bye_penalty: bool,
}

impl ScoringFlags {
    /// Draft-time ranking: everything except weekly matchup.
    pub fn draft() -> Self {
        Self {
            adp: true,
            player_rating: true,
            team_quality: true,
            performance: false,
            matchup: false,
            draft_order: true,
            bye_penalty: true,
        }
    }

    /// Weekly lineup ranking: form and matchup matter, draft signals do not.
    pub fn weekly() -> Self {
        Self {
            adp: false,
            player_rating: true,
            team_quality: true,
            performance: true,
            matchup: true,
            draft_order: false,
            bye_penalty: false,
        }
    }

    /// Season-long point prediction with no roster context.
    pub fn season() -> Self {
        Self {
            adp: true,
            player_rating: true,
            team_quality: true,
            performance: false,
            matchup: false,
            draft_order: false,
            bye_penalty: false,
        }
    }
}

/// Everything the oracle may consult besides the player itself.
#[derive(Debug, Clone, Copy)]
pub struct RosterContext<'a> {
    /// Players already on the requesting team.
    pub roster: &'a [Player],
    /// Current period (1-based).
    pub week: u8,
    /// Zero-based draft round while drafting.
    pub draft_round: Option<usize>,
    pub rankings: &'a TeamRankings,
    /// Projection the score starts from (season-long or weekly).
    pub base_points: f64,
    /// Largest projection in the pool, used for normalization.
    pub max_points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Produces a comparable score for a player under one configuration.
pub trait ScoringOracle: Send + Sync {
    fn score(&self, player: &Player, ctx: &RosterContext<'_>, flags: ScoringFlags) -> Scored;

    /// Bonus for taking `position` in zero-based `round`.
    fn draft_order_bonus(&self, _position: Position, _round: usize) -> f64 {
        0.0
    }

    /// Convert a score back into fantasy points for the given context.
    fn to_points(&self, score: f64, _ctx: &RosterContext<'_>) -> f64 {
        score
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Excellent,
    Good,
    Neutral,
    Poor,
    VeryPoor,
}

impl Tier {
    fn multiplier(self) -> f64 {
        match self {
            Tier::Excellent => 1.2,
            Tier::Good => 1.1,
            Tier::Neutral => 1.0,
            Tier::Poor => 0.9,
            Tier::VeryPoor => 0.8,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Tier::Excellent => "excellent",
            Tier::Good => "good",
            Tier::Neutral => "neutral",
            Tier::Poor => "poor",
            Tier::VeryPoor => "very poor",
        }
    }

    /// Lower values are better: `<= step` excellent, `<= 2*step` good, ...
    fn decreasing(value: f64, step: f64) -> Tier {
        let step = step.max(f64::MIN_POSITIVE);
        match (value / step).ceil() as i64 {
            i64::MIN..=1 => Tier::Excellent,
            2 => Tier::Good,
            3 => Tier::Neutral,
            4 => Tier::Poor,
            _ => Tier::VeryPoor,
        }
    }

    /// Higher values are better: `>= 4*step` excellent, `>= 3*step` good, ...
    fn increasing(value: f64, step: f64) -> Tier {
        let step = step.max(f64::MIN_POSITIVE);
        match (value / step).floor() as i64 {
            4..=i64::MAX => Tier::Excellent,
            3 => Tier::Good,
            2 => Tier::Neutral,
            1 => Tier::Poor,
            _ => Tier::VeryPoor,
        }
    }

    /// Symmetric around zero: `>= 2*step` excellent ... `< -2*step` very poor.
    fn centered(value: f64, step: f64) -> Tier {
        if value >= 2.0 * step {
            Tier::Excellent
        } else if value >= step {
            Tier::Good
        } else if value > -step {
            Tier::Neutral
        } else if value > -2.0 * step {
            Tier::Poor
        } else {
            Tier::VeryPoor
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterizedOracle
// ---------------------------------------------------------------------------

const PLAYER_RATING_STEP: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftPriority {
    Primary,
    Secondary,
}

/// Scoring oracle driven by a [`ConfigDocument`].
///
/// Missing sections fall back to neutral defaults, so a partial document
/// still scores every player.
#[derive(Debug, Clone)]
pub struct ParameterizedOracle {
    normalization_max_scale: f64,
    adp_weight: f64,
    adp_steps: f64,
    rating_weight: f64,
    team_quality_weight: f64,
    team_quality_min_weeks: u8,
    performance_weight: f64,
    performance_steps: f64,
    performance_min_weeks: usize,
    matchup_impact_scale: f64,
    matchup_weight: f64,
    matchup_min_weeks: u8,
    same_pos_bye_weight: f64,
    diff_pos_bye_weight: f64,
    primary_bonus: f64,
    secondary_bonus: f64,
    draft_order: Vec<HashMap<Position, DraftPriority>>,
}

impl ParameterizedOracle {
    pub fn from_document(doc: &ConfigDocument) -> Self {
        Self {
            normalization_max_scale: doc.number_or("NORMALIZATION_MAX_SCALE", None, 100.0),
            adp_weight: doc.number_or("ADP_SCORING", Some("WEIGHT"), 1.0),
            adp_steps: doc.number_or("ADP_SCORING", Some("STEPS"), 20.0),
            rating_weight: doc.number_or("PLAYER_RATING_SCORING", Some("WEIGHT"), 1.0),
            team_quality_weight: doc.number_or("TEAM_QUALITY_SCORING", Some("WEIGHT"), 1.0),
            team_quality_min_weeks: doc.number_or("TEAM_QUALITY_SCORING", Some("MIN_WEEKS"), 3.0)
                as u8,
            performance_weight: doc.number_or("PERFORMANCE_SCORING", Some("WEIGHT"), 1.0),
            performance_steps: doc.number_or("PERFORMANCE_SCORING", Some("STEPS"), 0.1),
            performance_min_weeks: doc.number_or("PERFORMANCE_SCORING", Some("MIN_WEEKS"), 3.0)
                as usize,
            matchup_impact_scale: doc.number_or("MATCHUP_SCORING", Some("IMPACT_SCALE"), 100.0),
            matchup_weight: doc.number_or("MATCHUP_SCORING", Some("WEIGHT"), 1.0),
            matchup_min_weeks: doc.number_or("MATCHUP_SCORING", Some("MIN_WEEKS"), 3.0) as u8,
            same_pos_bye_weight: doc.number_or("SAME_POS_BYE_WEIGHT", None, 0.0),
            diff_pos_bye_weight: doc.number_or("DIFF_POS_BYE_WEIGHT", None, 0.0),
            primary_bonus: doc.number_or("DRAFT_ORDER_BONUSES", Some("PRIMARY"), 0.0),
            secondary_bonus: doc.number_or("DRAFT_ORDER_BONUSES", Some("SECONDARY"), 0.0),
            draft_order: parse_draft_order(doc.section("DRAFT_ORDER")),
        }
    }

    fn normalized(&self, ctx: &RosterContext<'_>) -> f64 {
        if ctx.max_points <= 0.0 {
            return 0.0;
        }
        ctx.base_points / ctx.max_points * self.normalization_max_scale
    }

    fn team_quality_tier(&self, player: &Player, rankings: &TeamRankings) -> Option<Tier> {
        if rankings.weeks_of_data() < self.team_quality_min_weeks || rankings.team_count() == 0 {
            return None;
        }
        let rank = if player.position == Position::Defense {
            rankings.defensive_rank(&player.team)?
        } else {
            rankings.offensive_rank(&player.team)?
        };
        let step = (rankings.team_count() as f64 / 5.0).ceil();
        Some(Tier::decreasing(f64::from(rank), step))
    }

    fn performance_tier(&self, player: &Player, week: u8) -> Option<Tier> {
        let deviations: Vec<f64> = (1..week)
            .filter_map(|w| {
                let projected = player.projected_for_week(w);
                let actual = player.actual_for_week(w);
                (projected > 0.0 && actual > 0.0).then(|| (actual - projected) / projected)
            })
            .collect();
        if deviations.is_empty() || deviations.len() < self.performance_min_weeks {
            return None;
        }
        let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
        Some(Tier::centered(mean, self.performance_steps))
    }

    /// Signed matchup strength in [-1, 1]; positive means a weak opponent.
    fn matchup_factor(&self, player: &Player, ctx: &RosterContext<'_>) -> Option<f64> {
        let rankings = ctx.rankings;
        if rankings.weeks_of_data() < self.matchup_min_weeks {
            return None;
        }
        let opponent = player.opponent_for_week(ctx.week)?;
        let rank = if player.position == Position::Defense {
            rankings.offensive_rank(opponent)?
        } else {
            rankings.defensive_rank(opponent)?
        };
        let n = rankings.team_count() as f64;
        if n < 2.0 {
            return None;
        }
        let mid = (n + 1.0) / 2.0;
        Some((f64::from(rank) - mid) / (mid - 1.0))
    }

    fn bye_overlaps(&self, player: &Player, roster: &[Player]) -> (usize, usize) {
        let Some(bye) = player.bye_week else {
            return (0, 0);
        };
        roster
            .iter()
            .filter(|p| p.id != player.id && p.bye_week == Some(bye))
            .fold((0, 0), |(same, diff), p| {
                if p.position == player.position {
                    (same + 1, diff)
                } else {
                    (same, diff + 1)
                }
            })
    }
}

impl ScoringOracle for ParameterizedOracle {
    fn score(&self, player: &Player, ctx: &RosterContext<'_>, flags: ScoringFlags) -> Scored {
        let base = self.normalized(ctx);
        let mut reasons = vec![format!("projection: {base:.1}")];
        let mut multiplier = 1.0;

        if flags.adp {
            if let Some(adp) = player.average_draft_position {
                let tier = Tier::decreasing(adp, self.adp_steps);
                multiplier *= tier.multiplier().powf(self.adp_weight);
                reasons.push(format!("ADP {adp:.1}: {}", tier.label()));
            }
        }

        if flags.player_rating {
            if let Some(rating) = player.player_rating {
                let tier = Tier::increasing(rating, PLAYER_RATING_STEP);
                multiplier *= tier.multiplier().powf(self.rating_weight);
                reasons.push(format!("rating {rating:.0}: {}", tier.label()));
            }
        }

        if flags.team_quality {
            if let Some(tier) = self.team_quality_tier(player, ctx.rankings) {
                multiplier *= tier.multiplier().powf(self.team_quality_weight);
                reasons.push(format!("team quality: {}", tier.label()));
            }
        }

        if flags.performance {
            if let Some(tier) = self.performance_tier(player, ctx.week) {
                multiplier *= tier.multiplier().powf(self.performance_weight);
                reasons.push(format!("recent performance: {}", tier.label()));
            }
        }

        let mut score = base * multiplier;

        if flags.matchup {
            if let Some(factor) = self.matchup_factor(player, ctx) {
                let impact = factor
                    * self.matchup_weight
                    * self.matchup_impact_scale
                    * self.normalization_max_scale
                    / 1000.0;
                score += impact;
                reasons.push(format!("matchup: {impact:+.1}"));
            }
        }

        if flags.draft_order {
            if let Some(round) = ctx.draft_round {
                let bonus = self.draft_order_bonus(player.position, round);
                if bonus != 0.0 {
                    score += bonus;
                    reasons.push(format!("draft order bonus: {bonus:+.0}"));
                }
            }
        }

        if flags.bye_penalty {
            let (same, diff) = self.bye_overlaps(player, ctx.roster);
            let penalty = base
                * (same as f64 * self.same_pos_bye_weight + diff as f64 * self.diff_pos_bye_weight);
            if penalty > 0.0 {
                score -= penalty;
                reasons.push(format!("bye overlap: -{penalty:.1}"));
            }
        }

        Scored { score, reasons }
    }

    fn draft_order_bonus(&self, position: Position, round: usize) -> f64 {
        match self.draft_order.get(round).and_then(|r| r.get(&position)) {
            Some(DraftPriority::Primary) => self.primary_bonus,
            Some(DraftPriority::Secondary) => self.secondary_bonus,
            None => 0.0,
        }
    }

    fn to_points(&self, score: f64, ctx: &RosterContext<'_>) -> f64 {
        if self.normalization_max_scale <= 0.0 {
            return 0.0;
        }
        score * ctx.max_points / self.normalization_max_scale
    }
}

/// `DRAFT_ORDER` is a list of per-round objects mapping a position to
/// `"P"` (primary) or `"S"` (secondary).
fn parse_draft_order(section: Option<&Value>) -> Vec<HashMap<Position, DraftPriority>> {
    let Some(rounds) = section.and_then(Value::as_array) else {
        return Vec::new();
    };
    rounds
        .iter()
        .map(|round| {
            round
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(pos, prio)| {
                            let pos = Position::from_str_pos(pos)?;
                            let prio = match prio.as_str()? {
                                "P" => DraftPriority::Primary,
                                "S" => DraftPriority::Secondary,
                                _ => return None,
                            };
                            Some((pos, prio))
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(parameters: Value) -> ConfigDocument {
        serde_json::from_value(json!({ "config_name": "t", "parameters": parameters })).unwrap()
    }

    fn player(id: u64, position: Position) -> Player {
        Player {
            id,
            name: format!("P{id}"),
            position,
            team: "KC".into(),
            bye_week: Some(6),
            average_draft_position: None,
            player_rating: None,
            fantasy_points: Some(200.0),
            projected_points: vec![10.0; 17],
            actual_points: vec![0.0; 17],
            opponents: Vec::new(),
        }
    }

    fn ctx<'a>(roster: &'a [Player], rankings: &'a TeamRankings) -> RosterContext<'a> {
        RosterContext {
            roster,
            week: 1,
            draft_round: Some(0),
            rankings,
            base_points: 200.0,
            max_points: 400.0,
        }
    }

    #[test]
    fn empty_document_scores_normalized_projection() {
        let oracle = ParameterizedOracle::from_document(&ConfigDocument::default());
        let rankings = TeamRankings::empty();
        let scored = oracle.score(&player(1, Position::RunningBack), &ctx(&[], &rankings), ScoringFlags::draft());
        assert!((scored.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn better_adp_scores_higher() {
        let oracle = ParameterizedOracle::from_document(&doc(json!({
            "ADP_SCORING": {"WEIGHT": 2.0, "STEPS": 10}
        })));
        let rankings = TeamRankings::empty();
        let mut early = player(1, Position::WideReceiver);
        early.average_draft_position = Some(3.0);
        let mut late = player(2, Position::WideReceiver);
        late.average_draft_position = Some(120.0);
        let c = ctx(&[], &rankings);
        let a = oracle.score(&early, &c, ScoringFlags::draft()).score;
        let b = oracle.score(&late, &c, ScoringFlags::draft()).score;
        assert!(a > b);
        assert!((a - 50.0 * 1.2f64.powi(2)).abs() < 1e-9);
    }

    #[test]
    fn draft_order_bonus_applies_by_round() {
        let oracle = ParameterizedOracle::from_document(&doc(json!({
            "DRAFT_ORDER_BONUSES": {"PRIMARY": 80, "SECONDARY": 30},
            "DRAFT_ORDER": [{"RB": "P", "WR": "S"}, {"QB": "P"}]
        })));
        assert_eq!(oracle.draft_order_bonus(Position::RunningBack, 0), 80.0);
        assert_eq!(oracle.draft_order_bonus(Position::WideReceiver, 0), 30.0);
        assert_eq!(oracle.draft_order_bonus(Position::Quarterback, 0), 0.0);
        assert_eq!(oracle.draft_order_bonus(Position::Quarterback, 1), 80.0);
        assert_eq!(oracle.draft_order_bonus(Position::Quarterback, 9), 0.0);
    }

    #[test]
    fn bye_overlap_penalizes_same_position_more() {
        let oracle = ParameterizedOracle::from_document(&doc(json!({
            "SAME_POS_BYE_WEIGHT": 0.2,
            "DIFF_POS_BYE_WEIGHT": 0.1
        })));
        let rankings = TeamRankings::empty();
        let candidate = player(1, Position::RunningBack);
        let same = vec![player(2, Position::RunningBack)];
        let diff = vec![player(3, Position::Quarterback)];
        let s_same = oracle.score(&candidate, &ctx(&same, &rankings), ScoringFlags::draft()).score;
        let s_diff = oracle.score(&candidate, &ctx(&diff, &rankings), ScoringFlags::draft()).score;
        assert!((s_same - 40.0).abs() < 1e-9);
        assert!((s_diff - 45.0).abs() < 1e-9);
    }

    #[test]
    fn performance_requires_min_weeks_of_history() {
        let oracle = ParameterizedOracle::from_document(&doc(json!({
            "PERFORMANCE_SCORING": {"WEIGHT": 1.0, "STEPS": 0.1, "MIN_WEEKS": 2}
        })));
        let rankings = TeamRankings::empty();
        let mut hot = player(1, Position::WideReceiver);
        hot.actual_points[0] = 20.0;
        hot.actual_points[1] = 20.0;
        let mut c = ctx(&[], &rankings);

        c.week = 2;
        let one_week = oracle.score(&hot, &c, ScoringFlags::weekly()).score;
        assert!((one_week - 50.0).abs() < 1e-9);

        c.week = 3;
        let two_weeks = oracle.score(&hot, &c, ScoringFlags::weekly()).score;
        assert!((two_weeks - 60.0).abs() < 1e-9);
    }

    #[test]
    fn to_points_inverts_normalization() {
        let oracle = ParameterizedOracle::from_document(&doc(json!({"NORMALIZATION_MAX_SCALE": 150})));
        let rankings = TeamRankings::empty();
        let c = ctx(&[], &rankings);
        let scored = oracle.score(&player(1, Position::Kicker), &c, ScoringFlags::season());
        assert!((oracle.to_points(scored.score, &c) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn tiers_partition_by_step() {
        assert_eq!(Tier::decreasing(5.0, 10.0), Tier::Excellent);
        assert_eq!(Tier::decreasing(15.0, 10.0), Tier::Good);
        assert_eq!(Tier::decreasing(45.0, 10.0), Tier::VeryPoor);
        assert_eq!(Tier::increasing(85.0, 20.0), Tier::Excellent);
        assert_eq!(Tier::increasing(10.0, 20.0), Tier::VeryPoor);
        assert_eq!(Tier::centered(0.0, 0.1), Tier::Neutral);
        assert_eq!(Tier::centered(-0.25, 0.1), Tier::VeryPoor);
    }
}
