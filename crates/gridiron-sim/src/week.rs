// Resolution of one week's head-to-head matchups.

use serde::{Deserialize, Serialize};

/// How an exact points tie is resolved.
///
/// Only `HomeTeam` guarantees exactly one winner per matchup; `BothLose`
/// records a tied game as a loss for each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Neither team is credited with a win.
    #[default]
    BothLose,
    /// The first-listed team of the pair wins.
    HomeTeam,
}

/// One team's result for one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekOutcome {
    pub won: bool,
    pub points_scored: f64,
    pub points_against: f64,
}

/// Outcomes for every team in one week, indexed by team. Teams without a
/// matchup (a bye) have `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekResults {
    pub week: u8,
    pub outcomes: Vec<Option<WeekOutcome>>,
}

impl WeekResults {
    pub fn outcome(&self, team: usize) -> Option<&WeekOutcome> {
        self.outcomes.get(team).and_then(Option::as_ref)
    }
}

/// Resolve `matchups` given each team's starting-lineup points.
///
/// `points` must have an entry for every team index that appears in
/// `matchups`. The higher total wins; exact ties follow `tie_break`.
pub fn simulate_week(
    week: u8,
    matchups: &[(usize, usize)],
    points: &[f64],
    tie_break: TieBreak,
) -> WeekResults {
    let mut outcomes = vec![None; points.len()];
    for &(a, b) in matchups {
        let (pa, pb) = (points[a], points[b]);
        let (a_won, b_won) = if pa > pb {
            (true, false)
        } else if pb > pa {
            (false, true)
        } else {
            match tie_break {
                TieBreak::BothLose => (false, false),
                TieBreak::HomeTeam => (true, false),
            }
        };
        outcomes[a] = Some(WeekOutcome {
            won: a_won,
            points_scored: pa,
            points_against: pb,
        });
        outcomes[b] = Some(WeekOutcome {
            won: b_won,
            points_scored: pb,
            points_against: pa,
        });
    }
    WeekResults { week, outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_score_wins() {
        let results = simulate_week(3, &[(0, 1), (2, 3)], &[100.0, 90.0, 80.0, 120.5], TieBreak::BothLose);
        assert_eq!(results.week, 3);
        assert!(results.outcome(0).unwrap().won);
        assert!(!results.outcome(1).unwrap().won);
        assert!(!results.outcome(2).unwrap().won);
        assert!(results.outcome(3).unwrap().won);
        assert_eq!(results.outcome(1).unwrap().points_against, 100.0);
    }

    #[test]
    fn exactly_one_winner_per_untied_matchup() {
        let points = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let matchups = [(0, 5), (1, 4), (2, 3)];
        let results = simulate_week(1, &matchups, &points, TieBreak::BothLose);
        for (a, b) in matchups {
            let wins = [a, b].iter().filter(|t| results.outcome(**t).unwrap().won).count();
            assert_eq!(wins, 1);
        }
    }

    #[test]
    fn tie_both_lose() {
        let results = simulate_week(1, &[(0, 1)], &[75.0, 75.0], TieBreak::BothLose);
        assert!(!results.outcome(0).unwrap().won);
        assert!(!results.outcome(1).unwrap().won);
    }

    #[test]
    fn tie_home_team_wins() {
        let results = simulate_week(1, &[(1, 0)], &[75.0, 75.0], TieBreak::HomeTeam);
        assert!(results.outcome(1).unwrap().won);
        assert!(!results.outcome(0).unwrap().won);
    }

    #[test]
    fn bye_team_has_no_outcome() {
        let results = simulate_week(1, &[(0, 1)], &[1.0, 2.0, 3.0], TieBreak::BothLose);
        assert!(results.outcome(2).is_none());
    }
}
