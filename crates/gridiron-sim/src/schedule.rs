// Round-robin season schedule generation.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("a schedule needs at least 2 teams, got {count}")]
    TooFewTeams { count: usize },

    #[error("a schedule needs at least 1 week")]
    NoWeeks,
}

/// Weekly matchups as pairs of team indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    weeks: Vec<Vec<(usize, usize)>>,
}

impl Schedule {
    /// Circle-method round robin for `num_teams` over `num_weeks`.
    ///
    /// Team 0 stays fixed while the others rotate one place per round. Once a
    /// full round robin is exhausted it repeats with home and away swapped,
    /// so every pair meets either floor(W / (N-1)) or ceil(W / (N-1)) times.
    /// With an odd team count one team sits out each week.
    pub fn round_robin(num_teams: usize, num_weeks: u8) -> Result<Self, ScheduleError> {
        if num_teams < 2 {
            return Err(ScheduleError::TooFewTeams { count: num_teams });
        }
        if num_weeks == 0 {
            return Err(ScheduleError::NoWeeks);
        }

        // Odd counts get a phantom team; pairing with it is a bye.
        let slots = num_teams + num_teams % 2;
        let bye = (slots != num_teams).then_some(num_teams);
        let rounds_per_cycle = slots - 1;

        let mut rotating: Vec<usize> = (1..slots).collect();
        let mut rounds = Vec::with_capacity(rounds_per_cycle);
        for _ in 0..rounds_per_cycle {
            let mut pairs = Vec::with_capacity(slots / 2);
            pairs.push((0, rotating[0]));
            for i in 1..slots / 2 {
                pairs.push((rotating[i], rotating[rounds_per_cycle - i]));
            }
            rounds.push(pairs);
            rotating.rotate_right(1);
        }

        let weeks = (0..usize::from(num_weeks))
            .map(|w| {
                let swap = (w / rounds_per_cycle) % 2 == 1;
                rounds[w % rounds_per_cycle]
                    .iter()
                    .filter(|(a, b)| Some(*a) != bye && Some(*b) != bye)
                    .map(|&(a, b)| if swap { (b, a) } else { (a, b) })
                    .collect()
            })
            .collect();

        Ok(Self { weeks })
    }

    pub fn num_weeks(&self) -> usize {
        self.weeks.len()
    }

    /// Matchups for a 1-based week; empty when out of range.
    pub fn week(&self, week: u8) -> &[(usize, usize)] {
        usize::from(week)
            .checked_sub(1)
            .and_then(|i| self.weeks.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn weeks(&self) -> &[Vec<(usize, usize)>] {
        &self.weeks
    }

    /// The team `team` plays in a 1-based week, if any.
    pub fn opponent(&self, week: u8, team: usize) -> Option<usize> {
        self.week(week).iter().find_map(|&(a, b)| {
            if a == team {
                Some(b)
            } else if b == team {
                Some(a)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pair_counts(schedule: &Schedule) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::new();
        for week in schedule.weeks() {
            for &(a, b) in week {
                *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        counts
    }

    fn assert_valid(schedule: &Schedule, num_teams: usize) {
        for (w, week) in schedule.weeks().iter().enumerate() {
            let mut seen = vec![false; num_teams];
            for &(a, b) in week {
                assert_ne!(a, b, "self-play in week {}", w + 1);
                assert!(!seen[a] && !seen[b], "team twice in week {}", w + 1);
                seen[a] = true;
                seen[b] = true;
            }
        }
        let counts = pair_counts(schedule);
        let max = counts.values().max().copied().unwrap_or(0);
        let all_pairs = num_teams * (num_teams - 1) / 2;
        let min = if counts.len() < all_pairs {
            0
        } else {
            counts.values().min().copied().unwrap_or(0)
        };
        assert!(max - min <= 1, "pair meeting counts spread {min}..{max}");
    }

    #[test]
    fn ten_teams_seventeen_weeks() {
        let schedule = Schedule::round_robin(10, 17).unwrap();
        assert_eq!(schedule.num_weeks(), 17);
        for week in schedule.weeks() {
            assert_eq!(week.len(), 5);
        }
        let mut games = vec![0; 10];
        for week in schedule.weeks() {
            for &(a, b) in week {
                games[a] += 1;
                games[b] += 1;
            }
        }
        assert!(games.iter().all(|&g| g == 17));
        assert_valid(&schedule, 10);
    }

    #[test]
    fn every_pair_meets_once_per_cycle() {
        let schedule = Schedule::round_robin(10, 18).unwrap();
        assert!(pair_counts(&schedule).values().all(|&c| c == 2));
    }

    #[test]
    fn second_cycle_swaps_home_and_away() {
        let schedule = Schedule::round_robin(4, 6).unwrap();
        for (x, y) in schedule.week(1).iter().zip(schedule.week(4)) {
            assert_eq!((x.0, x.1), (y.1, y.0));
        }
    }

    #[test]
    fn valid_across_sizes_and_lengths() {
        for teams in 2..=14 {
            for weeks in [1u8, 5, 13, 17, 30] {
                let schedule = Schedule::round_robin(teams, weeks).unwrap();
                assert_valid(&schedule, teams);
            }
        }
    }

    #[test]
    fn odd_team_count_gives_one_bye_per_week() {
        let schedule = Schedule::round_robin(7, 7).unwrap();
        for week in schedule.weeks() {
            assert_eq!(week.len(), 3);
        }
        assert_valid(&schedule, 7);
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            Schedule::round_robin(10, 17).unwrap(),
            Schedule::round_robin(10, 17).unwrap()
        );
    }

    #[test]
    fn opponent_lookup() {
        let schedule = Schedule::round_robin(4, 3).unwrap();
        for week in 1..=3 {
            for team in 0..4 {
                let opp = schedule.opponent(week, team).unwrap();
                assert_eq!(schedule.opponent(week, opp), Some(team));
            }
        }
        assert_eq!(schedule.opponent(9, 0), None);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert_eq!(
            Schedule::round_robin(1, 17),
            Err(ScheduleError::TooFewTeams { count: 1 })
        );
        assert_eq!(Schedule::round_robin(10, 0), Err(ScheduleError::NoWeeks));
    }
}
