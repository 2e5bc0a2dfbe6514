// Win-rate trials: one seeded league per (candidate, season, trial).

use std::sync::Arc;

use gridiron_core::horizon::Horizon;
use gridiron_core::oracle::{ParameterizedOracle, ScoringOracle};
use gridiron_core::params::ConfigDocument;
use gridiron_core::season::SeasonSource;
use tracing::debug;

use crate::config::LeagueSettings;
use crate::league::{LeagueError, SimulatedLeague, SubjectWeek};

/// Identifies one trial within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialKey {
    pub candidate: usize,
    pub season: usize,
    pub trial: usize,
}

impl TrialKey {
    /// Seed for this trial's league, stable for a given run seed.
    pub fn seed(&self, run_seed: u64) -> u64 {
        mix_seed(
            run_seed,
            &[self.candidate as u64, self.season as u64, self.trial as u64],
        )
    }
}

/// Fold `parts` into `base` with splitmix64 steps.
pub fn mix_seed(base: u64, parts: &[u64]) -> u64 {
    parts.iter().fold(splitmix64(base), |acc, part| splitmix64(acc ^ splitmix64(*part)))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Play one full league with `config` driving the subject team and return
/// the subject's weekly results. The league's temporary directory is removed
/// before returning, whether or not the trial succeeded.
pub fn run_trial(
    season: &SeasonSource,
    config: &ConfigDocument,
    settings: &LeagueSettings,
    seed: u64,
) -> Result<Vec<SubjectWeek>, LeagueError> {
    let oracle: Arc<dyn ScoringOracle> = Arc::new(ParameterizedOracle::from_document(config));
    let mut league = SimulatedLeague::new(season, oracle, settings, seed)?;
    let outcome = league.run_draft().and_then(|()| league.run_season());
    let results = league.subject_results();
    league.cleanup();
    outcome?;

    debug!(
        "trial on {} (seed {}): {} of {} weeks won",
        season.name,
        seed,
        results.iter().filter(|w| w.won).count(),
        results.len()
    );
    Ok(results)
}

/// Weeks of a trial that count toward `horizon`.
pub fn weeks_in(results: &[SubjectWeek], horizon: Horizon) -> Vec<SubjectWeek> {
    results
        .iter()
        .filter(|w| horizon.contains_week(w.week))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(week: u8, won: bool) -> SubjectWeek {
        SubjectWeek {
            week,
            won,
            points: 100.0,
        }
    }

    #[test]
    fn trial_seeds_differ_per_component() {
        let base = TrialKey { candidate: 1, season: 0, trial: 0 };
        let seeds = [
            base.seed(42),
            TrialKey { candidate: 2, ..base }.seed(42),
            TrialKey { season: 1, ..base }.seed(42),
            TrialKey { trial: 1, ..base }.seed(42),
            base.seed(43),
        ];
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(base.seed(42), base.seed(42));
    }

    #[test]
    fn mix_seed_is_order_sensitive() {
        assert_ne!(mix_seed(0, &[1, 2]), mix_seed(0, &[2, 1]));
    }

    #[test]
    fn weeks_in_filters_by_horizon() {
        let results: Vec<SubjectWeek> = (1..=17).map(|w| week(w, w % 2 == 0)).collect();
        assert_eq!(weeks_in(&results, Horizon::RestOfSeason).len(), 17);
        assert_eq!(weeks_in(&results, Horizon::Weeks1To5).len(), 5);
        let late = weeks_in(&results, Horizon::Weeks14To17);
        assert_eq!(late.first().map(|w| w.week), Some(14));
        assert_eq!(late.len(), 4);
    }
}
