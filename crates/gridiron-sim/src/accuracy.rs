// Prediction accuracy of a candidate against realized historical points.

use std::collections::HashMap;

use gridiron_core::horizon::Horizon;
use gridiron_core::oracle::{ParameterizedOracle, RosterContext, ScoringFlags, ScoringOracle};
use gridiron_core::params::ConfigDocument;
use gridiron_core::player::{Player, PlayerId};
use gridiron_core::rankings::TeamRankings;
use gridiron_core::season::{SeasonError, SeasonSource};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LeagueSettings;
use crate::performance::AccuracyPerformance;

#[derive(Debug, Error)]
pub enum AccuracyError {
    #[error("no season produced accuracy data for horizon {horizon}")]
    NoData { horizon: Horizon },

    #[error(transparent)]
    Season(#[from] SeasonError),
}

/// Mean absolute error of one season.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonAccuracy {
    pub mae: f64,
    pub player_count: usize,
}

/// MAE over predicted/realized pairs. Pairs with non-positive realized or
/// predicted points are excluded. `None` when nothing remains.
pub fn mean_absolute_error<I>(pairs: I) -> Option<SeasonAccuracy>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (total, count) = pairs
        .into_iter()
        .filter(|(predicted, actual)| *predicted > 0.0 && *actual > 0.0)
        .fold((0.0, 0usize), |(total, count), (predicted, actual)| {
            (total + (predicted - actual).abs(), count + 1)
        });
    (count > 0).then(|| SeasonAccuracy {
        mae: total / count as f64,
        player_count: count,
    })
}

/// Evaluate `config` against every season for each of `horizons`.
///
/// Seasons without usable data are skipped with a warning; a horizon with
/// no usable season at all is left out of the result.
pub fn evaluate_candidate(
    seasons: &[SeasonSource],
    config: &ConfigDocument,
    horizons: &[Horizon],
    settings: &LeagueSettings,
) -> Vec<(Horizon, AccuracyPerformance)> {
    let oracle = ParameterizedOracle::from_document(config);
    horizons
        .iter()
        .filter_map(|horizon| match evaluate_horizon(seasons, &oracle, *horizon, settings) {
            Ok(perf) => Some((*horizon, perf)),
            Err(e) => {
                warn!("accuracy evaluation skipped: {}", e);
                None
            }
        })
        .collect()
}

/// Unweighted mean of per-season MAE for one horizon.
pub fn evaluate_horizon(
    seasons: &[SeasonSource],
    oracle: &dyn ScoringOracle,
    horizon: Horizon,
    settings: &LeagueSettings,
) -> Result<AccuracyPerformance, AccuracyError> {
    let mut per_season = Vec::new();
    for season in seasons {
        match season_accuracy(season, oracle, horizon, settings) {
            Ok(Some(result)) => {
                debug!(
                    "season {} [{}]: MAE {:.4} over {} players",
                    season.name, horizon, result.mae, result.player_count
                );
                per_season.push(result);
            }
            Ok(None) => warn!("season {} [{}]: no eligible players, skipping", season.name, horizon),
            Err(e) => warn!("season {} [{}]: {}, skipping", season.name, horizon, e),
        }
    }
    if per_season.is_empty() {
        return Err(AccuracyError::NoData { horizon });
    }
    Ok(AccuracyPerformance {
        mae: per_season.iter().map(|s| s.mae).sum::<f64>() / per_season.len() as f64,
        player_count: per_season.iter().map(|s| s.player_count).sum(),
        seasons: per_season.len(),
    })
}

/// Accuracy of one season for one horizon.
pub fn season_accuracy(
    season: &SeasonSource,
    oracle: &dyn ScoringOracle,
    horizon: Horizon,
    settings: &LeagueSettings,
) -> Result<Option<SeasonAccuracy>, SeasonError> {
    let mut rankings = season.load_rankings(settings.rankings_window)?;
    match horizon.weeks() {
        None => season_long(season, oracle, &mut rankings, settings.season_weeks),
        Some(weeks) => {
            let last = settings.season_weeks.min(*weeks.end());
            week_range(season, oracle, &mut rankings, *weeks.start(), last)
        }
    }
}

/// Season-long prediction from the week-1 snapshot against season totals.
fn season_long(
    season: &SeasonSource,
    oracle: &dyn ScoringOracle,
    rankings: &mut TeamRankings,
    season_weeks: u8,
) -> Result<Option<SeasonAccuracy>, SeasonError> {
    let players = season.load_week(1)?;
    let actuals = season.season_actuals(season_weeks)?;
    rankings.set_current_week(1);
    let rankings: &TeamRankings = rankings;

    let max_points = max_by(&players, Player::season_projection);
    let pairs = players.iter().filter_map(|player| {
        let base = player.season_projection();
        let actual = *actuals.get(&player.id)?;
        Some((predict(oracle, player, rankings, 1, base, max_points, ScoringFlags::season()), actual))
    });
    Ok(mean_absolute_error(pairs.collect::<Vec<_>>()))
}

/// Weekly predictions summed over `first..=last` against realized points
/// over the same weeks. Missing weeks are skipped.
fn week_range(
    season: &SeasonSource,
    oracle: &dyn ScoringOracle,
    rankings: &mut TeamRankings,
    first: u8,
    last: u8,
) -> Result<Option<SeasonAccuracy>, SeasonError> {
    let mut totals: HashMap<PlayerId, (f64, f64)> = HashMap::new();
    for week in first..=last {
        let data = match season.load_week_data(week) {
            Ok(data) => data,
            Err(SeasonError::MissingWeek { path }) => {
                warn!("season {}: week {} missing ({})", season.name, week, path.display());
                continue;
            }
            Err(e) => return Err(e),
        };
        rankings.set_current_week(week);

        let max_points = max_by(&data.projected, |p| p.projected_for_week(week));
        for player in data.projected.iter() {
            let base = player.projected_for_week(week);
            let predicted = predict(oracle, player, rankings, week, base, max_points, ScoringFlags::weekly());
            totals.entry(player.id).or_default().0 += predicted;
        }
        for player in data.actual.iter() {
            if let Some(entry) = totals.get_mut(&player.id) {
                entry.1 += player.actual_for_week(week);
            }
        }
    }
    Ok(mean_absolute_error(totals.into_values()))
}

fn predict(
    oracle: &dyn ScoringOracle,
    player: &Player,
    rankings: &TeamRankings,
    week: u8,
    base_points: f64,
    max_points: f64,
    flags: ScoringFlags,
) -> f64 {
    if base_points <= 0.0 || max_points <= 0.0 {
        return 0.0;
    }
    let ctx = RosterContext {
        roster: &[],
        week,
        draft_round: None,
        rankings,
        base_points,
        max_points,
    };
    let scored = oracle.score(player, &ctx, flags);
    oracle.to_points(scored.score, &ctx)
}

fn max_by(players: &[Player], points: impl Fn(&Player) -> f64) -> f64 {
    players.iter().map(points).fold(0.0, f64::max)
}
