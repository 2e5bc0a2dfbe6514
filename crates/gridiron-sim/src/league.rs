// One simulated league: shared data directory, snake draft, and season.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use gridiron_core::oracle::ScoringOracle;
use gridiron_core::rankings::TeamRankings;
use gridiron_core::season::{SeasonError, SeasonSource, WeekData, TEAM_DATA_FILE};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LeagueSettings;
use crate::draft::{snake_order, DraftError, DraftLedger};
use crate::schedule::{Schedule, ScheduleError};
use crate::team::{PickContext, PlayerPool, Strategy, Team};
use crate::week::{simulate_week, WeekResults};

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("failed to create shared data directory: {0}")]
    SharedDir(#[source] std::io::Error),

    #[error(transparent)]
    Season(#[from] SeasonError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("league has no draft_helper team")]
    NoSubject,

    #[error("season {season} has no playable weeks")]
    NoWeeks { season: String },
}

/// The subject team's result for one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectWeek {
    pub week: u8,
    pub won: bool,
    pub points: f64,
}

/// Season totals for one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub team: usize,
    pub strategy: Strategy,
    pub wins: u32,
    pub losses: u32,
    pub points: f64,
}

/// A league built for a single trial.
///
/// Player and team data are copied once into a temporary directory that
/// every team reads from; the directory is removed by `cleanup()` or on drop.
pub struct SimulatedLeague {
    settings: LeagueSettings,
    season_name: String,
    shared_dir: Option<TempDir>,
    teams: Vec<Team>,
    subject: usize,
    draft_order: Vec<usize>,
    schedule: Schedule,
    ledger: DraftLedger,
    rankings: TeamRankings,
    week_cache: Vec<Option<WeekData>>,
    results: Vec<WeekResults>,
    rng: ChaCha8Rng,
}

impl SimulatedLeague {
    /// Build a league over `season`. Strategies and draft order are shuffled
    /// from `seed`.
    pub fn new(
        season: &SeasonSource,
        oracle: Arc<dyn ScoringOracle>,
        settings: &LeagueSettings,
        seed: u64,
    ) -> Result<Self, LeagueError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let shared_dir = tempfile::Builder::new()
            .prefix("sim_league_")
            .tempdir()
            .map_err(LeagueError::SharedDir)?;
        season.materialize_into(shared_dir.path())?;

        let mut strategies = settings.strategy_pool();
        strategies.shuffle(&mut rng);
        let subject = strategies
            .iter()
            .position(Strategy::is_subject)
            .ok_or(LeagueError::NoSubject)?;

        let mut teams = Vec::with_capacity(strategies.len());
        for (index, strategy) in strategies.into_iter().enumerate() {
            let projected = PlayerPool::load(shared_dir.path())?;
            let actual = PlayerPool::load(shared_dir.path())?;
            teams.push(Team::new(index, strategy, projected, actual, Arc::clone(&oracle)));
        }

        let rankings = load_rankings(shared_dir.path(), settings.rankings_window)?;
        let week_cache = preload_weeks(season, settings.season_weeks)?;

        let mut draft_order: Vec<usize> = (0..teams.len()).collect();
        draft_order.shuffle(&mut rng);

        let schedule = Schedule::round_robin(teams.len(), settings.season_weeks)?;

        debug!(
            "league built for season {} in {} (subject team {})",
            season.name,
            shared_dir.path().display(),
            subject
        );

        Ok(Self {
            settings: settings.clone(),
            season_name: season.name.clone(),
            shared_dir: Some(shared_dir),
            teams,
            subject,
            draft_order,
            schedule,
            ledger: DraftLedger::new(),
            rankings,
            week_cache,
            results: Vec::new(),
            rng,
        })
    }

    /// Snake draft over the configured number of rounds. Every team drafts
    /// with its current period pinned to week 1.
    pub fn run_draft(&mut self) -> Result<(), LeagueError> {
        self.rankings.set_current_week(1);
        for (round, team_idx) in snake_order(&self.draft_order, self.settings.draft_rounds) {
            let player_id = {
                let ctx = PickContext {
                    ledger: &self.ledger,
                    round,
                    rankings: &self.rankings,
                    settings: &self.settings,
                };
                self.teams[team_idx].select_pick(&ctx, &mut self.rng)?
            };
            self.ledger.record(round, team_idx, player_id)?;
            self.teams[team_idx].add_to_roster(player_id);
        }
        debug!("draft complete: {} picks", self.ledger.len());
        Ok(())
    }

    /// Play every week in order. Weeks without data are skipped.
    pub fn run_season(&mut self) -> Result<(), LeagueError> {
        for week in 1..=self.settings.season_weeks {
            let Some(data) = self.week_cache[usize::from(week) - 1].as_ref() else {
                continue;
            };
            self.rankings.set_current_week(week);
            for team in &mut self.teams {
                team.refresh_week(data);
            }
            let points: Vec<f64> = self
                .teams
                .iter()
                .map(|team| {
                    let lineup = team.select_lineup(&self.rankings);
                    team.lineup_points(&lineup)
                })
                .collect();
            self.results.push(simulate_week(
                week,
                self.schedule.week(week),
                &points,
                self.settings.tie_break,
            ));
        }
        if self.results.is_empty() {
            return Err(LeagueError::NoWeeks {
                season: self.season_name.clone(),
            });
        }
        Ok(())
    }

    /// Per-week results for the subject team, in week order.
    pub fn subject_results(&self) -> Vec<SubjectWeek> {
        self.results
            .iter()
            .filter_map(|r| {
                r.outcome(self.subject).map(|o| SubjectWeek {
                    week: r.week,
                    won: o.won,
                    points: o.points_scored,
                })
            })
            .collect()
    }

    /// Season totals for every team, in team order.
    pub fn standings(&self) -> Vec<Standing> {
        self.teams
            .iter()
            .map(|team| {
                let mut standing = Standing {
                    team: team.index,
                    strategy: team.strategy,
                    wins: 0,
                    losses: 0,
                    points: 0.0,
                };
                for outcome in self.results.iter().filter_map(|r| r.outcome(team.index)) {
                    if outcome.won {
                        standing.wins += 1;
                    } else {
                        standing.losses += 1;
                    }
                    standing.points += outcome.points_scored;
                }
                standing
            })
            .collect()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn subject(&self) -> usize {
        self.subject
    }

    pub fn ledger(&self) -> &DraftLedger {
        &self.ledger
    }

    pub fn draft_order(&self) -> &[usize] {
        &self.draft_order
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Shared data directory, until cleanup.
    pub fn shared_dir(&self) -> Option<&Path> {
        self.shared_dir.as_ref().map(TempDir::path)
    }

    /// Remove the shared data directory. Safe to call more than once.
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.shared_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for SimulatedLeague {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn load_rankings(dir: &Path, window: u8) -> Result<TeamRankings, SeasonError> {
    let path = dir.join(TEAM_DATA_FILE);
    if !path.is_file() {
        return Ok(TeamRankings::empty());
    }
    let file = File::open(&path).map_err(|e| SeasonError::Io {
        path: path.clone(),
        source: e,
    })?;
    TeamRankings::from_reader(file, window).map_err(|e| SeasonError::TeamData { path, source: e })
}

/// Load every week's snapshots up front. Missing weeks are skipped with a
/// warning; any other read failure aborts.
fn preload_weeks(season: &SeasonSource, weeks: u8) -> Result<Vec<Option<WeekData>>, LeagueError> {
    let mut cache = Vec::with_capacity(usize::from(weeks));
    for week in 1..=weeks {
        match season.load_week_data(week) {
            Ok(data) => cache.push(Some(data)),
            Err(SeasonError::MissingWeek { path }) => {
                warn!("season {}: skipping week {} ({} missing)", season.name, week, path.display());
                cache.push(None);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if cache.iter().all(Option::is_none) {
        return Err(LeagueError::NoWeeks {
            season: season.name.clone(),
        });
    }
    Ok(cache)
}
