// Integration tests for the simulator and optimizer.
//
// These tests build synthetic historical seasons on disk and drive the
// public API end-to-end: league construction, draft, season, accuracy
// evaluation, checkpointing, resume, and full optimization runs.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridiron_core::horizon::Horizon;
use gridiron_core::oracle::{ParameterizedOracle, ScoringOracle};
use gridiron_core::params::{param_spec, ConfigDocument, HorizonBaselines, PARAM_SPECS};
use gridiron_core::player::{Player, Position};
use gridiron_core::season::{discover_seasons, SeasonSource, TEAM_DATA_FILE};
use gridiron_sim::accuracy::{evaluate_horizon, season_accuracy};
use gridiron_sim::candidates::ConfigGenerator;
use gridiron_sim::checkpoint::{scan_checkpoint_folders, CheckpointStore, ResumeState, RESULTS_FILE};
use gridiron_sim::config::{Config, LeagueSettings, Mode, RunConfig};
use gridiron_sim::league::{SimulatedLeague, SubjectWeek};
use gridiron_sim::optimizer::{OptimizationManager, RunOutcome};
use gridiron_sim::performance::ConfigPerformance;
use gridiron_sim::pool::CancelFlag;
use gridiron_sim::results::ResultsManager;
use gridiron_sim::schedule::Schedule;
use gridiron_sim::trial::run_trial;
use serde_json::json;
use tempfile::TempDir;

// ===========================================================================
// Test helpers
// ===========================================================================

const NFL_TEAMS: [&str; 8] = ["BUF", "KC", "PHI", "SF", "DAL", "MIA", "DET", "BAL"];
const SEASON_WEEKS: u8 = 17;

/// Players per position and their week-1 projection ceiling.
const POSITION_POOL: [(Position, u64, f64); 6] = [
    (Position::Quarterback, 24, 22.0),
    (Position::RunningBack, 60, 16.0),
    (Position::WideReceiver, 60, 15.0),
    (Position::TightEnd, 24, 10.0),
    (Position::Kicker, 16, 8.0),
    (Position::Defense, 16, 8.0),
];

/// Deterministic realized points for a player-week.
fn realized(id: u64, week: u8, projected: f64) -> f64 {
    let swing = ((id * 7 + u64::from(week) * 13) % 9) as f64 * 0.1;
    (projected * (0.6 + swing) * 10.0).round() / 10.0
}

/// Full player list for a snapshot taken at `snapshot_week`: realized points
/// are filled for earlier weeks only.
fn snapshot(snapshot_week: u8) -> Vec<Player> {
    let mut players = Vec::new();
    let mut adp = 1.0;
    for (pos_idx, (position, count, ceiling)) in POSITION_POOL.iter().enumerate() {
        for i in 0..*count {
            let id = (pos_idx as u64 + 1) * 1000 + i;
            let weekly = ceiling - (i as f64) * ceiling * 0.6 / (*count as f64);
            let projected: Vec<f64> = (1..=SEASON_WEEKS).map(|_| weekly).collect();
            let actual: Vec<f64> = (1..=SEASON_WEEKS)
                .map(|w| if w < snapshot_week { realized(id, w, weekly) } else { 0.0 })
                .collect();
            let team = NFL_TEAMS[(i as usize) % NFL_TEAMS.len()];
            players.push(Player {
                id,
                name: format!("{} {}", position, i + 1),
                position: *position,
                team: team.to_string(),
                bye_week: Some(5 + (i % 8) as u8),
                average_draft_position: Some(adp + (pos_idx as f64) * 0.5),
                player_rating: Some(100.0 - (i as f64) * 100.0 / (*count as f64)),
                fantasy_points: Some(weekly * f64::from(SEASON_WEEKS)),
                projected_points: projected,
                actual_points: actual,
                opponents: (0..SEASON_WEEKS)
                    .map(|w| NFL_TEAMS[(i as usize + usize::from(w) + 1) % NFL_TEAMS.len()].to_string())
                    .collect(),
            });
            adp += 1.0;
        }
    }
    players
}

/// Write one season folder with weeks 1..=18 and team data.
fn write_season(data_dir: &Path, year: &str) -> PathBuf {
    let season_dir = data_dir.join(year);
    for week in 1..=SEASON_WEEKS + 1 {
        let week_dir = season_dir.join("weeks").join(format!("week_{week:02}"));
        std::fs::create_dir_all(&week_dir).unwrap();
        let players = snapshot(week);
        for position in Position::ALL {
            let batch: Vec<&Player> = players.iter().filter(|p| p.position == position).collect();
            std::fs::write(
                week_dir.join(position.data_file()),
                serde_json::to_string(&batch).unwrap(),
            )
            .unwrap();
        }
    }

    let mut writer = csv::Writer::from_path(season_dir.join(TEAM_DATA_FILE)).unwrap();
    writer
        .write_record(["team", "week", "points_scored", "points_allowed"])
        .unwrap();
    for (t, team) in NFL_TEAMS.iter().enumerate() {
        for week in 1..=SEASON_WEEKS {
            let scored = 17.0 + ((t * 5 + usize::from(week) * 3) % 17) as f64;
            let allowed = 14.0 + ((t * 3 + usize::from(week) * 7) % 19) as f64;
            writer
                .write_record([
                    team.to_string(),
                    week.to_string(),
                    scored.to_string(),
                    allowed.to_string(),
                ])
                .unwrap();
        }
    }
    writer.flush().unwrap();
    season_dir
}

/// A baseline with every tunable parameter at its range midpoint.
fn baseline_doc() -> ConfigDocument {
    let mut doc = ConfigDocument {
        config_name: "test baseline".to_string(),
        ..ConfigDocument::default()
    };
    for spec in PARAM_SPECS {
        doc.set(spec, spec.quantize((spec.min + spec.max) / 2.0));
    }
    doc.parameters.insert(
        "DRAFT_ORDER".to_string(),
        json!([{"RB": "P", "WR": "S"}, {"WR": "P", "RB": "S"}, {"QB": "P"}]),
    );
    doc
}

/// Temporary workspace with data, baseline, and output directories.
struct Workspace {
    _root: TempDir,
    data_dir: PathBuf,
    baseline_dir: PathBuf,
    output_dir: PathBuf,
}

impl Workspace {
    fn new(years: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("historical");
        for year in years {
            write_season(&data_dir, year);
        }
        let baseline_dir = root.path().join("baseline");
        HorizonBaselines::uniform(baseline_doc())
            .save(&baseline_dir, None)
            .unwrap();
        let output_dir = root.path().join("output");
        Self {
            data_dir,
            baseline_dir,
            output_dir,
            _root: root,
        }
    }

    fn season(&self, year: &str) -> SeasonSource {
        SeasonSource::new(self.data_dir.join(year))
    }

    fn config(&self, mode: Mode, order: &[&str]) -> Config {
        Config {
            run: RunConfig {
                mode,
                tournament: false,
                target_horizon: Horizon::RestOfSeason,
                baseline_dir: self.baseline_dir.clone(),
                data_dir: self.data_dir.clone(),
                output_dir: self.output_dir.clone(),
                parameter_order: order.iter().map(|s| s.to_string()).collect(),
                num_test_values: 2,
                trials_per_candidate: 1,
                workers: 2,
                seed: 42,
                min_season_players: 150,
            },
            league: LeagueSettings::default(),
            candidate_values: BTreeMap::new(),
        }
    }
}

fn oracle() -> Arc<dyn ScoringOracle> {
    Arc::new(ParameterizedOracle::from_document(&baseline_doc()))
}

// ===========================================================================
// Season data
// ===========================================================================

#[test]
fn synthetic_season_is_discovered() {
    let ws = Workspace::new(&["2022", "2021"]);
    std::fs::create_dir_all(ws.data_dir.join("notes")).unwrap();
    let seasons = discover_seasons(&ws.data_dir, 150).unwrap();
    let names: Vec<&str> = seasons.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["2021", "2022"]);
}

// ===========================================================================
// League simulation
// ===========================================================================

#[test]
fn draft_has_no_duplicate_picks_and_full_rosters() {
    let ws = Workspace::new(&["2021"]);
    let settings = LeagueSettings::default();
    let mut league = SimulatedLeague::new(&ws.season("2021"), oracle(), &settings, 7).unwrap();
    league.run_draft().unwrap();

    let picks = league.ledger().picks();
    assert_eq!(picks.len(), settings.num_teams * settings.draft_rounds);
    let unique: HashSet<u64> = picks.iter().map(|p| p.player_id).collect();
    assert_eq!(unique.len(), picks.len());

    for team in league.teams() {
        assert_eq!(team.roster().len(), settings.draft_rounds);
        let players = team.roster_players();
        for position in Position::ALL {
            let held = players.iter().filter(|p| p.position == position).count();
            assert!(held <= settings.roster_limit(position));
        }
    }
}

#[test]
fn season_plays_every_week_for_every_team() {
    let ws = Workspace::new(&["2021"]);
    let settings = LeagueSettings::default();
    let mut league = SimulatedLeague::new(&ws.season("2021"), oracle(), &settings, 11).unwrap();
    league.run_draft().unwrap();
    league.run_season().unwrap();

    let subject = league.subject_results();
    assert_eq!(subject.len(), usize::from(SEASON_WEEKS));
    let weeks: Vec<u8> = subject.iter().map(|w| w.week).collect();
    assert_eq!(weeks, (1..=SEASON_WEEKS).collect::<Vec<_>>());
    assert!(subject.iter().all(|w| w.points > 0.0));

    for standing in league.standings() {
        assert_eq!(standing.wins + standing.losses, u32::from(SEASON_WEEKS));
    }
    assert_eq!(league.standings()[league.subject()].strategy.label(), "draft_helper");
}

#[test]
fn same_seed_reproduces_the_league() {
    let ws = Workspace::new(&["2021"]);
    let settings = LeagueSettings::default();
    let season = ws.season("2021");
    let a = run_trial(&season, &baseline_doc(), &settings, 99).unwrap();
    let b = run_trial(&season, &baseline_doc(), &settings, 99).unwrap();
    assert_eq!(a, b);
}

#[test]
fn cleanup_is_idempotent_and_removes_shared_dir() {
    let ws = Workspace::new(&["2021"]);
    let mut league =
        SimulatedLeague::new(&ws.season("2021"), oracle(), &LeagueSettings::default(), 3).unwrap();
    let shared = league.shared_dir().unwrap().to_path_buf();
    assert!(shared.join("qb_data.json").is_file());

    league.cleanup();
    assert!(!shared.exists());
    assert!(league.shared_dir().is_none());
    league.cleanup();
    drop(league);
    assert!(!shared.exists());
}

#[test]
fn dropped_league_removes_shared_dir() {
    let ws = Workspace::new(&["2021"]);
    let league =
        SimulatedLeague::new(&ws.season("2021"), oracle(), &LeagueSettings::default(), 5).unwrap();
    let shared = league.shared_dir().unwrap().to_path_buf();
    drop(league);
    assert!(!shared.exists());
}

#[test]
fn ten_team_schedule_covers_seventeen_weeks() {
    let schedule = Schedule::round_robin(10, 17).unwrap();
    assert_eq!(schedule.num_weeks(), 17);
    for week in schedule.weeks() {
        assert_eq!(week.len(), 5);
    }
    for team in 0..10 {
        let games = (1..=17).filter(|w| schedule.opponent(*w, team).is_some()).count();
        assert_eq!(games, 17);
    }
}

// ===========================================================================
// Accuracy
// ===========================================================================

#[test]
fn season_long_accuracy_covers_players_with_points() {
    let ws = Workspace::new(&["2021"]);
    let oracle = ParameterizedOracle::from_document(&baseline_doc());
    let result = season_accuracy(&ws.season("2021"), &oracle, Horizon::RestOfSeason, &LeagueSettings::default())
        .unwrap()
        .unwrap();
    assert!(result.player_count > 0 && result.player_count <= 200);
    assert!(result.mae.is_finite() && result.mae > 0.0);
}

#[test]
fn weekly_accuracy_uses_the_horizon_window() {
    let ws = Workspace::new(&["2021"]);
    let oracle = ParameterizedOracle::from_document(&baseline_doc());
    let result = season_accuracy(&ws.season("2021"), &oracle, Horizon::Weeks6To9, &LeagueSettings::default())
        .unwrap()
        .unwrap();
    assert!(result.player_count > 0);
    assert!(result.mae.is_finite());
}

#[test]
fn accuracy_averages_seasons_and_skips_missing_ones() {
    let ws = Workspace::new(&["2021", "2022"]);
    let oracle = ParameterizedOracle::from_document(&baseline_doc());
    let settings = LeagueSettings::default();
    let seasons = vec![ws.season("2021"), ws.season("2022"), ws.season("2019")];

    let perf = evaluate_horizon(&seasons, &oracle, Horizon::RestOfSeason, &settings).unwrap();
    assert_eq!(perf.seasons, 2);
    let single = season_accuracy(&seasons[0], &oracle, Horizon::RestOfSeason, &settings)
        .unwrap()
        .unwrap();
    // Identical synthetic seasons average to the single-season MAE.
    assert!((perf.mae - single.mae).abs() < 1e-9);
    assert_eq!(perf.player_count, single.player_count * 2);
}

// ===========================================================================
// Candidate ranking
// ===========================================================================

#[test]
fn explicit_candidates_best_is_highest_win_rate_then_points() {
    let mut explicit = BTreeMap::new();
    explicit.insert("PRIMARY_BONUS".to_string(), vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
    let generator = ConfigGenerator::new(5, explicit, 1);
    let spec = param_spec("PRIMARY_BONUS").unwrap();
    let mut doc = baseline_doc();
    doc.set(spec, 0.0);
    let baselines = HorizonBaselines::uniform(doc);
    let candidates = generator
        .generate(spec, &baselines, &[Horizon::RestOfSeason])
        .unwrap();
    let values: Vec<f64> = candidates.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![0.0, -10.0, -5.0, 5.0, 10.0]);

    let mut results = ResultsManager::<ConfigPerformance>::new();
    let ids: Vec<usize> = candidates
        .into_iter()
        .map(|c| results.register(c.param, c.value, c.value_index, c.origin, c.config))
        .collect();

    // -5 and 5 share the top win rate; 5 scores more points.
    let records = [(9, 100.0), (6, 100.0), (12, 100.0), (12, 104.0), (3, 140.0)];
    for (id, (wins, points)) in ids.iter().zip(records) {
        for _ in 0..3 {
            let weeks: Vec<SubjectWeek> = (1..=17)
                .map(|week| SubjectWeek {
                    week,
                    won: week <= wins,
                    points,
                })
                .collect();
            results.record(*id, Horizon::RestOfSeason, &weeks);
        }
    }
    let (best, perf) = results.best(Horizon::RestOfSeason).unwrap();
    assert_eq!(best.value, 5.0);
    assert_eq!(perf.trials, 3);
}

// ===========================================================================
// Optimization runs
// ===========================================================================

#[tokio::test]
async fn win_rate_run_completes_and_writes_artifacts() {
    let ws = Workspace::new(&["2021"]);
    let config = ws.config(Mode::WinRate, &["PRIMARY_BONUS", "SAME_POS_BYE_WEIGHT"]);
    let manager = OptimizationManager::new(config, CancelFlag::new()).unwrap();

    let optimal = match manager.run().await.unwrap() {
        RunOutcome::Completed { optimal } => optimal,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(HorizonBaselines::is_complete(&optimal));
    assert!(ws.output_dir.join("checkpoint_01_PRIMARY_BONUS").is_dir());
    assert!(ws.output_dir.join("checkpoint_02_SAME_POS_BYE_WEIGHT").is_dir());

    // Baseline plus two generated values for each parameter.
    let mut reader = csv::Reader::from_path(ws.output_dir.join(RESULTS_FILE)).unwrap();
    assert_eq!(reader.records().count(), 6);
}

#[tokio::test]
async fn tournament_accuracy_run_tracks_every_horizon() {
    let ws = Workspace::new(&["2021"]);
    let mut config = ws.config(Mode::Accuracy, &["MATCHUP_SCORING_WEIGHT"]);
    config.run.tournament = true;
    let manager = OptimizationManager::new(config, CancelFlag::new()).unwrap();
    let outcome = manager.run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let rows = manager.store().manifest().results().unwrap();
    // Three values from each of five origins, each scored on five horizons.
    assert_eq!(rows.len(), 3 * 5 * 5);
    let best_horizons: HashSet<String> = rows.iter().filter(|r| r.is_best).map(|r| r.horizon.clone()).collect();
    assert_eq!(best_horizons.len(), 5);
}

#[tokio::test]
async fn interrupted_run_resumes_after_last_checkpoint() {
    let ws = Workspace::new(&["2021"]);
    let order = [
        "PRIMARY_BONUS",
        "SECONDARY_BONUS",
        "ADP_SCORING_WEIGHT",
        "PLAYER_RATING_SCORING_WEIGHT",
        "MATCHUP_SCORING_WEIGHT",
        "TEAM_QUALITY_SCORING_WEIGHT",
    ];
    let preserved = [("PRIMARY_BONUS", 111.0), ("SECONDARY_BONUS", 99.0), ("ADP_SCORING_WEIGHT", 6.5)];

    // Simulate a run stopped after parameter index 2.
    {
        let store = CheckpointStore::open(&ws.output_dir).unwrap();
        let mut baselines = HorizonBaselines::uniform(baseline_doc());
        for (index, (name, value)) in preserved.iter().enumerate() {
            baselines.update(Horizon::RestOfSeason, param_spec(name).unwrap(), *value);
            store.write_checkpoint(index, name, &baselines, &json!({})).unwrap();
        }
    }

    let manager = OptimizationManager::new(ws.config(Mode::Accuracy, &order), CancelFlag::new()).unwrap();
    let order_strings: Vec<String> = order.iter().map(|s| s.to_string()).collect();
    match manager.store().detect_resume(&order_strings).unwrap() {
        ResumeState::Resume { next_index, .. } => assert_eq!(next_index, 3),
        other => panic!("expected resume, got {other:?}"),
    }

    let optimal = match manager.run().await.unwrap() {
        RunOutcome::Completed { optimal } => optimal,
        other => panic!("expected completion, got {other:?}"),
    };
    let final_baselines = HorizonBaselines::load(&optimal).unwrap();
    for (name, value) in preserved {
        assert_eq!(
            final_baselines.value(Horizon::RestOfSeason, param_spec(name).unwrap()).unwrap(),
            value
        );
    }

    let rows = manager.store().manifest().results().unwrap();
    assert!(rows.iter().all(|r| r.param_index >= 3));
    assert_eq!(scan_checkpoint_folders(&ws.output_dir).unwrap().len(), 6);
}

#[tokio::test]
async fn run_cancelled_after_third_checkpoint_resumes_at_fourth() {
    let ws = Workspace::new(&["2021"]);
    let order = [
        "PRIMARY_BONUS",
        "SECONDARY_BONUS",
        "ADP_SCORING_WEIGHT",
        "PLAYER_RATING_SCORING_WEIGHT",
        "MATCHUP_SCORING_WEIGHT",
        "TEAM_QUALITY_SCORING_WEIGHT",
    ];
    let mut config = ws.config(Mode::Accuracy, &order);
    config.run.workers = 1;

    // Cancel as soon as the third checkpoint lands; the single worker keeps
    // the fourth parameter's batch from finishing first.
    let cancel = CancelFlag::new();
    let third = ws.output_dir.join("checkpoint_03_ADP_SCORING_WEIGHT");
    let watcher = {
        let cancel = cancel.clone();
        let third = third.clone();
        tokio::spawn(async move {
            while !third.is_dir() {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        })
    };

    let manager = OptimizationManager::new(config.clone(), cancel).unwrap();
    let outcome = manager.run().await.unwrap();
    watcher.abort();
    assert_eq!(
        outcome,
        RunOutcome::Cancelled {
            last_checkpoint: Some(third.clone())
        }
    );
    assert_eq!(scan_checkpoint_folders(&ws.output_dir).unwrap().len(), 3);
    let interrupted = HorizonBaselines::load(&third).unwrap();
    drop(manager);

    let manager = OptimizationManager::new(config, CancelFlag::new()).unwrap();
    let order_strings: Vec<String> = order.iter().map(|s| s.to_string()).collect();
    match manager.store().detect_resume(&order_strings).unwrap() {
        ResumeState::Resume { next_index, .. } => assert_eq!(next_index, 3),
        other => panic!("expected resume, got {other:?}"),
    }
    let optimal = match manager.run().await.unwrap() {
        RunOutcome::Completed { optimal } => optimal,
        other => panic!("expected completion, got {other:?}"),
    };

    let final_baselines = HorizonBaselines::load(&optimal).unwrap();
    for name in &order[..3] {
        let spec = param_spec(name).unwrap();
        assert_eq!(
            final_baselines.value(Horizon::RestOfSeason, spec).unwrap(),
            interrupted.value(Horizon::RestOfSeason, spec).unwrap()
        );
    }
    assert_eq!(scan_checkpoint_folders(&ws.output_dir).unwrap().len(), 6);
}

#[tokio::test]
async fn completed_output_directory_is_detected_and_rerun_fresh() {
    let ws = Workspace::new(&["2021"]);
    let order = ["PRIMARY_BONUS"];
    let order_strings = vec!["PRIMARY_BONUS".to_string()];
    let manager = OptimizationManager::new(ws.config(Mode::Accuracy, &order), CancelFlag::new()).unwrap();
    assert!(matches!(manager.run().await.unwrap(), RunOutcome::Completed { .. }));

    // Detection does not mutate anything.
    for _ in 0..2 {
        assert!(matches!(
            manager.store().detect_resume(&order_strings).unwrap(),
            ResumeState::Complete { .. }
        ));
    }

    assert!(matches!(manager.run().await.unwrap(), RunOutcome::Completed { .. }));
    assert_eq!(scan_checkpoint_folders(&ws.output_dir).unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_run_starts_no_work() {
    let ws = Workspace::new(&["2021"]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let manager = OptimizationManager::new(ws.config(Mode::WinRate, &["PRIMARY_BONUS"]), cancel).unwrap();
    assert_eq!(
        manager.run().await.unwrap(),
        RunOutcome::Cancelled { last_checkpoint: None }
    );
    assert!(scan_checkpoint_folders(&ws.output_dir).unwrap().is_empty());
}

#[test]
fn unknown_parameter_aborts_before_any_work() {
    let ws = Workspace::new(&["2021"]);
    let config = ws.config(Mode::WinRate, &["NOT_A_PARAMETER"]);
    assert!(OptimizationManager::new(config, CancelFlag::new()).is_err());
    assert!(!ws.output_dir.exists());
}

#[test]
fn empty_data_directory_aborts() {
    let ws = Workspace::new(&[]);
    std::fs::create_dir_all(&ws.data_dir).unwrap();
    let config = ws.config(Mode::WinRate, &["PRIMARY_BONUS"]);
    assert!(OptimizationManager::new(config, CancelFlag::new()).is_err());
}
