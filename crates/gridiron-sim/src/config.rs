// Configuration loading and parsing (simulation.toml).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use gridiron_core::horizon::Horizon;
use gridiron_core::params::param_spec;
use gridiron_core::player::Position;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::team::Strategy;
use crate::week::TieBreak;

pub const CONFIG_FILE: &str = "simulation.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunConfig,
    pub league: LeagueSettings,
    /// Explicit candidate lists that replace random generation for the
    /// named parameters.
    pub candidate_values: BTreeMap<String, Vec<f64>>,
}

/// Raw deserialization target for the entire simulation.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SimulationFile {
    run: RunConfig,
    #[serde(default)]
    league: LeagueSettings,
    #[serde(default)]
    candidate_values: BTreeMap<String, Vec<f64>>,
}

// ---------------------------------------------------------------------------
// [run]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Maximize the subject team's win rate in simulated leagues.
    WinRate,
    /// Minimize prediction error against realized points.
    Accuracy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub mode: Mode,
    /// Optimize all five horizons at once instead of only `target_horizon`.
    #[serde(default)]
    pub tournament: bool,
    #[serde(default = "default_target_horizon")]
    pub target_horizon: Horizon,
    pub baseline_dir: PathBuf,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub parameter_order: Vec<String>,
    /// Random values generated per parameter, in addition to the baseline.
    pub num_test_values: usize,
    /// League trials per candidate per season (win-rate mode).
    pub trials_per_candidate: usize,
    pub workers: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_min_season_players")]
    pub min_season_players: usize,
}

fn default_target_horizon() -> Horizon {
    Horizon::RestOfSeason
}

fn default_min_season_players() -> usize {
    gridiron_core::season::MIN_VALID_PLAYERS
}

impl RunConfig {
    /// Horizons whose best candidate is tracked and folded.
    pub fn target_horizons(&self) -> Vec<Horizon> {
        if self.tournament {
            Horizon::ALL.to_vec()
        } else {
            vec![self.target_horizon]
        }
    }
}

// ---------------------------------------------------------------------------
// [league]
// ---------------------------------------------------------------------------

/// Shape of one simulated league.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeagueSettings {
    pub num_teams: usize,
    pub draft_rounds: usize,
    pub season_weeks: u8,
    /// Probability an opponent picks randomly from its top candidates.
    pub human_error_rate: f64,
    /// How many top candidates a human-error pick chooses among.
    pub human_error_pool: usize,
    pub tie_break: TieBreak,
    /// Weeks averaged by the team strength rankings.
    pub rankings_window: u8,
    pub roster_limits: HashMap<String, usize>,
    pub strategies: BTreeMap<Strategy, usize>,
}

impl Default for LeagueSettings {
    fn default() -> Self {
        let roster_limits = [("QB", 2), ("RB", 5), ("WR", 5), ("TE", 2), ("K", 1), ("DST", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let strategies = [
            (Strategy::DraftHelper, 1),
            (Strategy::AdpAggressive, 2),
            (Strategy::ProjectedPointsAggressive, 2),
            (Strategy::AdpWithDraftOrder, 2),
            (Strategy::ProjectedPointsWithDraftOrder, 3),
        ]
        .into_iter()
        .collect();
        Self {
            num_teams: 10,
            draft_rounds: 15,
            season_weeks: 17,
            human_error_rate: 0.2,
            human_error_pool: 5,
            tie_break: TieBreak::default(),
            rankings_window: 4,
            roster_limits,
            strategies,
        }
    }
}

impl LeagueSettings {
    /// Maximum roster count for a position; unlisted positions are capped at 0.
    pub fn roster_limit(&self, pos: Position) -> usize {
        self.roster_limits
            .iter()
            .find(|(k, _)| Position::from_str_pos(k) == Some(pos))
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    /// Strategy assignment before shuffling, one entry per team.
    pub fn strategy_pool(&self) -> Vec<Strategy> {
        self.strategies
            .iter()
            .flat_map(|(s, n)| std::iter::repeat(*s).take(*n))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/simulation.toml` relative to
/// `base_dir`. Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: SimulationFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        run: file.run,
        league: file.league,
        candidate_values: file.candidate_values,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/simulation.toml` from `defaults/` when it is missing.
/// Returns the path written, or `None` when a config file already exists.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no config/{CONFIG_FILE} or defaults/{CONFIG_FILE} under {}",
                base_dir.display()
            ),
        });
    }

    let copy_error = |action: &str, path: &Path, e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to {action} {}: {e}", path.display()),
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| copy_error("create", dir, e))?;
    }
    let text = std::fs::read(&source).map_err(|e| copy_error("read", &source, e))?;
    // create_new keeps a concurrently written config intact.
    match std::fs::OpenOptions::new().write(true).create_new(true).open(&target) {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, &text).map_err(|e| copy_error("write", &target, e))?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(copy_error("create", &target, e)),
    }
}

/// Loads config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    if let Some(path) = ensure_config_file(&cwd)? {
        info!("copied default config to {}", path.display());
    }
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let run = &config.run;
    if run.parameter_order.is_empty() {
        return Err(invalid("run.parameter_order", "must name at least one parameter"));
    }
    for name in &run.parameter_order {
        if param_spec(name).is_err() {
            return Err(invalid("run.parameter_order", format!("unknown parameter `{name}`")));
        }
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = run.parameter_order.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(invalid("run.parameter_order", format!("`{dup}` listed twice")));
    }
    if run.workers == 0 {
        return Err(invalid("run.workers", "must be greater than 0"));
    }
    if run.mode == Mode::WinRate && run.trials_per_candidate == 0 {
        return Err(invalid("run.trials_per_candidate", "must be greater than 0"));
    }

    for (name, values) in &config.candidate_values {
        if param_spec(name).is_err() {
            return Err(invalid("candidate_values", format!("unknown parameter `{name}`")));
        }
        if values.is_empty() {
            return Err(invalid("candidate_values", format!("`{name}` has no values")));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("candidate_values", format!("`{name}` has a non-finite value")));
        }
    }

    let league = &config.league;
    if league.num_teams < 2 {
        return Err(invalid("league.num_teams", "must be at least 2"));
    }
    if league.draft_rounds == 0 {
        return Err(invalid("league.draft_rounds", "must be greater than 0"));
    }
    if league.season_weeks == 0 {
        return Err(invalid("league.season_weeks", "must be greater than 0"));
    }
    if !(0.0..=1.0).contains(&league.human_error_rate) {
        return Err(invalid(
            "league.human_error_rate",
            format!("must be between 0.0 and 1.0 inclusive, got {}", league.human_error_rate),
        ));
    }
    if league.human_error_pool == 0 {
        return Err(invalid("league.human_error_pool", "must be greater than 0"));
    }

    for key in league.roster_limits.keys() {
        if Position::from_str_pos(key).is_none() {
            return Err(invalid("league.roster_limits", format!("unknown position `{key}`")));
        }
    }
    let capacity: usize = Position::ALL.iter().map(|p| league.roster_limit(*p)).sum();
    if capacity < league.draft_rounds {
        return Err(invalid(
            "league.roster_limits",
            format!("total capacity {capacity} is less than {} draft rounds", league.draft_rounds),
        ));
    }

    let total: usize = league.strategies.values().sum();
    if total != league.num_teams {
        return Err(invalid(
            "league.strategies",
            format!("assigns {total} teams, league has {}", league.num_teams),
        ));
    }
    if league.strategies.get(&Strategy::DraftHelper).copied() != Some(1) {
        return Err(invalid("league.strategies", "exactly one draft_helper team is required"));
    }

    Ok(())
}
