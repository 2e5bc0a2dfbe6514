// Historical season data: discovery, validation, and week snapshots.
//
// Layout of one season folder:
//
//   <data_dir>/2023/
//     team_data.csv
//     weeks/week_01/{qb,rb,wr,te,k,dst}_data.json
//     weeks/week_02/...
//
// The snapshot in `week_NN` reflects what was known before week N was played.
// Realized points for week N therefore come from `week_{N+1}`.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::player::{Player, PlayerId, Position};
use crate::rankings::TeamRankings;

pub const TEAM_DATA_FILE: &str = "team_data.csv";
pub const WEEKS_DIR: &str = "weeks";

/// Seasons with fewer usable players than this are skipped.
pub const MIN_VALID_PLAYERS: usize = 150;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SeasonError {
    #[error("data folder not found: {path}")]
    DataDirNotFound { path: PathBuf },

    #[error("no valid season folders found in {path}")]
    NoSeasons { path: PathBuf },

    #[error("week folder not found: {path}")]
    MissingWeek { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read team data {path}: {source}")]
    TeamData { path: PathBuf, source: csv::Error },
}

// ---------------------------------------------------------------------------
// SeasonSource
// ---------------------------------------------------------------------------

/// One historical season on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonSource {
    pub name: String,
    pub path: PathBuf,
}

impl SeasonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    pub fn week_dir(&self, week: u8) -> PathBuf {
        self.path.join(WEEKS_DIR).join(format!("week_{week:02}"))
    }

    pub fn has_week(&self, week: u8) -> bool {
        self.week_dir(week).is_dir()
    }

    /// All players in the week-N snapshot.
    pub fn load_week(&self, week: u8) -> Result<Vec<Player>, SeasonError> {
        let dir = self.week_dir(week);
        if !dir.is_dir() {
            return Err(SeasonError::MissingWeek { path: dir });
        }
        load_players_dir(&dir)
    }

    /// Snapshot pair used to play week N: projections from week N, realized
    /// points from week N+1. When week N+1 is missing the week-N snapshot is
    /// reused for both, with a warning.
    pub fn load_week_data(&self, week: u8) -> Result<WeekData, SeasonError> {
        let projected = Arc::new(self.load_week(week)?);
        let next = week.checked_add(1).filter(|w| self.has_week(*w));
        let actual = if let Some(next) = next {
            Arc::new(self.load_week(next)?)
        } else {
            warn!(
                "season {}: week {} has no follow-up snapshot, using week {} for actuals",
                self.name,
                week,
                week
            );
            Arc::clone(&projected)
        };
        Ok(WeekData {
            week,
            projected,
            actual,
        })
    }

    /// Team strength rankings for this season. A missing `team_data.csv`
    /// yields empty rankings.
    pub fn load_rankings(&self, window: u8) -> Result<TeamRankings, SeasonError> {
        let path = self.path.join(TEAM_DATA_FILE);
        if !path.is_file() {
            debug!("season {}: no {}, team rankings disabled", self.name, TEAM_DATA_FILE);
            return Ok(TeamRankings::empty());
        }
        let file = File::open(&path).map_err(|e| SeasonError::Io {
            path: path.clone(),
            source: e,
        })?;
        TeamRankings::from_reader(file, window).map_err(|e| SeasonError::TeamData { path, source: e })
    }

    /// Realized season totals per player, taken from the latest snapshot
    /// available up to `weeks + 1`.
    pub fn season_actuals(&self, weeks: u8) -> Result<HashMap<PlayerId, f64>, SeasonError> {
        let last = (1..=weeks.saturating_add(1))
            .rev()
            .find(|w| self.has_week(*w))
            .ok_or_else(|| SeasonError::MissingWeek {
                path: self.week_dir(1),
            })?;
        let players = self.load_week(last)?;
        Ok(players
            .iter()
            .map(|p| {
                let total = p.actual_points.iter().take(usize::from(weeks)).sum();
                (p.id, total)
            })
            .collect())
    }

    /// Copy the week-1 player files and team data into `dest`.
    pub fn materialize_into(&self, dest: &Path) -> Result<(), SeasonError> {
        let src = self.week_dir(1);
        if !src.is_dir() {
            return Err(SeasonError::MissingWeek { path: src });
        }
        for pos in Position::ALL {
            let file = src.join(pos.data_file());
            if file.is_file() {
                copy_file(&file, &dest.join(pos.data_file()))?;
            }
        }
        let team_data = self.path.join(TEAM_DATA_FILE);
        if team_data.is_file() {
            copy_file(&team_data, &dest.join(TEAM_DATA_FILE))?;
        }
        Ok(())
    }
}

/// Player snapshots needed to play one week.
#[derive(Debug, Clone)]
pub struct WeekData {
    pub week: u8,
    pub projected: Arc<Vec<Player>>,
    pub actual: Arc<Vec<Player>>,
}

// ---------------------------------------------------------------------------
// Loading helpers
// ---------------------------------------------------------------------------

/// Load every position file in `dir`. Missing files are skipped with a warning.
pub fn load_players_dir(dir: &Path) -> Result<Vec<Player>, SeasonError> {
    let mut players = Vec::new();
    for pos in Position::ALL {
        let path = dir.join(pos.data_file());
        if !path.is_file() {
            warn!("missing player file {}", path.display());
            continue;
        }
        let file = File::open(&path).map_err(|e| SeasonError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut batch: Vec<Player> = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| SeasonError::Parse {
                path: path.clone(),
                source: e,
            })?;
        players.append(&mut batch);
    }
    Ok(players)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), SeasonError> {
    std::fs::copy(from, to).map(|_| ()).map_err(|e| SeasonError::Io {
        path: from.to_path_buf(),
        source: e,
    })
}

/// Find season folders (`20XX`) under `data_dir` and keep those whose week-1
/// snapshot has at least `min_players` players with a positive projection.
pub fn discover_seasons(data_dir: &Path, min_players: usize) -> Result<Vec<SeasonSource>, SeasonError> {
    if !data_dir.is_dir() {
        return Err(SeasonError::DataDirNotFound {
            path: data_dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(data_dir).map_err(|e| SeasonError::Io {
        path: data_dir.to_path_buf(),
        source: e,
    })?;

    let mut seasons = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || !is_season_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let season = SeasonSource::new(path);
        match validate_season(&season, min_players) {
            Ok(count) => {
                debug!("season {}: {} valid players", season.name, count);
                seasons.push(season);
            }
            Err(reason) => warn!("skipping season {}: {}", season.name, reason),
        }
    }

    if seasons.is_empty() {
        return Err(SeasonError::NoSeasons {
            path: data_dir.to_path_buf(),
        });
    }
    seasons.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        "discovered {} season(s): {}",
        seasons.len(),
        seasons.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(seasons)
}

fn is_season_name(name: &str) -> bool {
    name.len() == 4 && name.starts_with("20") && name.chars().all(|c| c.is_ascii_digit())
}

fn validate_season(season: &SeasonSource, min_players: usize) -> Result<usize, String> {
    let players = season.load_week(1).map_err(|e| e.to_string())?;
    let valid = players.iter().filter(|p| p.season_projection() > 0.0).count();
    if valid < min_players {
        return Err(format!("only {valid} valid players, need {min_players}"));
    }
    Ok(valid)
}
