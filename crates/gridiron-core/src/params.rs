// Scoring parameter documents, the tunable-parameter registry, and the
// six-file baseline folder layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::horizon::Horizon;

/// File holding the sections shared by every horizon.
pub const LEAGUE_CONFIG_FILE: &str = "league_config.json";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("parameter {name} is missing from the document")]
    MissingValue { name: String },

    #[error("config folder {path} is missing required file {file}")]
    MissingFile { path: PathBuf, file: String },

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
}

// ---------------------------------------------------------------------------
// Parameter registry
// ---------------------------------------------------------------------------

/// Where a parameter's value lives across a baseline folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamScope {
    /// One value in `league_config.json`, shared by every horizon.
    Shared,
    /// Independent value in each horizon file.
    Horizon,
}

/// A tunable parameter: its location in the document and its search range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub section: &'static str,
    /// Key inside the section; `None` when the section itself is the value.
    pub key: Option<&'static str>,
    pub min: f64,
    pub max: f64,
    /// Decimal places; zero means integer-valued.
    pub precision: u32,
    pub scope: ParamScope,
}

impl ParamSpec {
    pub fn is_integer(&self) -> bool {
        self.precision == 0
    }

    /// Round a value to this parameter's precision.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        (value * factor).round() / factor
    }

    /// Round a value to this parameter's precision and clamp it into range.
    pub fn quantize(&self, value: f64) -> f64 {
        self.round(value).clamp(self.min, self.max)
    }

    /// Number of distinct values on this parameter's precision grid.
    pub fn grid_size(&self) -> u64 {
        let factor = 10f64.powi(self.precision as i32);
        ((self.max - self.min) * factor).round() as u64 + 1
    }

    /// The `i`-th value on the precision grid, starting at `min`.
    pub fn grid_value(&self, i: u64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        self.quantize(self.min + i as f64 / factor)
    }
}

const fn spec(
    name: &'static str,
    section: &'static str,
    key: Option<&'static str>,
    range: (f64, f64, u32),
    scope: ParamScope,
) -> ParamSpec {
    ParamSpec {
        name,
        section,
        key,
        min: range.0,
        max: range.1,
        precision: range.2,
        scope,
    }
}

/// Every parameter the optimizer knows how to tune.
pub const PARAM_SPECS: &[ParamSpec] = &[
    spec("NORMALIZATION_MAX_SCALE", "NORMALIZATION_MAX_SCALE", None, (50.0, 200.0, 0), ParamScope::Horizon),
    spec("SAME_POS_BYE_WEIGHT", "SAME_POS_BYE_WEIGHT", None, (0.0, 0.5, 2), ParamScope::Shared),
    spec("DIFF_POS_BYE_WEIGHT", "DIFF_POS_BYE_WEIGHT", None, (0.0, 0.3, 2), ParamScope::Shared),
    spec("PRIMARY_BONUS", "DRAFT_ORDER_BONUSES", Some("PRIMARY"), (25.0, 150.0, 0), ParamScope::Shared),
    spec("SECONDARY_BONUS", "DRAFT_ORDER_BONUSES", Some("SECONDARY"), (25.0, 150.0, 0), ParamScope::Shared),
    spec("ADP_SCORING_WEIGHT", "ADP_SCORING", Some("WEIGHT"), (0.5, 7.0, 2), ParamScope::Shared),
    spec("ADP_SCORING_STEPS", "ADP_SCORING", Some("STEPS"), (5.0, 50.0, 0), ParamScope::Shared),
    spec("PLAYER_RATING_SCORING_WEIGHT", "PLAYER_RATING_SCORING", Some("WEIGHT"), (0.5, 4.0, 2), ParamScope::Horizon),
    spec("TEAM_QUALITY_SCORING_WEIGHT", "TEAM_QUALITY_SCORING", Some("WEIGHT"), (0.0, 4.0, 2), ParamScope::Horizon),
    spec("TEAM_QUALITY_MIN_WEEKS", "TEAM_QUALITY_SCORING", Some("MIN_WEEKS"), (1.0, 12.0, 0), ParamScope::Horizon),
    spec("PERFORMANCE_SCORING_WEIGHT", "PERFORMANCE_SCORING", Some("WEIGHT"), (0.0, 8.0, 2), ParamScope::Horizon),
    spec("PERFORMANCE_SCORING_STEPS", "PERFORMANCE_SCORING", Some("STEPS"), (0.01, 0.3, 2), ParamScope::Horizon),
    spec("PERFORMANCE_MIN_WEEKS", "PERFORMANCE_SCORING", Some("MIN_WEEKS"), (1.0, 14.0, 0), ParamScope::Horizon),
    spec("MATCHUP_IMPACT_SCALE", "MATCHUP_SCORING", Some("IMPACT_SCALE"), (25.0, 250.0, 0), ParamScope::Horizon),
    spec("MATCHUP_SCORING_WEIGHT", "MATCHUP_SCORING", Some("WEIGHT"), (0.0, 4.0, 2), ParamScope::Horizon),
    spec("MATCHUP_MIN_WEEKS", "MATCHUP_SCORING", Some("MIN_WEEKS"), (1.0, 14.0, 0), ParamScope::Horizon),
];

/// Look up a parameter by name.
pub fn param_spec(name: &str) -> Result<&'static ParamSpec, ParamError> {
    PARAM_SPECS
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ParamError::UnknownParameter {
            name: name.to_string(),
        })
}

// ---------------------------------------------------------------------------
// ConfigDocument
// ---------------------------------------------------------------------------

/// A scoring configuration as stored on disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub config_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<Value>,
}

impl ConfigDocument {
    /// Read a numeric parameter via its registry location.
    pub fn get(&self, spec: &ParamSpec) -> Option<f64> {
        let section = self.parameters.get(spec.section)?;
        match spec.key {
            None => section.as_f64(),
            Some(key) => section.get(key)?.as_f64(),
        }
    }

    /// Write a numeric parameter, creating its section when missing.
    /// Integer parameters are stored as JSON integers. The value is rounded
    /// to the parameter's precision but not clamped.
    pub fn set(&mut self, spec: &ParamSpec, value: f64) {
        let value = spec.round(value);
        let json = if spec.is_integer() {
            Value::from(value as i64)
        } else {
            Value::from(value)
        };
        match spec.key {
            None => {
                self.parameters.insert(spec.section.to_string(), json);
            }
            Some(key) => {
                let section = self
                    .parameters
                    .entry(spec.section.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !section.is_object() {
                    *section = Value::Object(Map::new());
                }
                if let Value::Object(map) = section {
                    map.insert(key.to_string(), json);
                }
            }
        }
    }

    /// Raw section lookup for non-tunable entries.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Number at `section.key`, or `default` when absent.
    pub fn number_or(&self, section: &str, key: Option<&str>, default: f64) -> f64 {
        let Some(value) = self.parameters.get(section) else {
            return default;
        };
        let value = match key {
            Some(k) => value.get(k),
            None => Some(value),
        };
        value.and_then(Value::as_f64).unwrap_or(default)
    }

    fn read(path: &Path) -> Result<Self, ParamError> {
        let text = std::fs::read_to_string(path).map_err(|e| ParamError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ParamError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write(&self, path: &Path) -> Result<(), ParamError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ParamError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, text).map_err(|e| ParamError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

/// The five per-horizon baselines of a baseline folder.
///
/// Each horizon document is the shared sections of `league_config.json`
/// merged with that horizon's own file. Horizons never share edits to
/// horizon-scoped parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonBaselines {
    docs: BTreeMap<Horizon, ConfigDocument>,
}

impl HorizonBaselines {
    /// Use the same document for every horizon.
    pub fn uniform(doc: ConfigDocument) -> Self {
        let docs = Horizon::ALL.into_iter().map(|h| (h, doc.clone())).collect();
        Self { docs }
    }

    /// Whether `folder` holds all six files of a baseline.
    pub fn is_complete(folder: &Path) -> bool {
        required_files().iter().all(|f| folder.join(f).is_file())
    }

    /// Load the six-file layout from `folder`.
    pub fn load(folder: &Path) -> Result<Self, ParamError> {
        for file in required_files() {
            if !folder.join(file).is_file() {
                return Err(ParamError::MissingFile {
                    path: folder.to_path_buf(),
                    file: file.to_string(),
                });
            }
        }

        let league = ConfigDocument::read(&folder.join(LEAGUE_CONFIG_FILE))?;
        let mut docs = BTreeMap::new();
        for horizon in Horizon::ALL {
            let own = ConfigDocument::read(&folder.join(horizon.file_name()))?;
            let mut merged = league.clone();
            for (section, value) in own.parameters {
                merged.parameters.insert(section, value);
            }
            if !own.config_name.is_empty() {
                merged.config_name = own.config_name;
            }
            docs.insert(horizon, merged);
        }
        Ok(Self { docs })
    }

    /// Load a complete folder, or fall back to a lone `league_config.json`
    /// used for every horizon.
    pub fn load_or_uniform(folder: &Path) -> Result<Self, ParamError> {
        if Self::is_complete(folder) {
            return Self::load(folder);
        }
        let league = folder.join(LEAGUE_CONFIG_FILE);
        if !league.is_file() {
            return Err(ParamError::MissingFile {
                path: folder.to_path_buf(),
                file: LEAGUE_CONFIG_FILE.to_string(),
            });
        }
        Ok(Self::uniform(ConfigDocument::read(&league)?))
    }

    /// Write the six-file layout into `folder`, splitting shared and
    /// horizon-scoped sections. `metrics` is embedded in every file.
    pub fn save(&self, folder: &Path, metrics: Option<&Value>) -> Result<(), ParamError> {
        std::fs::create_dir_all(folder).map_err(|e| ParamError::Io {
            path: folder.to_path_buf(),
            source: e,
        })?;

        let horizon_sections = horizon_sections();
        let ros = self.get(Horizon::RestOfSeason);

        let mut league = ConfigDocument {
            config_name: ros.config_name.clone(),
            description: ros.description.clone(),
            parameters: Map::new(),
            performance_metrics: metrics.cloned(),
        };
        for (section, value) in &ros.parameters {
            if !horizon_sections.contains(&section.as_str()) {
                league.parameters.insert(section.clone(), value.clone());
            }
        }
        league.write(&folder.join(LEAGUE_CONFIG_FILE))?;

        for (horizon, doc) in &self.docs {
            let mut own = ConfigDocument {
                config_name: doc.config_name.clone(),
                description: format!("{} horizon parameters", horizon.key()),
                parameters: Map::new(),
                performance_metrics: metrics.cloned(),
            };
            for (section, value) in &doc.parameters {
                if horizon_sections.contains(&section.as_str()) {
                    own.parameters.insert(section.clone(), value.clone());
                }
            }
            own.write(&folder.join(horizon.file_name()))?;
        }
        Ok(())
    }

    pub fn get(&self, horizon: Horizon) -> &ConfigDocument {
        // Every constructor fills all five horizons.
        &self.docs[&horizon]
    }

    /// Current value of a parameter in one horizon.
    pub fn value(&self, horizon: Horizon, spec: &ParamSpec) -> Result<f64, ParamError> {
        self.get(horizon)
            .get(spec)
            .ok_or_else(|| ParamError::MissingValue {
                name: spec.name.to_string(),
            })
    }

    /// Fold a value into the baselines. Shared parameters change every
    /// horizon; horizon-scoped parameters change only `horizon`.
    pub fn update(&mut self, horizon: Horizon, spec: &ParamSpec, value: f64) {
        match spec.scope {
            ParamScope::Shared => {
                for doc in self.docs.values_mut() {
                    doc.set(spec, value);
                }
            }
            ParamScope::Horizon => {
                if let Some(doc) = self.docs.get_mut(&horizon) {
                    doc.set(spec, value);
                }
            }
        }
    }
}

fn required_files() -> Vec<&'static str> {
    std::iter::once(LEAGUE_CONFIG_FILE)
        .chain(Horizon::ALL.iter().map(|h| h.file_name()))
        .collect()
}

/// Sections owned by horizon files rather than `league_config.json`.
fn horizon_sections() -> Vec<&'static str> {
    let mut sections: Vec<&'static str> = PARAM_SPECS
        .iter()
        .filter(|s| s.scope == ParamScope::Horizon)
        .map(|s| s.section)
        .collect();
    sections.sort_unstable();
    sections.dedup();
    sections
}
