// Checkpoint folders, the resume manifest, and final run artifacts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use gridiron_core::params::HorizonBaselines;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::{info, warn};

use crate::results::{export_csv, ResultRow};

/// Manifest database inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.db";
/// Metrics file written next to each saved baseline.
pub const PERFORMANCE_FILE: &str = "performance.json";
/// Full results export.
pub const RESULTS_FILE: &str = "all_results.csv";

const CHECKPOINT_PREFIX: &str = "checkpoint_";
const OPTIMAL_PREFIX: &str = "optimal_";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One completed parameter as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    /// Zero-based position in the parameter order.
    pub index: usize,
    pub param: String,
    /// Stored relative to the output directory; resolved by the store.
    pub folder: PathBuf,
}

/// SQLite record of completed parameters and every evaluated candidate.
pub struct Manifest {
    conn: Mutex<Connection>,
}

impl Manifest {
    /// Open (or create) the manifest at `path`. Pass `":memory:"` for an
    /// ephemeral database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open manifest at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set manifest pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS checkpoints (
                param_index INTEGER PRIMARY KEY,
                param       TEXT NOT NULL,
                folder      TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS results (
                param_index  INTEGER NOT NULL,
                param        TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                value        REAL NOT NULL,
                origin       TEXT NOT NULL,
                horizon      TEXT NOT NULL,
                is_best      INTEGER NOT NULL,
                summary      TEXT NOT NULL,
                metrics      TEXT NOT NULL,
                PRIMARY KEY (param_index, candidate_id, horizon)
            );
            ",
        )
        .context("failed to create manifest schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned, which only happens when another
    /// thread panicked while holding the lock.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("manifest mutex poisoned")
    }

    /// Record (or replace) the checkpoint for one parameter index.
    pub fn record_checkpoint(&self, entry: &CheckpointEntry) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO checkpoints (param_index, param, folder) VALUES (?1, ?2, ?3)",
            params![
                entry.index as i64,
                entry.param,
                entry.folder.to_string_lossy().into_owned(),
            ],
        )
        .context("failed to record checkpoint")?;
        Ok(())
    }

    /// All recorded checkpoints, ordered by parameter index.
    pub fn checkpoints(&self) -> Result<Vec<CheckpointEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT param_index, param, folder FROM checkpoints ORDER BY param_index")
            .context("failed to prepare checkpoints query")?;
        let entries = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let folder: String = row.get(2)?;
                Ok(CheckpointEntry {
                    index: usize::try_from(index).unwrap_or(usize::MAX),
                    param: row.get(1)?,
                    folder: PathBuf::from(folder),
                })
            })
            .context("failed to query checkpoints")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map checkpoint rows")?;
        Ok(entries)
    }

    /// Store result rows in one transaction, replacing rows with the same key.
    pub fn record_results(&self, rows: &[ResultRow]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO results
                        (param_index, param, candidate_id, value, origin, horizon, is_best, summary, metrics)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .context("failed to prepare result insert")?;
            for row in rows {
                stmt.execute(params![
                    row.param_index as i64,
                    row.param,
                    row.candidate_id,
                    row.value,
                    row.origin,
                    row.horizon,
                    row.is_best,
                    row.summary,
                    row.metrics,
                ])
                .with_context(|| format!("failed to store result {}", row.candidate_id))?;
            }
        }
        tx.commit().context("failed to commit results")?;
        Ok(())
    }

    /// Every stored result row, in parameter then insertion order.
    pub fn results(&self) -> Result<Vec<ResultRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT param_index, param, candidate_id, value, origin, horizon, is_best, summary, metrics
                 FROM results ORDER BY param_index, rowid",
            )
            .context("failed to prepare results query")?;
        let rows = stmt
            .query_map([], |row| {
                let param_index: i64 = row.get(0)?;
                Ok(ResultRow {
                    param_index: usize::try_from(param_index).unwrap_or_default(),
                    param: row.get(1)?,
                    candidate_id: row.get(2)?,
                    value: row.get(3)?,
                    origin: row.get(4)?,
                    horizon: row.get(5)?,
                    is_best: row.get(6)?,
                    summary: row.get(7)?,
                    metrics: row.get(8)?,
                })
            })
            .context("failed to query results")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map result rows")?;
        Ok(rows)
    }

    /// Delete every checkpoint and result row.
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM checkpoints", [])
            .context("failed to delete checkpoints")?;
        tx.execute("DELETE FROM results", [])
            .context("failed to delete results")?;
        tx.commit().context("failed to commit manifest clear")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resume detection
// ---------------------------------------------------------------------------

/// Where a run should pick up.
#[derive(Debug, Clone)]
pub enum ResumeState {
    Fresh,
    Resume {
        next_index: usize,
        baselines: HorizonBaselines,
        folder: PathBuf,
    },
    /// Every parameter already has a valid checkpoint.
    Complete {
        baselines: HorizonBaselines,
        folder: PathBuf,
    },
}

/// Folder name for the checkpoint of zero-based `index`.
pub fn checkpoint_folder_name(index: usize, param: &str) -> String {
    format!("{CHECKPOINT_PREFIX}{:02}_{param}", index + 1)
}

/// Parse `checkpoint_NN_PARAM` into a zero-based index and parameter name.
pub fn parse_checkpoint_folder_name(name: &str) -> Option<(usize, String)> {
    let rest = name.strip_prefix(CHECKPOINT_PREFIX)?;
    let (number, param) = rest.split_once('_')?;
    if param.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: usize = number.parse().ok()?;
    let index = number.checked_sub(1)?;
    Some((index, param.to_string()))
}

/// Checkpoint folders directly under `dir`, ordered by index. Names that do
/// not parse are logged and ignored.
pub fn scan_checkpoint_folders(dir: &Path) -> Result<Vec<CheckpointEntry>> {
    let mut entries = Vec::new();
    if !dir.is_dir() {
        return Ok(entries);
    }
    let listing = fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for item in listing {
        let item = item.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = item.path();
        if !path.is_dir() {
            continue;
        }
        let name = item.file_name().to_string_lossy().into_owned();
        if !name.starts_with(CHECKPOINT_PREFIX) {
            continue;
        }
        match parse_checkpoint_folder_name(&name) {
            Some((index, param)) => entries.push(CheckpointEntry {
                index,
                param,
                folder: path,
            }),
            None => warn!("ignoring malformed checkpoint folder name {}", name),
        }
    }
    entries.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.folder.cmp(&b.folder)));
    Ok(entries)
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

/// Owns the output directory: checkpoints, manifest, and final artifacts.
pub struct CheckpointStore {
    output_dir: PathBuf,
    manifest: Manifest,
}

impl CheckpointStore {
    pub fn open(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
        let manifest = Manifest::open(&output_dir.join(MANIFEST_FILE))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            manifest,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Persist the baselines after completing parameter `index`. The folder
    /// is assembled under a temporary name and renamed into place.
    pub fn write_checkpoint(
        &self,
        index: usize,
        param: &str,
        baselines: &HorizonBaselines,
        metrics: &Value,
    ) -> Result<PathBuf> {
        let name = checkpoint_folder_name(index, param);
        let folder = self.output_dir.join(&name);
        let staging = self.output_dir.join(format!(".{name}.partial"));

        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("failed to remove stale {}", staging.display()))?;
        }
        write_baseline_folder(&staging, baselines, metrics)?;
        if folder.exists() {
            fs::remove_dir_all(&folder)
                .with_context(|| format!("failed to replace {}", folder.display()))?;
        }
        fs::rename(&staging, &folder)
            .with_context(|| format!("failed to move checkpoint into {}", folder.display()))?;

        self.manifest.record_checkpoint(&CheckpointEntry {
            index,
            param: param.to_string(),
            folder: PathBuf::from(&name),
        })?;
        info!("checkpoint saved: {}", folder.display());
        Ok(folder)
    }

    /// Decide where to resume given the configured parameter order.
    ///
    /// Manifest entries are preferred; when none of them validates,
    /// checkpoint folders are scanned. Entries whose name does not match the
    /// order at their index, or whose folder is not a complete baseline, are
    /// logged and skipped.
    pub fn detect_resume(&self, order: &[String]) -> Result<ResumeState> {
        let mut latest = latest_valid(self.manifest_entries()?, order);
        if latest.is_none() {
            let scanned = scan_checkpoint_folders(&self.output_dir)?;
            if !scanned.is_empty() {
                info!("no usable manifest entry, scanning {} checkpoint folders", scanned.len());
            }
            latest = latest_valid(scanned, order);
        }

        Ok(match latest {
            None => ResumeState::Fresh,
            Some((index, baselines, folder)) if index + 1 >= order.len() => {
                ResumeState::Complete { baselines, folder }
            }
            Some((index, baselines, folder)) => ResumeState::Resume {
                next_index: index + 1,
                baselines,
                folder,
            },
        })
    }

    /// Manifest entries with folders resolved against the output directory.
    fn manifest_entries(&self) -> Result<Vec<CheckpointEntry>> {
        Ok(self
            .manifest
            .checkpoints()?
            .into_iter()
            .map(|mut entry| {
                if let Some(name) = entry.folder.file_name() {
                    entry.folder = self.output_dir.join(name);
                }
                entry
            })
            .collect())
    }

    /// Most recent checkpoint folder in the manifest.
    pub fn last_checkpoint(&self) -> Result<Option<PathBuf>> {
        Ok(self.manifest_entries()?.pop().map(|e| e.folder))
    }

    /// Remove every checkpoint folder and reset the manifest.
    pub fn clear(&self) -> Result<()> {
        let mut folders: Vec<PathBuf> = self
            .manifest_entries()?
            .into_iter()
            .map(|e| e.folder)
            .collect();
        folders.extend(scan_checkpoint_folders(&self.output_dir)?.into_iter().map(|e| e.folder));
        folders.sort();
        folders.dedup();
        for folder in folders {
            if folder.exists() {
                fs::remove_dir_all(&folder)
                    .with_context(|| format!("failed to remove {}", folder.display()))?;
            }
        }
        self.manifest.clear()?;
        info!("cleared checkpoints in {}", self.output_dir.display());
        Ok(())
    }

    /// Store result rows and rewrite the CSV export from everything stored.
    pub fn record_results(&self, rows: &[ResultRow]) -> Result<PathBuf> {
        self.manifest.record_results(rows)?;
        let path = self.output_dir.join(RESULTS_FILE);
        export_csv(&self.manifest.results()?, &path)?;
        Ok(path)
    }

    /// Write the final `optimal_<timestamp>` folder.
    pub fn write_optimal(&self, baselines: &HorizonBaselines, metrics: &Value) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let folder = self.output_dir.join(format!("{OPTIMAL_PREFIX}{stamp}"));
        write_baseline_folder(&folder, baselines, metrics)?;
        info!("optimal configuration saved: {}", folder.display());
        Ok(folder)
    }
}

fn write_baseline_folder(folder: &Path, baselines: &HorizonBaselines, metrics: &Value) -> Result<()> {
    baselines
        .save(folder, Some(metrics))
        .with_context(|| format!("failed to save baselines to {}", folder.display()))?;
    let text = serde_json::to_string_pretty(metrics).context("failed to serialize metrics")?;
    fs::write(folder.join(PERFORMANCE_FILE), text)
        .with_context(|| format!("failed to write {}", PERFORMANCE_FILE))?;
    Ok(())
}

/// Highest-index entry that validates against `order`.
fn latest_valid(
    entries: Vec<CheckpointEntry>,
    order: &[String],
) -> Option<(usize, HorizonBaselines, PathBuf)> {
    let mut latest: Option<(usize, HorizonBaselines, PathBuf)> = None;
    for entry in entries {
        match validate_entry(&entry, order) {
            Ok(baselines) => {
                if latest.as_ref().map_or(true, |(i, _, _)| entry.index >= *i) {
                    latest = Some((entry.index, baselines, entry.folder));
                }
            }
            Err(reason) => warn!(
                "skipping checkpoint {} ({}): {}",
                entry.folder.display(),
                entry.param,
                reason
            ),
        }
    }
    latest
}

fn validate_entry(entry: &CheckpointEntry, order: &[String]) -> std::result::Result<HorizonBaselines, String> {
    match order.get(entry.index) {
        None => return Err(format!("index {} is beyond the parameter order", entry.index + 1)),
        Some(expected) if *expected != entry.param => {
            return Err(format!("expected {} at index {}", expected, entry.index + 1));
        }
        Some(_) => {}
    }
    if !entry.folder.is_dir() {
        return Err("folder is missing".to_string());
    }
    if !HorizonBaselines::is_complete(&entry.folder) {
        return Err("folder is not a complete baseline".to_string());
    }
    HorizonBaselines::load(&entry.folder).map_err(|e| e.to_string())
}
