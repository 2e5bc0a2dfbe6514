// Candidate registration, per-horizon records, and best-of tracking.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gridiron_core::horizon::Horizon;
use gridiron_core::params::ConfigDocument;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::performance::Performance;

/// One configuration under test: a baseline with a single parameter changed.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Registration order within the current parameter; stable identity.
    pub index: usize,
    pub param: String,
    pub value: f64,
    /// Position of `value` in the generated value list (0 is the baseline).
    pub value_index: usize,
    /// Horizon whose baseline the candidate was derived from.
    pub origin: Horizon,
    pub config: Arc<ConfigDocument>,
}

impl Candidate {
    pub fn id(&self) -> String {
        format!("{}_{}_horizon_{}", self.param, self.value_index, self.origin)
    }
}

/// Flat export row for one candidate evaluated against one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub param_index: usize,
    pub param: String,
    pub candidate_id: String,
    pub value: f64,
    pub origin: String,
    pub horizon: String,
    pub is_best: bool,
    pub summary: String,
    pub metrics: String,
}

/// Records for every registered candidate of one parameter.
#[derive(Debug, Clone)]
pub struct ResultsManager<P: Performance> {
    candidates: Vec<Candidate>,
    records: HashMap<(usize, Horizon), P>,
    best: BTreeMap<Horizon, usize>,
}

impl<P: Performance> Default for ResultsManager<P> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            records: HashMap::new(),
            best: BTreeMap::new(),
        }
    }
}

impl<P: Performance> ResultsManager<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate, assigning its surrogate index.
    pub fn register(
        &mut self,
        param: &str,
        value: f64,
        value_index: usize,
        origin: Horizon,
        config: ConfigDocument,
    ) -> usize {
        let index = self.candidates.len();
        self.candidates.push(Candidate {
            index,
            param: param.to_string(),
            value,
            value_index,
            origin,
            config: Arc::new(config),
        });
        index
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn record_for(&self, index: usize, horizon: Horizon) -> Option<&P> {
        self.records.get(&(index, horizon))
    }

    /// Fold `sample` into a candidate's record for `horizon`. Returns `true`
    /// when this made the candidate the new best for that horizon.
    pub fn record(&mut self, index: usize, horizon: Horizon, sample: &P::Sample) -> bool {
        if index >= self.candidates.len() {
            warn!("ignoring result for unregistered candidate {}", index);
            return false;
        }
        self.records.entry((index, horizon)).or_default().absorb(sample);

        let previous = self.best.get(&horizon).copied();
        let current = self.select_best(horizon, previous);
        match current {
            Some(best) => {
                self.best.insert(horizon, best);
            }
            None => {
                self.best.remove(&horizon);
            }
        }
        current == Some(index) && previous != Some(index)
    }

    /// The incumbent keeps its place unless another record is strictly
    /// better; with no incumbent the lowest index wins ties.
    fn select_best(&self, horizon: Horizon, incumbent: Option<usize>) -> Option<usize> {
        let mut best = incumbent.filter(|i| self.has_data(*i, horizon));
        for candidate in &self.candidates {
            let Some(record) = self.records.get(&(candidate.index, horizon)) else {
                continue;
            };
            if !record.has_data() {
                continue;
            }
            best = match best {
                None => Some(candidate.index),
                Some(b) => {
                    let current = &self.records[&(b, horizon)];
                    if record.cmp_quality(current).is_gt() {
                        Some(candidate.index)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    fn has_data(&self, index: usize, horizon: Horizon) -> bool {
        self.records
            .get(&(index, horizon))
            .is_some_and(Performance::has_data)
    }

    pub fn best(&self, horizon: Horizon) -> Option<(&Candidate, &P)> {
        let index = *self.best.get(&horizon)?;
        Some((&self.candidates[index], &self.records[&(index, horizon)]))
    }

    /// Candidates with data for `horizon`, best first.
    pub fn ranked(&self, horizon: Horizon) -> Vec<(&Candidate, &P)> {
        let mut ranked: Vec<(&Candidate, &P)> = self
            .candidates
            .iter()
            .filter_map(|c| {
                self.records
                    .get(&(c.index, horizon))
                    .filter(|r| r.has_data())
                    .map(|r| (c, r))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp_quality(a.1));
        ranked
    }

    /// Export rows for every record, in candidate then horizon order.
    pub fn rows(&self, param_index: usize) -> Vec<ResultRow> {
        let mut rows = Vec::new();
        for candidate in &self.candidates {
            for horizon in Horizon::ALL {
                let Some(record) = self.records.get(&(candidate.index, horizon)) else {
                    continue;
                };
                rows.push(ResultRow {
                    param_index,
                    param: candidate.param.clone(),
                    candidate_id: candidate.id(),
                    value: candidate.value,
                    origin: candidate.origin.key().to_string(),
                    horizon: horizon.key().to_string(),
                    is_best: self.best.get(&horizon) == Some(&candidate.index),
                    summary: record.to_string(),
                    metrics: record.metrics().to_string(),
                });
            }
        }
        rows
    }
}

/// Write `rows` to a CSV file, replacing any existing file.
pub fn export_csv(rows: &[ResultRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row).context("failed to write result row")?;
    }
    writer.flush().context("failed to flush results file")?;
    Ok(())
}
