// Coordinate-ascent optimization over the configured parameter order.
//
// For each parameter:
// 1. Generate candidates around the current baseline(s)
// 2. Evaluate them on the worker pool (league trials or accuracy)
// 3. Fold the best value per target horizon into the baselines
// 4. Record results and write a checkpoint

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use gridiron_core::horizon::Horizon;
use gridiron_core::params::{param_spec, ConfigDocument, HorizonBaselines, ParamScope, ParamSpec};
use gridiron_core::season::{discover_seasons, SeasonSource};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::accuracy::evaluate_candidate;
use crate::candidates::ConfigGenerator;
use crate::checkpoint::{CheckpointStore, ResumeState};
use crate::config::{Config, Mode};
use crate::performance::{AccuracyPerformance, ConfigPerformance, Performance};
use crate::pool::{CancelFlag, WorkerPool};
use crate::results::ResultsManager;
use crate::trial::{run_trial, weeks_in, TrialKey};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { optimal: PathBuf },
    /// Stopped on request; the most recent checkpoint is intact.
    Cancelled { last_checkpoint: Option<PathBuf> },
}

/// One league trial to run on the pool.
struct TrialJob {
    key: TrialKey,
    config: Arc<ConfigDocument>,
}

pub struct OptimizationManager {
    config: Config,
    seasons: Arc<Vec<SeasonSource>>,
    store: CheckpointStore,
    generator: ConfigGenerator,
    pool: WorkerPool,
    targets: Vec<Horizon>,
}

impl OptimizationManager {
    /// Discover seasons and open the output directory. Fails before any
    /// work when the parameter order or data directory is unusable.
    pub fn new(config: Config, cancel: CancelFlag) -> Result<Self> {
        for name in &config.run.parameter_order {
            param_spec(name).with_context(|| format!("invalid parameter order entry {name}"))?;
        }

        let seasons = discover_seasons(&config.run.data_dir, config.run.min_season_players)
            .with_context(|| format!("failed to load seasons from {}", config.run.data_dir.display()))?;

        let store = CheckpointStore::open(&config.run.output_dir)?;
        let generator = ConfigGenerator::new(
            config.run.num_test_values,
            config.candidate_values.clone(),
            config.run.seed,
        );
        let pool = WorkerPool::new(config.run.workers, cancel);
        let targets = config.run.target_horizons();

        Ok(Self {
            config,
            seasons: Arc::new(seasons),
            store,
            generator,
            pool,
            targets,
        })
    }

    pub fn seasons(&self) -> &[SeasonSource] {
        &self.seasons
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run (or resume) the optimization to completion or cancellation.
    pub async fn run(&self) -> Result<RunOutcome> {
        let order = self.config.run.parameter_order.clone();
        let (mut baselines, start) = self.starting_point(&order)?;
        self.check_baselines(&baselines, &order)?;

        info!(
            "optimizing {} parameters in {:?} mode ({}), starting at {}",
            order.len(),
            self.config.run.mode,
            if self.config.run.tournament { "tournament" } else { "single horizon" },
            start + 1
        );

        let mut latest_metrics = Value::Null;
        for (index, name) in order.iter().enumerate().skip(start) {
            if self.pool.cancel_flag().is_cancelled() {
                return self.cancelled();
            }
            let spec = param_spec(name)?;
            info!("[{}/{}] optimizing {}", index + 1, order.len(), spec.name);

            let metrics = match self.config.run.mode {
                Mode::WinRate => self.optimize_win_rate(index, spec, &mut baselines).await?,
                Mode::Accuracy => self.optimize_accuracy(index, spec, &mut baselines).await?,
            };
            let Some(metrics) = metrics else {
                return self.cancelled();
            };

            self.store.write_checkpoint(index, spec.name, &baselines, &metrics)?;
            latest_metrics = metrics;
        }

        let summary = json!({
            "mode": format!("{:?}", self.config.run.mode),
            "parameters_optimized": order,
            "timestamp": chrono::Local::now().to_rfc3339(),
            "horizons": latest_metrics.get("horizons").cloned().unwrap_or(Value::Null),
        });
        let optimal = self.store.write_optimal(&baselines, &summary)?;
        info!("optimization complete: {}", optimal.display());
        Ok(RunOutcome::Completed { optimal })
    }

    /// Baselines and the first parameter index to run.
    fn starting_point(&self, order: &[String]) -> Result<(HorizonBaselines, usize)> {
        match self.store.detect_resume(order)? {
            ResumeState::Resume {
                next_index,
                baselines,
                folder,
            } => {
                info!(
                    "resuming at parameter {} ({}) from {}",
                    next_index + 1,
                    order[next_index],
                    folder.display()
                );
                return Ok((baselines, next_index));
            }
            ResumeState::Complete { folder, .. } => {
                info!(
                    "previous run already complete ({}), clearing checkpoints",
                    folder.display()
                );
                self.store.clear()?;
            }
            ResumeState::Fresh => {}
        }

        let baselines = HorizonBaselines::load_or_uniform(&self.config.run.baseline_dir).with_context(|| {
            format!(
                "failed to load baseline from {}",
                self.config.run.baseline_dir.display()
            )
        })?;
        Ok((baselines, 0))
    }

    /// Every parameter must have a baseline value for each horizon it is
    /// generated from.
    fn check_baselines(&self, baselines: &HorizonBaselines, order: &[String]) -> Result<()> {
        for name in order {
            let spec = param_spec(name)?;
            for origin in ConfigGenerator::origins(spec, &self.targets) {
                baselines
                    .value(origin, spec)
                    .with_context(|| format!("baseline for horizon {origin} is incomplete"))?;
            }
        }
        Ok(())
    }

    fn cancelled(&self) -> Result<RunOutcome> {
        let last_checkpoint = self.store.last_checkpoint()?;
        match &last_checkpoint {
            Some(folder) => warn!("run cancelled; last checkpoint: {}", folder.display()),
            None => warn!("run cancelled before the first checkpoint"),
        }
        Ok(RunOutcome::Cancelled { last_checkpoint })
    }

    // ------------------------------------------------------------------
    // Win-rate mode
    // ------------------------------------------------------------------

    async fn optimize_win_rate(
        &self,
        index: usize,
        spec: &'static ParamSpec,
        baselines: &mut HorizonBaselines,
    ) -> Result<Option<Value>> {
        let mut results = ResultsManager::<ConfigPerformance>::new();
        self.register_candidates(&mut results, spec, baselines)?;

        let trials = self.config.run.trials_per_candidate;
        let mut jobs = Vec::new();
        for candidate in results.candidates() {
            for season in 0..self.seasons.len() {
                for trial in 0..trials {
                    jobs.push(TrialJob {
                        key: TrialKey {
                            candidate: candidate.index,
                            season,
                            trial,
                        },
                        config: Arc::clone(&candidate.config),
                    });
                }
            }
        }
        info!(
            "{}: {} candidates x {} seasons x {} trials = {} leagues on {} workers",
            spec.name,
            results.candidates().len(),
            self.seasons.len(),
            trials,
            jobs.len(),
            self.pool.workers()
        );

        let seasons = Arc::clone(&self.seasons);
        let settings = self.config.league.clone();
        let run_seed = self.config.run.seed;
        let outputs = self
            .pool
            .run_batch(jobs, move |job: TrialJob| {
                let season = &seasons[job.key.season];
                let weeks = run_trial(season, &job.config, &settings, job.key.seed(run_seed))
                    .with_context(|| format!("trial {:?} on season {}", job.key, season.name))?;
                Ok((job.key.candidate, weeks))
            })
            .await;
        if self.pool.cancel_flag().is_cancelled() {
            return Ok(None);
        }

        for (_, (candidate, weeks)) in outputs {
            for horizon in &self.targets {
                let in_horizon = weeks_in(&weeks, *horizon);
                if in_horizon.is_empty() {
                    continue;
                }
                if results.record(candidate, *horizon, &in_horizon) {
                    log_new_best(&results, candidate, *horizon);
                }
            }
        }

        self.finish_parameter(index, spec, &results, baselines).map(Some)
    }

    // ------------------------------------------------------------------
    // Accuracy mode
    // ------------------------------------------------------------------

    async fn optimize_accuracy(
        &self,
        index: usize,
        spec: &'static ParamSpec,
        baselines: &mut HorizonBaselines,
    ) -> Result<Option<Value>> {
        let mut results = ResultsManager::<AccuracyPerformance>::new();
        self.register_candidates(&mut results, spec, baselines)?;

        let jobs: Vec<(usize, Arc<ConfigDocument>)> = results
            .candidates()
            .iter()
            .map(|c| (c.index, Arc::clone(&c.config)))
            .collect();
        info!(
            "{}: {} candidates x {} horizons on {} workers",
            spec.name,
            jobs.len(),
            self.targets.len(),
            self.pool.workers()
        );

        let seasons = Arc::clone(&self.seasons);
        let settings = self.config.league.clone();
        let targets = self.targets.clone();
        let outputs = self
            .pool
            .run_batch(jobs, move |(candidate, config): (usize, Arc<ConfigDocument>)| {
                Ok((candidate, evaluate_candidate(&seasons, &config, &targets, &settings)))
            })
            .await;
        if self.pool.cancel_flag().is_cancelled() {
            return Ok(None);
        }

        for (_, (candidate, per_horizon)) in outputs {
            for (horizon, perf) in per_horizon {
                if results.record(candidate, horizon, &perf) {
                    log_new_best(&results, candidate, horizon);
                }
            }
        }

        self.finish_parameter(index, spec, &results, baselines).map(Some)
    }

    // ------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------

    fn register_candidates<P: Performance>(
        &self,
        results: &mut ResultsManager<P>,
        spec: &'static ParamSpec,
        baselines: &HorizonBaselines,
    ) -> Result<()> {
        let candidates = self
            .generator
            .generate(spec, baselines, &self.targets)
            .with_context(|| format!("failed to generate candidates for {}", spec.name))?;
        for c in candidates {
            results.register(c.param, c.value, c.value_index, c.origin, c.config);
        }
        Ok(())
    }

    /// Fold winners into `baselines`, store result rows, and build the
    /// checkpoint metrics.
    fn finish_parameter<P: Performance>(
        &self,
        index: usize,
        spec: &'static ParamSpec,
        results: &ResultsManager<P>,
        baselines: &mut HorizonBaselines,
    ) -> Result<Value> {
        match spec.scope {
            // One value for every horizon, taken from the first target.
            ParamScope::Shared => {
                if let Some((best, _)) = self.targets.first().and_then(|h| results.best(*h)) {
                    baselines.update(best.origin, spec, best.value);
                }
            }
            ParamScope::Horizon => {
                for horizon in &self.targets {
                    if let Some((best, _)) = results.best(*horizon) {
                        baselines.update(*horizon, spec, best.value);
                    }
                }
            }
        }

        let mut horizons = Map::new();
        for horizon in &self.targets {
            match results.best(*horizon) {
                Some((best, perf)) => {
                    info!(
                        "{} [{}]: best {} = {} ({})",
                        spec.name, horizon, best.id(), best.value, perf
                    );
                    horizons.insert(
                        horizon.key().to_string(),
                        json!({
                            "candidate": best.id(),
                            "value": best.value,
                            "summary": perf.to_string(),
                            "metrics": perf.metrics(),
                        }),
                    );
                }
                None => warn!(
                    "{} [{}]: no candidate produced results, baseline kept",
                    spec.name, horizon
                ),
            }
        }

        let rows = results.rows(index);
        let export = self.store.record_results(&rows)?;
        debug!("{} result rows exported to {}", rows.len(), export.display());

        Ok(json!({
            "param": spec.name,
            "param_index": index,
            "timestamp": chrono::Local::now().to_rfc3339(),
            "horizons": horizons,
        }))
    }
}

fn log_new_best<P: Performance>(results: &ResultsManager<P>, candidate: usize, horizon: Horizon) {
    if let (Some(c), Some(perf)) = (results.candidate(candidate), results.record_for(candidate, horizon)) {
        info!("new best for [{}]: {} = {} ({})", horizon, c.param, c.value, perf);
    }
}
