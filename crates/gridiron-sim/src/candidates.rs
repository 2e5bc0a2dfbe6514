// Candidate value generation around the current baselines.

use std::collections::BTreeMap;

use gridiron_core::horizon::Horizon;
use gridiron_core::params::{ConfigDocument, HorizonBaselines, ParamError, ParamScope, ParamSpec};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::trial::mix_seed;

/// Values closer than this are the same candidate.
const VALUE_EPSILON: f64 = 1e-9;

/// A configuration ready to register with the results manager.
#[derive(Debug, Clone)]
pub struct CandidateConfig {
    pub param: &'static str,
    pub value: f64,
    pub value_index: usize,
    pub origin: Horizon,
    pub config: ConfigDocument,
}

/// Enumerates test values for one parameter at a time.
///
/// Value lists are a pure function of the run seed, the parameter, and the
/// origin horizon, so a resumed run regenerates the same candidates.
#[derive(Debug, Clone)]
pub struct ConfigGenerator {
    num_test_values: usize,
    explicit: BTreeMap<String, Vec<f64>>,
    seed: u64,
}

impl ConfigGenerator {
    pub fn new(num_test_values: usize, explicit: BTreeMap<String, Vec<f64>>, seed: u64) -> Self {
        Self {
            num_test_values,
            explicit,
            seed,
        }
    }

    /// Baselines candidates are derived from. Shared parameters hold one
    /// value, so only the first target contributes.
    pub fn origins(spec: &ParamSpec, targets: &[Horizon]) -> Vec<Horizon> {
        match spec.scope {
            ParamScope::Shared => targets.iter().take(1).copied().collect(),
            ParamScope::Horizon => targets.to_vec(),
        }
    }

    /// Test values for `spec`, baseline first.
    ///
    /// Explicit values are used as given (rounded, not clamped). Otherwise
    /// small grids are enumerated in full and larger ones are sampled.
    pub fn test_values(&self, spec: &ParamSpec, origin: Horizon, baseline: f64) -> Vec<f64> {
        let mut values = vec![spec.round(baseline)];

        if let Some(explicit) = self.explicit.get(spec.name) {
            for value in explicit {
                push_distinct(&mut values, spec.round(*value));
            }
            return values;
        }

        let grid = spec.grid_size();
        if grid <= self.num_test_values as u64 + 1 {
            for i in 0..grid {
                push_distinct(&mut values, spec.grid_value(i));
            }
            return values;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.value_seed(spec, origin));
        let picks = rand::seq::index::sample(&mut rng, grid as usize, self.num_test_values + 1);
        for i in picks.iter() {
            if values.len() > self.num_test_values {
                break;
            }
            push_distinct(&mut values, spec.grid_value(i as u64));
        }
        values
    }

    /// Every candidate configuration for `spec` across the origin baselines.
    pub fn generate(
        &self,
        spec: &'static ParamSpec,
        baselines: &HorizonBaselines,
        targets: &[Horizon],
    ) -> Result<Vec<CandidateConfig>, ParamError> {
        let mut candidates = Vec::new();
        for origin in Self::origins(spec, targets) {
            let baseline = baselines.value(origin, spec)?;
            let values = self.test_values(spec, origin, baseline);
            debug!("{} [{}]: testing {:?}", spec.name, origin, values);
            for (value_index, value) in values.into_iter().enumerate() {
                let mut config = baselines.get(origin).clone();
                config.set(spec, value);
                candidates.push(CandidateConfig {
                    param: spec.name,
                    value,
                    value_index,
                    origin,
                    config,
                });
            }
        }
        Ok(candidates)
    }

    fn value_seed(&self, spec: &ParamSpec, origin: Horizon) -> u64 {
        let horizon = Horizon::ALL.iter().position(|h| *h == origin).unwrap_or(0) as u64;
        mix_seed(self.seed, &[name_hash(spec.name), horizon])
    }
}

fn push_distinct(values: &mut Vec<f64>, value: f64) {
    if !values.iter().any(|v| (v - value).abs() < VALUE_EPSILON) {
        values.push(value);
    }
}

/// FNV-1a over the parameter name; stable across builds.
fn name_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
