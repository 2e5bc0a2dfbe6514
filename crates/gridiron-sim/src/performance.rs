// Per-candidate performance records and their ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::league::SubjectWeek;

/// Win rates closer than this compare equal.
pub const WIN_RATE_EPSILON: f64 = 1e-4;
/// Average points closer than this compare equal.
pub const POINTS_EPSILON: f64 = 1e-2;
/// MAE values closer than this compare equal.
pub const MAE_EPSILON: f64 = 1e-6;

/// A record the results manager can accumulate and rank.
pub trait Performance: Clone + Default + fmt::Display {
    type Sample;

    fn absorb(&mut self, sample: &Self::Sample);

    /// Whether the record holds enough data to compete for best.
    fn has_data(&self) -> bool;

    /// `Greater` means `self` is the better record. Must be total and
    /// transitive.
    fn cmp_quality(&self, other: &Self) -> Ordering;

    fn metrics(&self) -> Value;
}

/// Snap a value onto a grid of width `eps`. Comparing snapped values keeps
/// "near-equal is equal" transitive.
fn bucket(value: f64, eps: f64) -> i64 {
    (value / eps).round() as i64
}

// ---------------------------------------------------------------------------
// ConfigPerformance
// ---------------------------------------------------------------------------

/// Win/loss record of the subject team under one candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPerformance {
    pub wins: u32,
    pub losses: u32,
    pub total_points: f64,
    pub trials: u32,
}

impl ConfigPerformance {
    /// Fold in one trial's weekly results.
    pub fn add_trial(&mut self, weeks: &[SubjectWeek]) {
        for week in weeks {
            if week.won {
                self.wins += 1;
            } else {
                self.losses += 1;
            }
            self.total_points += week.points;
        }
        self.trials += 1;
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        match self.games() {
            0 => 0.0,
            games => f64::from(self.wins) / f64::from(games),
        }
    }

    /// Average points per trial.
    pub fn avg_points(&self) -> f64 {
        match self.trials {
            0 => 0.0,
            trials => self.total_points / f64::from(trials),
        }
    }

    fn key(&self) -> (i64, i64) {
        (
            bucket(self.win_rate(), WIN_RATE_EPSILON),
            bucket(self.avg_points(), POINTS_EPSILON),
        )
    }
}

impl Performance for ConfigPerformance {
    type Sample = Vec<SubjectWeek>;

    fn absorb(&mut self, sample: &Vec<SubjectWeek>) {
        self.add_trial(sample);
    }

    fn has_data(&self) -> bool {
        self.games() > 0
    }

    /// Win rate first, then average points.
    fn cmp_quality(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }

    fn metrics(&self) -> Value {
        json!({
            "win_rate": self.win_rate(),
            "wins": self.wins,
            "losses": self.losses,
            "avg_points": self.avg_points(),
            "trials": self.trials,
        })
    }
}

impl fmt::Display for ConfigPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}W-{}L ({:.1}%), avg {:.1} pts/league ({} trials)",
            self.wins,
            self.losses,
            self.win_rate() * 100.0,
            self.avg_points(),
            self.trials
        )
    }
}

// ---------------------------------------------------------------------------
// AccuracyPerformance
// ---------------------------------------------------------------------------

/// Prediction error of one candidate for one horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPerformance {
    pub mae: f64,
    pub player_count: usize,
    pub seasons: usize,
}

impl Performance for AccuracyPerformance {
    type Sample = AccuracyPerformance;

    /// Accuracy evaluation is deterministic, so a new sample replaces the old.
    fn absorb(&mut self, sample: &AccuracyPerformance) {
        *self = sample.clone();
    }

    fn has_data(&self) -> bool {
        self.player_count > 0 && self.mae.is_finite()
    }

    /// Lower MAE is better.
    fn cmp_quality(&self, other: &Self) -> Ordering {
        bucket(other.mae, MAE_EPSILON).cmp(&bucket(self.mae, MAE_EPSILON))
    }

    fn metrics(&self) -> Value {
        json!({
            "mae": self.mae,
            "player_count": self.player_count,
            "seasons": self.seasons,
        })
    }
}

impl fmt::Display for AccuracyPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE {:.4} over {} players ({} seasons)",
            self.mae, self.player_count, self.seasons
        )
    }
}
