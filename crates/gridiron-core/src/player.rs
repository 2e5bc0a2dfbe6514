// Player records and football positions.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type PlayerId = u64;

/// Fantasy football roster positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DST")]
    Defense,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position abbreviation. "D/ST" and "DEF" map to `Defense`.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" => Some(Position::Kicker),
            "DST" | "D/ST" | "DEF" => Some(Position::Defense),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DST",
        }
    }

    /// Positions that can fill the FLEX starting slot.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }

    /// Per-position data file name inside a week snapshot folder.
    pub fn data_file(&self) -> &'static str {
        match self {
            Position::Quarterback => "qb_data.json",
            Position::RunningBack => "rb_data.json",
            Position::WideReceiver => "wr_data.json",
            Position::TightEnd => "te_data.json",
            Position::Kicker => "k_data.json",
            Position::Defense => "dst_data.json",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One player as recorded in a week snapshot.
///
/// `projected_points` and `actual_points` are indexed by `week - 1`. A
/// snapshot taken at week N carries realized values only for weeks before N;
/// later entries are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub bye_week: Option<u8>,
    #[serde(default)]
    pub average_draft_position: Option<f64>,
    #[serde(default)]
    pub player_rating: Option<f64>,
    /// Season-long projection. Falls back to the sum of weekly projections.
    #[serde(default)]
    pub fantasy_points: Option<f64>,
    #[serde(default)]
    pub projected_points: Vec<f64>,
    #[serde(default)]
    pub actual_points: Vec<f64>,
    /// Opponent abbreviation per week, when known.
    #[serde(default)]
    pub opponents: Vec<String>,
}

impl Player {
    /// Season-long projected points.
    pub fn season_projection(&self) -> f64 {
        self.fantasy_points
            .unwrap_or_else(|| self.projected_points.iter().sum())
    }

    /// Projected points for a 1-based week, zero when absent.
    pub fn projected_for_week(&self, week: u8) -> f64 {
        week_value(&self.projected_points, week)
    }

    /// Realized points for a 1-based week, zero when absent.
    pub fn actual_for_week(&self, week: u8) -> f64 {
        week_value(&self.actual_points, week)
    }

    /// Sum of realized points across the whole array.
    pub fn season_actual(&self) -> f64 {
        self.actual_points.iter().sum()
    }

    pub fn opponent_for_week(&self, week: u8) -> Option<&str> {
        let idx = usize::from(week).checked_sub(1)?;
        self.opponents
            .get(idx)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn week_value(values: &[f64], week: u8) -> f64 {
    usize::from(week)
        .checked_sub(1)
        .and_then(|idx| values.get(idx))
        .copied()
        .unwrap_or(0.0)
}
