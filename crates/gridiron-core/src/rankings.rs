// Rolling-window NFL team strength rankings derived from weekly team scores.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::Deserialize;
use tracing::warn;

/// One NFL team's result in one week, as read from `team_data.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamWeekRecord {
    pub team: String,
    pub week: u8,
    pub points_scored: f64,
    pub points_allowed: f64,
}

/// Offensive and defensive ranks (1 = best) computed over the weeks
/// immediately preceding the current period.
///
/// Before any period is set, or when the window holds no completed weeks,
/// every rank lookup returns `None`.
#[derive(Debug, Clone)]
pub struct TeamRankings {
    records: Vec<TeamWeekRecord>,
    window: u8,
    current_week: u8,
    weeks_of_data: u8,
    offense: HashMap<String, u8>,
    defense: HashMap<String, u8>,
}

impl TeamRankings {
    /// Build rankings over `records`, averaging at most `window` prior weeks.
    pub fn new(records: Vec<TeamWeekRecord>, window: u8) -> Self {
        Self {
            records,
            window: window.max(1),
            current_week: 0,
            weeks_of_data: 0,
            offense: HashMap::new(),
            defense: HashMap::new(),
        }
    }

    /// Rankings with no underlying data; every lookup is neutral.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 1)
    }

    /// Parse `team,week,points_scored,points_allowed` rows. Malformed rows are
    /// skipped with a warning.
    pub fn from_reader<R: Read>(rdr: R, window: u8) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(rdr);
        let mut records = Vec::new();
        for result in reader.deserialize::<TeamWeekRecord>() {
            match result {
                Ok(mut rec) => {
                    if !rec.points_scored.is_finite() || !rec.points_allowed.is_finite() {
                        warn!("skipping team row '{}' week {}: non-finite points", rec.team, rec.week);
                        continue;
                    }
                    rec.team = rec.team.trim().to_uppercase();
                    records.push(rec);
                }
                Err(e) => {
                    warn!("skipping malformed team row: {}", e);
                }
            }
        }
        Ok(Self::new(records, window))
    }

    /// Set the current period and recompute ranks from the `window` weeks
    /// strictly before it.
    pub fn set_current_week(&mut self, week: u8) {
        if week == self.current_week {
            return;
        }
        self.current_week = week;

        let first = week.saturating_sub(self.window).max(1);
        let mut totals: BTreeMap<&str, (f64, f64, u32)> = BTreeMap::new();
        let mut weeks_seen = std::collections::BTreeSet::new();
        for rec in &self.records {
            if rec.week >= first && rec.week < week {
                let entry = totals.entry(rec.team.as_str()).or_insert((0.0, 0.0, 0));
                entry.0 += rec.points_scored;
                entry.1 += rec.points_allowed;
                entry.2 += 1;
                weeks_seen.insert(rec.week);
            }
        }
        self.weeks_of_data = weeks_seen.len() as u8;

        let averages: Vec<(&str, f64, f64)> = totals
            .into_iter()
            .map(|(team, (scored, allowed, n))| (team, scored / n as f64, allowed / n as f64))
            .collect();

        let mut by_offense = averages.clone();
        by_offense.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        self.offense = by_offense
            .iter()
            .enumerate()
            .map(|(i, (team, _, _))| (team.to_string(), (i + 1) as u8))
            .collect();

        let mut by_defense = averages;
        by_defense.sort_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.0.cmp(b.0)));
        self.defense = by_defense
            .iter()
            .enumerate()
            .map(|(i, (team, _, _))| (team.to_string(), (i + 1) as u8))
            .collect();
    }

    pub fn current_week(&self) -> u8 {
        self.current_week
    }

    /// Number of completed weeks inside the current window.
    pub fn weeks_of_data(&self) -> u8 {
        self.weeks_of_data
    }

    /// Number of ranked teams in the current window.
    pub fn team_count(&self) -> usize {
        self.offense.len()
    }

    pub fn offensive_rank(&self, team: &str) -> Option<u8> {
        self.offense.get(&team.to_uppercase()).copied()
    }

    pub fn defensive_rank(&self, team: &str) -> Option<u8> {
        self.defense.get(&team.to_uppercase()).copied()
    }
}
