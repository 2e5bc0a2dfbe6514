// Optimization horizons: the season-long view plus four weekly windows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A time window a configuration is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "ros")]
    RestOfSeason,
    #[serde(rename = "1-5")]
    Weeks1To5,
    #[serde(rename = "6-9")]
    Weeks6To9,
    #[serde(rename = "10-13")]
    Weeks10To13,
    #[serde(rename = "14-17")]
    Weeks14To17,
}

impl Horizon {
    pub const ALL: [Horizon; 5] = [
        Horizon::RestOfSeason,
        Horizon::Weeks1To5,
        Horizon::Weeks6To9,
        Horizon::Weeks10To13,
        Horizon::Weeks14To17,
    ];

    /// The four weekly windows, in season order.
    pub const WEEKLY: [Horizon; 4] = [
        Horizon::Weeks1To5,
        Horizon::Weeks6To9,
        Horizon::Weeks10To13,
        Horizon::Weeks14To17,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Horizon::RestOfSeason => "ros",
            Horizon::Weeks1To5 => "1-5",
            Horizon::Weeks6To9 => "6-9",
            Horizon::Weeks10To13 => "10-13",
            Horizon::Weeks14To17 => "14-17",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Horizon::ALL.into_iter().find(|h| h.key() == key)
    }

    /// File holding this horizon's section of a baseline folder.
    pub fn file_name(&self) -> &'static str {
        match self {
            Horizon::RestOfSeason => "draft_config.json",
            Horizon::Weeks1To5 => "week1-5.json",
            Horizon::Weeks6To9 => "week6-9.json",
            Horizon::Weeks10To13 => "week10-13.json",
            Horizon::Weeks14To17 => "week14-17.json",
        }
    }

    /// Weeks covered by the window; `None` for the season-long horizon.
    pub fn weeks(&self) -> Option<RangeInclusive<u8>> {
        match self {
            Horizon::RestOfSeason => None,
            Horizon::Weeks1To5 => Some(1..=5),
            Horizon::Weeks6To9 => Some(6..=9),
            Horizon::Weeks10To13 => Some(10..=13),
            Horizon::Weeks14To17 => Some(14..=17),
        }
    }

    /// Whether a week result counts toward this horizon.
    pub fn contains_week(&self, week: u8) -> bool {
        self.weeks().map_or(true, |r| r.contains(&week))
    }

    /// The weekly window a given week falls into. Weeks past 17 belong to
    /// the last window.
    pub fn for_week(week: u8) -> Horizon {
        Horizon::WEEKLY
            .into_iter()
            .find(|h| h.contains_week(week))
            .unwrap_or(Horizon::Weeks14To17)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
