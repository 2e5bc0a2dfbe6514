// Domain model shared by the simulator and the optimizer: players, scoring
// parameters, horizons, team rankings, and season data.

pub mod horizon;
pub mod lineup;
pub mod oracle;
pub mod params;
pub mod player;
pub mod rankings;
pub mod season;
