// Library root: re-exports all modules so integration tests and the binary
// can access the simulator and optimizer.

pub mod accuracy;
pub mod candidates;
pub mod checkpoint;
pub mod config;
pub mod draft;
pub mod league;
pub mod optimizer;
pub mod performance;
pub mod pool;
pub mod results;
pub mod schedule;
pub mod team;
pub mod trial;
pub mod week;
