pub mod backend;
pub mod engine;
pub mod kernel;
pub mod scan;

pub use backend::{CpuBackend, MatchBackend};
pub use engine::SearchEngine;
pub use kernel::match_score;
pub use scan::{PositionScan, RacingScan, RowMajorScan};
