//! Reports derived from flat artifacts.

pub mod efficiency;

pub use efficiency::{EfficiencyRow, efficiency_by_roll, efficiency_by_run, efficiency_rows};
