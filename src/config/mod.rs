//! Run configuration planning.

mod planner;
mod types;

pub use planner::*;
pub use types::*;
