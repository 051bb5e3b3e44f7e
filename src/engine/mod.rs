//! Engine modules: turn a resolved plan into budgets and executable stages.
//!
//! - `space` computes the disk budget and runs the preflight gate
//! - `stages` builds the ordered stage list for a plan

pub mod space;
pub mod stages;
