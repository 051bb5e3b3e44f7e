//! Logic modules: turn what the machine has and what the user asked for into
//! a concrete plan.
//!
//! - `resolver` maps a hardware profile plus optional configuration to an
//!   `InstallPlan`

pub mod resolver;
