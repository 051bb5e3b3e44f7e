//! Typed command argument modules.
//!
//! Each struct implements `CommandArgs` for one external tool invocation,
//! mapping Rust fields to the exact flags the tool expects.

pub mod fetch;
pub mod models;
pub mod network;
pub mod packages;
