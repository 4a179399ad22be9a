//! Command-line interface for stormpipe.
//!
//! Provides commands for auditing pipeline completeness, healing missing
//! artifacts, processing single forecasts, bulk stage regeneration and
//! index rebuilds.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
