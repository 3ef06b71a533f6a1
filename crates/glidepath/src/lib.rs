//! Command-line front end for the glidepath projection engine
//!
//! This crate is a thin caller of `glidepath_core`. It provides:
//! - YAML scenario files describing a portfolio, horizon and cashflow plan
//! - A data directory of versioned assumption sets and saved scenarios
//! - File logging with size-based rotation
//! - Subcommands for simulation, frontier, model portfolios and assumptions,
//!   each producing a JSON report

#![warn(clippy::all)]

pub mod commands;
pub mod logging;
pub mod scenario;
pub mod storage;

pub use logging::init_logging;
pub use scenario::{Scenario, ScenarioError};
pub use storage::DataDirectory;
