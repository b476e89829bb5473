//! Tooling
//!
//! Command-line access to the order store: inspect, reconcile, reorder and reset
//! the custom order of a directory.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
