//! Web time tracker CLI library.
//!
//! This crate provides the `wt` command-line interface and the tracking
//! daemon behind `wt run`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, IdentityAction, RulesAction};
pub use config::{Config, Timings};
