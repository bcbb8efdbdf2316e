//! CLI subcommand implementations.

pub mod classify;
pub mod identity;
pub mod report;
pub mod rules;
pub mod run;
pub mod status;
mod util;
