//! CLI entry point: argument definitions, dispatch, and the per-subcommand
//! handlers that wire the workflow crates to stdout/exit codes.

mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
