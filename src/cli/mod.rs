//! CLI module - argument parsing, subcommands and interactive prompts

mod args;
pub mod check;
pub mod profile;
mod prompts;

pub use args::{Cli, Commands};
pub use prompts::*;
