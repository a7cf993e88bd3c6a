//! CLI module - argument parsing, configuration and subcommands

pub mod args;
pub mod config;
pub mod convert;
pub mod prompts;
pub mod summarize;

pub use args::{Cli, Commands};
pub use config::AnalysisConfig;
pub use convert::run_convert;
pub use prompts::*;
pub use summarize::run_summarize;
