//! CLI module for quizapi
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP API
//! - migrate: Create the tables
//! - import: Load a question set from a JSON file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{
    import, import_questions, migrate, migrate_database, run, run_command, serve,
};
pub use errors::{CliError, CliErrorCode, CliResult};
