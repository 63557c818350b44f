//! CLI argument definitions using clap
//!
//! Commands:
//! - quizapi serve [--config <path>] [--port <n>]
//! - quizapi migrate [--config <path>]
//! - quizapi import --file <path> [--config <path>] [--grade <g>] [--lesson <n>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quizapi - HTTP backend for a classroom quiz
#[derive(Parser, Debug)]
#[command(name = "quizapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the quiz API until interrupted
    Serve {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on; overrides config and PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create the tables and exit
    Migrate {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Import a JSON array of questions and exit
    Import {
        /// Questions file
        #[arg(long)]
        file: PathBuf,

        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Grade for questions that carry none
        #[arg(long)]
        grade: Option<String>,

        /// Lesson for questions that carry none
        #[arg(long)]
        lesson: Option<i64>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
