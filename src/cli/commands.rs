//! CLI command implementations
//!
//! Each command loads the layered configuration, installs logging, then runs
//! on its own tokio runtime.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::config::ServiceConfig;
use crate::db::{migrate as migrate_schema, queries, ConnectionPool, DatabaseConfig};
use crate::http_server::{HttpServer, QuizState};
use crate::observability::{init_logging, MetricsRegistry};
use crate::quiz::{parse_questions, ImportDefaults};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::Migrate { config } => migrate(config.as_deref()),
        Command::Import {
            file,
            config,
            grade,
            lesson,
        } => import(config.as_deref(), &file, ImportDefaults { grade, lesson }),
    }
}

/// Serve the API until Ctrl-C
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    runtime()?.block_on(serve_until_shutdown(config))
}

async fn serve_until_shutdown(config: ServiceConfig) -> CliResult<()> {
    let pool = ConnectionPool::connect(&config.database).await?;
    let mut lease = pool.acquire().await?;
    migrate_schema(&mut lease, pool.backend()).await?;
    lease.release();

    let state = Arc::new(QuizState::new(pool, Arc::new(MetricsRegistry::new())));
    HttpServer::new(config.server, state)
        .start()
        .await
        .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

/// Create the tables and exit
pub fn migrate(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    runtime()?.block_on(migrate_database(&config.database))?;
    println!("Schema is up to date");
    Ok(())
}

/// Import a questions file and exit
pub fn import(config_path: Option<&Path>, file: &Path, defaults: ImportDefaults) -> CliResult<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    let imported = runtime()?.block_on(import_questions(&config.database, file, &defaults))?;
    println!("Imported {} questions from {}", imported, file.display());
    Ok(())
}

/// Connect, apply the schema and close the pool
pub async fn migrate_database(config: &DatabaseConfig) -> CliResult<()> {
    let pool = ConnectionPool::connect(config).await?;
    let result = async {
        let mut lease = pool.acquire().await?;
        migrate_schema(&mut lease, pool.backend()).await
    }
    .await;
    pool.close().await;
    result?;

    tracing::info!("schema applied");
    Ok(())
}

/// Parse `file` and insert every question in one transaction
///
/// Nothing is written if any question is invalid or any insert fails.
pub async fn import_questions(
    config: &DatabaseConfig,
    file: &Path,
    defaults: &ImportDefaults,
) -> CliResult<u64> {
    let bytes = fs::read(file)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", file.display(), e)))?;
    let questions =
        parse_questions(&bytes, defaults).map_err(|e| CliError::invalid_input(e.to_string()))?;

    let pool = ConnectionPool::connect(config).await?;
    let result = async {
        let mut lease = pool.acquire().await?;
        migrate_schema(&mut lease, pool.backend()).await?;
        queries::insert_questions(&mut lease, &questions).await
    }
    .await;
    pool.close().await;
    let imported = result?;

    tracing::info!(imported, file = %file.display(), "questions imported");
    Ok(imported)
}

fn load_config(path: Option<&Path>) -> CliResult<ServiceConfig> {
    let config = ServiceConfig::load(path)?;
    init_logging(&config.logging);
    Ok(config)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}
