//! # CLI Commands
//!
//! Each `cmd_*` function backs one subcommand in `main.rs`. They return
//! their output instead of printing so tests can inspect it.

use crate::api::{AppState, build_router};
use crate::config::{AppConfig, ConfigError, hash_password};
use eligo_core::export::export_csv;
use eligo_core::{ApplicationFilter, ApplicationStore, EligoError, IncomeLimitTable, RedbStore};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] EligoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database {0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("database {0} does not exist (run `eligo init` first)")]
    MissingDatabase(PathBuf),

    #[error("{0}")]
    Invalid(String),
}

pub type CliResult<T> = Result<T, CliError>;

// =============================================================================
// DATABASE
// =============================================================================

/// Open a database that must already exist.
pub fn open_existing(db: &Path) -> CliResult<RedbStore> {
    if !db.exists() {
        return Err(CliError::MissingDatabase(db.to_path_buf()));
    }
    Ok(RedbStore::open(db)?)
}

/// Read and validate a limit table from a JSON file.
pub fn load_limits_file(path: &Path) -> CliResult<IncomeLimitTable> {
    let text = std::fs::read_to_string(path)?;
    let table: IncomeLimitTable = serde_json::from_str(&text)?;
    table.validate()?;
    Ok(table)
}

/// `eligo init`
///
/// The new database is built beside `db` and renamed into place, so a
/// failure leaves any existing database untouched.
pub fn cmd_init(db: &Path, limits: Option<&Path>, force: bool) -> CliResult<()> {
    if db.exists() && !force {
        return Err(CliError::AlreadyExists(db.to_path_buf()));
    }
    let table = limits.map(load_limits_file).transpose()?;

    let staging = staging_path(db);
    if staging.exists() {
        std::fs::remove_file(&staging)?;
    }
    if let Err(err) = build_database(&staging, table.as_ref()) {
        if let Err(cleanup) = std::fs::remove_file(&staging) {
            warn!(path = %staging.display(), error = %cleanup, "failed to remove staging database");
        }
        return Err(err);
    }
    std::fs::rename(&staging, db)?;
    info!(path = %db.display(), "database initialized");
    Ok(())
}

fn staging_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push(".init");
    PathBuf::from(name)
}

fn build_database(path: &Path, table: Option<&IncomeLimitTable>) -> CliResult<()> {
    let store = RedbStore::open(path)?;
    if let Some(table) = table {
        store.replace_income_limits(table)?;
        info!(programs = table.programs.len(), "income limits loaded");
    }
    Ok(())
}

/// `eligo limits import`
pub fn cmd_limits_import(db: &Path, file: &Path) -> CliResult<IncomeLimitTable> {
    let table = load_limits_file(file)?;
    let store = open_existing(db)?;
    store.replace_income_limits(&table)?;
    info!(programs = table.programs.len(), "income limits replaced");
    Ok(table)
}

/// `eligo limits show`
pub fn cmd_limits_show(db: &Path, json: bool) -> CliResult<String> {
    let table = open_existing(db)?.income_limits()?;
    if json {
        return Ok(serde_json::to_string_pretty(&table)?);
    }
    Ok(render_limits(&table))
}

/// Plain-text rendering of a limit table.
#[must_use]
pub fn render_limits(table: &IncomeLimitTable) -> String {
    if table.is_empty() {
        return "no income limits configured\n".to_string();
    }
    let mut out = String::new();
    for (code, program) in &table.programs {
        out.push_str(&format!("{code}  {}\n", program.name));
        for (size, limit) in &program.monthly_limits {
            out.push_str(&format!("  household {size:>2}: {limit:>10} / month\n"));
        }
        if let Some(extra) = program.additional_member {
            out.push_str(&format!("  each additional member: +{extra}\n"));
        }
        if !program.required_documents.is_empty() {
            let docs: Vec<&str> = program.required_documents.iter().map(|d| d.as_str()).collect();
            out.push_str(&format!("  required documents: {}\n", docs.join(", ")));
        }
    }
    out
}

/// `eligo export`
pub fn cmd_export(db: &Path, status: Option<&str>, program: Option<&str>) -> CliResult<String> {
    let filter = ApplicationFilter {
        status: status.map(eligo_core::ApplicationStatus::parse).transpose()?,
        program: program.map(eligo_core::ProgramCode::new).transpose()?,
        ..Default::default()
    };
    let apps = open_existing(db)?.list()?;
    let matched = filter.apply(&apps);
    info!(rows = matched.len(), "applications exported");
    Ok(export_csv(matched))
}

/// Write to `out`, or stdout when absent.
pub fn write_output(content: &str, out: Option<&Path>) -> CliResult<()> {
    match out {
        Some(path) => std::fs::write(path, content)?,
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// `eligo hash-password`. Reads the password from stdin when absent.
pub fn cmd_hash_password(salt: &str, password: Option<&str>) -> CliResult<String> {
    if salt.is_empty() {
        return Err(CliError::Invalid("salt must not be empty".to_string()));
    }
    let password = match password {
        Some(p) => p.to_string(),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(CliError::Invalid("password must not be empty".to_string()));
    }
    Ok(hash_password(salt, &password))
}

// =============================================================================
// SERVER
// =============================================================================

/// Seed limits from `income_limits_path` when the store has none.
pub fn seed_limits(store: &dyn ApplicationStore, config: &AppConfig) -> CliResult<bool> {
    let Some(path) = &config.income_limits_path else {
        return Ok(false);
    };
    if !store.income_limits()?.is_empty() {
        return Ok(false);
    }
    let table = load_limits_file(path)?;
    store.replace_income_limits(&table)?;
    info!(path = %path.display(), programs = table.programs.len(), "income limits seeded");
    Ok(true)
}

/// `eligo serve`
pub async fn cmd_serve(config: AppConfig) -> CliResult<()> {
    let store = RedbStore::open(&config.database_path)?;
    seed_limits(&store, &config)?;
    if store.income_limits()?.is_empty() {
        warn!("no income limits configured; applicants cannot pick a program");
    }
    if config.reviewers.is_empty() {
        warn!("no reviewer accounts configured");
    }
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let listener = tokio::net::TcpListener::bind(config.bind.as_str()).await?;
    info!(
        addr = %listener.local_addr()?,
        database = %config.database_path.display(),
        uploads = %config.upload_dir.display(),
        "eligo listening"
    );

    let state = AppState::new(Arc::new(store), config);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
    }
}
