//! # Eligo
//!
//! Benefits intake and eligibility portal.

use clap::{Parser, Subcommand};
use eligo::cli::{
    CliResult, cmd_export, cmd_hash_password, cmd_init, cmd_limits_import, cmd_limits_show,
    cmd_serve, write_output,
};
use eligo::config::{AppConfig, DEFAULT_LOG_FILTER};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "eligo", version, about = "Benefits intake and eligibility portal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Create a new database.
    Init {
        #[arg(long)]
        database: PathBuf,
        /// Income limit table to load.
        #[arg(long)]
        limits: Option<PathBuf>,
        /// Overwrite an existing database.
        #[arg(long)]
        force: bool,
    },
    /// Manage the income limit table.
    Limits {
        #[command(subcommand)]
        command: LimitsCommand,
    },
    /// Write applications as CSV.
    Export {
        #[arg(long)]
        database: PathBuf,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        program: Option<String>,
        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the credential hash for a reviewer account.
    HashPassword {
        #[arg(long)]
        salt: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum LimitsCommand {
    /// Validate a JSON table and replace the stored one.
    Import {
        #[arg(long)]
        database: PathBuf,
        file: PathBuf,
    },
    /// Print the stored table.
    Show {
        #[arg(long)]
        database: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Serve { config } => {
            let config = AppConfig::load(config.as_deref())?;
            cmd_serve(config).await
        }
        Command::Init {
            database,
            limits,
            force,
        } => cmd_init(&database, limits.as_deref(), force),
        Command::Limits { command } => match command {
            LimitsCommand::Import { database, file } => {
                let table = cmd_limits_import(&database, &file)?;
                println!("imported {} program(s)", table.programs.len());
                Ok(())
            }
            LimitsCommand::Show { database, json } => {
                let text = cmd_limits_show(&database, json)?;
                write_output(&text, None)
            }
        },
        Command::Export {
            database,
            status,
            program,
            out,
        } => {
            let csv = cmd_export(&database, status.as_deref(), program.as_deref())?;
            write_output(&csv, out.as_deref())
        }
        Command::HashPassword { salt, password } => {
            let hash = cmd_hash_password(&salt, password.as_deref())?;
            println!("{hash}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
