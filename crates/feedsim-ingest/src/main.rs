//! Feedsim - S3 to Postgres feed simulator

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use feedsim_common::logging::{init_logging, LogConfig, LogLevel};
use feedsim_ingest::commands::{self, StartOptions};
use feedsim_ingest::config::{AppConfig, ConnOverrides};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "feedsim")]
#[command(author, version, about = "Replay S3 data files into Postgres as a simulated live feed")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true, env = "DS_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    conn: ConnOverrides,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start loading data into the database
    Start {
        /// Parse and count rows without writing to the database
        #[arg(long)]
        dry_run: bool,

        /// Apply the SQL migrations in this directory instead of the built-in ones
        #[arg(long, value_name = "DIR", conflicts_with = "skip_migrations")]
        migrations: Option<PathBuf>,

        /// Don't touch the database schema
        #[arg(long)]
        skip_migrations: bool,
    },

    /// List the objects each table would extract
    List {
        /// Only list this table
        #[arg(short, long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = AppConfig::load(cli.config.as_deref(), &cli.conn)?;

    let _guard = init_logging(&log_config(config.conn.trace, cli.verbose)?)?;

    match command {
        Command::Start {
            dry_run,
            migrations,
            skip_migrations,
        } => {
            let options = StartOptions {
                dry_run,
                migrations: migrations.as_deref(),
                skip_migrations,
            };
            let report = commands::start(&config, options).await?;
            println!("{}", report.to_table());

            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        },
        Command::List { table } => {
            commands::list(&config, table.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        },
    }
}

/// LOG_* environment variables override the defaults; `--trace` overrides both
fn log_config(trace: bool, verbose: bool) -> Result<LogConfig> {
    let level = if verbose { LogLevel::Debug } else { LogLevel::Info };

    let mut config = LogConfig::builder()
        .level(level)
        .log_file_prefix("feedsim")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper=warn,sqlx=warn")
        .build()
        .merge_env()?;

    if trace {
        config.level = LogLevel::Trace;
    }

    Ok(config)
}
