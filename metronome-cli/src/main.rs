//! Metronome CLI - run cron jobs defined in a job file.
//!
//! # Commands
//!
//! - `metronome run` - Run every job due in the current minute
//! - `metronome run-job <id>` - Run one job right away
//! - `metronome list` - List registered jobs and their next run
//!
//! `metronome run` is meant to be started by OS cron once per minute:
//!
//! ```text
//! * * * * * metronome --config /etc/metronome.toml run
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod console;
mod error;

use commands::run_job::RunJobArgs;
use commands::{list, run, run_job};
use config::JobFile;
use error::CliResult;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "METRONOME_LOG";

/// Metronome - windowed cron scheduler
#[derive(Parser)]
#[command(name = "metronome")]
#[command(version)]
#[command(about = "⏱️  Run cron jobs at their due second, each in its own process")]
#[command(long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = format!(
    "{}\n  {} metronome run\n  {} metronome run --json\n  {} metronome run-job backup\n  {} metronome list",
    "Examples:".bright_cyan().bold(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
    "$".dimmed(),
))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the job file
    #[arg(
        short,
        long,
        global = true,
        env = "METRONOME_CONFIG",
        default_value = "metronome.toml"
    )]
    config: PathBuf,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job due in the current window
    Run {
        /// Print a JSON array of summaries instead of one line per job
        #[arg(long)]
        json: bool,
    },

    /// Run a single job right away
    RunJob {
        /// Job id
        #[arg(allow_hyphen_values = true)]
        id: String,

        /// Only run the job when it is due in the current minute
        #[arg(long)]
        no_force: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Run parameters as JSON, e.g. '{"second":20}'
        #[arg(long)]
        parameters: Option<String>,
    },

    /// List registered jobs
    #[command(alias = "ls")]
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Install the log subscriber. Logs go to stderr; stdout carries results.
fn init_tracing(verbose: bool, no_color: bool) {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color && std::io::stderr().is_terminal()),
        )
        .init();
}

async fn dispatch(cli: Cli) -> CliResult<ExitCode> {
    let job_file = JobFile::load(&cli.config)?;
    let scheduler = job_file.build_scheduler(&cli.config)?;

    match cli.command {
        Commands::Run { json } => run::execute(&scheduler, json).await,
        Commands::RunJob {
            id,
            no_force,
            json,
            parameters,
        } => {
            run_job::execute(
                &scheduler,
                RunJobArgs {
                    id,
                    no_force,
                    json,
                    parameters,
                },
            )
            .await
        }
        Commands::List { json } => {
            list::execute(&scheduler, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose, cli.no_color);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
