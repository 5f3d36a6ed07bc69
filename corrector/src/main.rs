//! Self-correcting task runner.
//!
//! Executes a task against a text-generation backend, validates the result,
//! and retries with targeted feedback until the result is accepted or the
//! retry budget is exhausted.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use corrector::cli;
use corrector::exit_codes;
use corrector::io::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "corrector",
    version,
    about = "Self-correcting execute/validate/retry loop for LLM backends"
)]
struct Cli {
    /// Path to the TOML config file. A missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the correction loop for a task (read from stdin if omitted).
    Run {
        task: Option<String>,
        /// Write metrics here instead of the configured path.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Execute a task once with no validation or retries.
    Once { task: String },
    /// Check that the configured backend responds.
    Probe,
    /// Summarize a metrics file written by `run`.
    Report {
        /// Metrics file; defaults to the configured metrics path.
        path: Option<PathBuf>,
    },
}

fn main() {
    corrector::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => {
            cli::init_config(&cli.config, force)?;
            Ok(exit_codes::OK)
        }
        Command::Run { task, metrics } => {
            let task = cli::resolve_task(task, std::io::stdin().lock())?;
            cli::run_task(&cli.config, &task, metrics)
        }
        Command::Once { task } => {
            let task = cli::resolve_task(Some(task), std::io::empty())?;
            cli::run_once(&cli.config, &task)
        }
        Command::Probe => {
            cli::probe(&cli.config)?;
            Ok(exit_codes::OK)
        }
        Command::Report { path } => {
            let path = match path {
                Some(path) => path,
                None => corrector::io::config::load_config(&cli.config)?.metrics_path,
            };
            cli::report(&path)?;
            Ok(exit_codes::OK)
        }
    }
}
