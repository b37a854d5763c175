//! Scrutinizer CLI Entry Point
//!
//! Runs the quality gate on a project directory and prints the result tree.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrutinizer_core::{AnalyzerFailurePolicy, Scrutinizer};
use scrutinizer_utils::logging::basic_config;
use scrutinizer_utils::{FileHandler, LogLevel, Logger};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scrutinizer")]
#[command(about = "Scrutinizer - run analyzers and project commands as a quality gate")]
#[command(version)]
struct Cli {
    /// Log debug output, including the output of analyzer tools
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrutinize a project directory
    Run {
        /// Project directory containing the optional .scrutinizer.yml
        directory: PathBuf,

        /// Restrict analysis to these paths, relative to the project directory
        paths: Vec<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Seconds each before/after command may run
        #[arg(long, default_value_t = 300)]
        command_timeout: u64,

        /// Keep running remaining analyzers when one fails
        #[arg(long)]
        continue_on_failure: bool,

        /// Append the run's log lines to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Print the reference configuration, or the resolved configuration of a directory
    Config {
        /// Project directory to resolve
        directory: Option<PathBuf>,
    },

    /// List the standard analyzers in execution order
    Analyzers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    if let Err(e) = basic_config(Some(level)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = dispatch(cli.command, level).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands, level: LogLevel) -> Result<()> {
    match command {
        Commands::Run {
            directory,
            paths,
            output,
            command_timeout,
            continue_on_failure,
            log_file,
        } => {
            let mut logger = Logger::new("scrutinizer");
            logger.set_level(level);
            if let Some(log_file) = &log_file {
                let handler = FileHandler::new(log_file)
                    .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
                logger = logger.with_sink(Arc::new(handler));
            }

            let policy = if continue_on_failure {
                AnalyzerFailurePolicy::Continue
            } else {
                AnalyzerFailurePolicy::Abort
            };
            let scrutinizer = Scrutinizer::standard(logger)
                .with_command_timeout(Duration::from_secs(command_timeout))
                .with_failure_policy(policy);

            let project = scrutinizer.scrutinize(&directory, &paths).await?;
            let report = serde_json::to_string_pretty(&project)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, report)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    eprintln!("Report saved to: {}", path.display());
                }
                None => println!("{report}"),
            }
        }

        Commands::Config { directory } => {
            let scrutinizer = Scrutinizer::standard(Logger::new("scrutinizer"));
            let value = match directory {
                Some(directory) => resolved_configuration(&scrutinizer, &directory)?,
                None => scrutinizer.configuration().reference(),
            };
            print!("{}", serde_yaml::to_string(&value)?);
        }

        Commands::Analyzers => {
            let scrutinizer = Scrutinizer::standard(Logger::new("scrutinizer"));
            let config = scrutinizer.configuration().reference();
            for name in scrutinizer.analyzers().names() {
                let enabled = config[name]["enabled"].as_bool().unwrap_or(false);
                println!("{name}{}", if enabled { "" } else { " (disabled by default)" });
            }
        }
    }

    Ok(())
}

fn resolved_configuration(scrutinizer: &Scrutinizer, directory: &Path) -> Result<serde_json::Value> {
    if !directory.is_dir() {
        anyhow::bail!("The directory \"{}\" does not exist.", directory.display());
    }
    let config = scrutinizer.load_configuration(directory)?;
    Ok(config.as_value().clone())
}
