//! Command-line interface for reposweep
//!
//! clap parses the arguments; each subcommand lives in [`commands`].

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod output;
pub mod validate;

pub use output::Output;
pub use validate::{SETUP_EXIT_CODE, SetupError};

/// Clone every repository of an organization or user and sweep it for committed secrets
#[derive(Parser)]
#[command(
    name = "reposweep",
    version = env!("CARGO_PKG_VERSION"),
    about = "Clone GitHub repositories and gists in bulk and scan them for committed secrets",
    long_about = "reposweep enumerates the repositories and gists of a GitHub organization, team \
                  or user, clones them with bounded concurrency, runs truffleHog and/or \
                  repo-supervisor against every clone and consolidates the findings into one report."
)]
pub struct Cli {
    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Scratch tree root (clones and raw results)
    #[arg(long, value_name = "DIR", global = true)]
    pub scratch_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enumerate, clone and scan targets, then write the report
    Scan(commands::scan::ScanArgs),
    /// Build the report from an existing scratch tree
    Report(commands::report::ReportArgs),
    /// Configuration management
    Config(commands::config::ConfigArgs),
    /// Show version information
    Version(commands::version::VersionArgs),
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn output(&self) -> Output {
        Output::new(self.verbose > 0, self.quiet)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let global = GlobalArgs {
            verbose: self.verbose,
            quiet: self.quiet,
            config: self.config,
            scratch_dir: self.scratch_dir,
        };

        match self.command {
            Commands::Scan(args) => commands::scan::execute(args, &global).await,
            Commands::Report(args) => commands::report::execute(args, &global).await,
            Commands::Config(args) => commands::config::execute(args, &global).await,
            Commands::Version(args) => commands::version::execute(args).await,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Logs share the terminal with progress bars and the report summary
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
