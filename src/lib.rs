//! # reposweep - bulk secret sweeps over GitHub repositories
//!
//! reposweep enumerates the repositories and gists of an organization, team
//! or user, clones them under a shared concurrency ceiling, runs external
//! secret-detection tools against every clone and consolidates their raw
//! output into one report.
//!
//! ## Quick Start
//!
//! ```bash
//! # Every repository of an organization and of its members
//! reposweep scan --org acme --token "$GITHUB_TOKEN"
//!
//! # One merged JSON report, truffleHog only
//! reposweep scan --user octocat --tool thog --merge-output -o findings.json
//!
//! # Rebuild the report from an existing scratch tree
//! reposweep report --merge-output
//! ```

pub mod cli;
pub mod config;
pub mod git;
pub mod parallel;
pub mod pipeline;
pub mod report;
pub mod scratch;
pub mod targets;
pub mod tools;

pub use cli::{Cli, Output, SetupError};
pub use config::SweepConfig;

/// Result type alias for reposweep operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
