//! Console output for reposweep
//!
//! Operator-facing messages: phase steps, summaries and fatal diagnostics.
//! Per-job detail goes through `tracing` instead.

use console::style;

use crate::pipeline::ProgressMode;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        // Errors are always shown, even in quiet mode
        eprintln!("{} {}", style("✖").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print a verbose message (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    /// Print a step in a process
    pub fn step(&self, step: &str) {
        if !self.quiet {
            println!("{} {}", style("❯").cyan(), step);
        }
    }

    /// Print summary statistics with enhanced styling
    pub fn summary_stats(&self, label: &str, value: usize) {
        if !self.quiet {
            println!("  {:<22} {}", style(label).dim(), style(value.to_string()).bold());
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Progress bars are hidden in quiet mode
    pub fn progress_mode(&self) -> ProgressMode {
        if self.quiet {
            ProgressMode::Silent
        } else {
            ProgressMode::Visible
        }
    }
}
