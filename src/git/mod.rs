//! Git integration
//!
//! Cloning goes through the system `git` binary so it is just another
//! throttled subprocess; reading a local clone's metadata goes through git2.

use anyhow::{Context, Result};
use git2::Repository;
use std::path::Path;

mod clone;

pub use clone::{Cloner, GitCli};

/// URL of the `origin` remote configured in a local clone.
///
/// Directory names in the scratch tree are sanitized and can collide; the
/// remote URL is what identifies a repository in reports.
pub fn remote_url(clone_dir: &Path) -> Result<String> {
    let repo = Repository::open(clone_dir)
        .with_context(|| format!("Failed to open Git repository at {}", clone_dir.display()))?;
    let remote = repo
        .find_remote("origin")
        .context("Repository has no origin remote")?;
    let url = remote.url().context("Origin remote URL is not valid UTF-8")?;
    Ok(url.trim_end().to_string())
}

/// Whether `path` already holds a git work tree
pub fn is_work_tree(path: &Path) -> bool {
    Repository::open(path)
        .map(|repo| !repo.is_bare())
        .unwrap_or(false)
}
