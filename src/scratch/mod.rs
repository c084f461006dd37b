//! Scratch tree layout
//!
//! The scratch tree is the only channel between the scan phase and the
//! aggregator. Its layout is shared with other tooling and must not drift:
//!
//! ```text
//! <root>/repos/org/<org>/<repo>/
//! <root>/repos/users/<user>/<repo-or-gist-id>/
//! <root>/repos/team/<repo>/
//! <root>/repos/<owner>/<repo>/                 (single repository or gist)
//! <root>/results/<owner>/<repo>/<tool>
//! ```
//!
//! Every path segment goes through [`segment`] so a hostile repository or
//! owner name cannot escape its slot or collide with a sibling.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tools::ToolName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScratchError {
    #[error("path segment {0:?} is empty or not a plain name")]
    InvalidSegment(String),
}

/// Validate a single path segment
pub fn segment(name: &str) -> Result<&str, ScratchError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if plain {
        Ok(name)
    } else {
        Err(ScratchError::InvalidSegment(name.to_string()))
    }
}

/// Where under `repos/` a target is cloned
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CloneBucket {
    /// `repos/org/<org>/`
    Org(String),
    /// `repos/users/<user>/`
    User(String),
    /// `repos/team/`, results filed under the owning org
    Team { org: String },
    /// `repos/<owner>/`
    Direct(String),
}

impl CloneBucket {
    /// Owner directory used under `results/`
    pub fn result_owner(&self) -> &str {
        match self {
            CloneBucket::Org(org) => org,
            CloneBucket::User(user) => user,
            CloneBucket::Team { org } => org,
            CloneBucket::Direct(owner) => owner,
        }
    }
}

impl fmt::Display for CloneBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloneBucket::Org(org) => write!(f, "org {org}"),
            CloneBucket::User(user) => write!(f, "user {user}"),
            CloneBucket::Team { org } => write!(f, "team of {org}"),
            CloneBucket::Direct(owner) => write!(f, "{owner}"),
        }
    }
}

/// Identifies one repository's results directory: `results/<owner>/<repo>/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoKey {
    pub owner: String,
    pub repo: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// One tool's raw result file for one repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub repo: RepoKey,
    pub tool: ToolName,
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.repo, self.tool)
    }
}

#[derive(Debug, Clone)]
pub struct ScratchLayout {
    root: PathBuf,
}

impl ScratchLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.join("repos")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    /// Create the fixed top-level directories
    pub fn ensure_base_dirs(&self) -> Result<()> {
        let repos = self.repos_dir();
        for dir in [
            repos.join("org"),
            repos.join("team"),
            repos.join("users"),
            self.results_dir(),
        ] {
            create_private_dir(&dir)
                .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Clone destination for `name` within `bucket`
    pub fn clone_dir(&self, bucket: &CloneBucket, name: &str) -> Result<PathBuf, ScratchError> {
        let repos = self.repos_dir();
        let base = match bucket {
            CloneBucket::Org(org) => repos.join("org").join(segment(org)?),
            CloneBucket::User(user) => repos.join("users").join(segment(user)?),
            CloneBucket::Team { .. } => repos.join("team"),
            CloneBucket::Direct(owner) => repos.join(segment(owner)?),
        };
        Ok(base.join(segment(name)?))
    }

    pub fn repo_results_dir(&self, repo: &RepoKey) -> Result<PathBuf, ScratchError> {
        Ok(self
            .results_dir()
            .join(segment(&repo.owner)?)
            .join(segment(&repo.repo)?))
    }

    pub fn result_file(&self, key: &ResultKey) -> Result<PathBuf, ScratchError> {
        Ok(self
            .repo_results_dir(&key.repo)?
            .join(key.tool.result_file_name()))
    }

    /// Find the clone a results directory belongs to.
    ///
    /// Results only record `<owner>/<repo>`, so the candidate buckets are
    /// probed in order: org, user, team, then direct.
    pub fn locate_clone(&self, repo: &RepoKey) -> Option<PathBuf> {
        let candidates = [
            self.clone_dir(&CloneBucket::Org(repo.owner.clone()), &repo.repo),
            self.clone_dir(&CloneBucket::User(repo.owner.clone()), &repo.repo),
            self.clone_dir(&CloneBucket::Team { org: repo.owner.clone() }, &repo.repo),
            self.clone_dir(&CloneBucket::Direct(repo.owner.clone()), &repo.repo),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
    }

    /// Every `results/<owner>/<repo>` directory, sorted by owner then repo.
    pub fn result_repos(&self) -> Result<Vec<RepoKey>> {
        let results = self.results_dir();
        let mut repos = Vec::new();
        if !results.is_dir() {
            return Ok(repos);
        }

        for owner in sorted_dir_names(&results)? {
            for repo in sorted_dir_names(&results.join(&owner))? {
                repos.push(RepoKey::new(owner.clone(), repo));
            }
        }
        Ok(repos)
    }
}

fn sorted_dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Create a directory (and parents) readable only by the current user
pub fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}
