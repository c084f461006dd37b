//! Configuration for reposweep
//!
//! Settings are layered with figment (see [`core`]): embedded defaults, user
//! and repository config files, an explicit `--config` file, `REPOSWEEP_`
//! environment variables and finally the flags given on the command line.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod core;
pub mod overrides;
pub mod smart_load;

pub use self::core::{DEFAULT_CONFIG, ENV_PREFIX};

/// Effective configuration of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub general: GeneralConfig,
    pub scratch: ScratchConfig,
    pub github: GithubConfig,
    pub git: GitConfig,
    pub tools: ToolsConfig,
    pub report: ReportConfig,
    pub targets: TargetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Limiter capacity shared by clone and scan jobs
    pub threads: usize,

    /// Per-job deadline in seconds; 0 lets jobs run to completion
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub root: PathBuf,
    pub reuse_existing_clones: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Base URL of a GitHub Enterprise instance; empty means github.com
    pub enterprise_url: String,
    pub gh_program: PathBuf,
    pub ssh_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub program: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub trufflehog: TruffleHogConfig,
    pub repo_supervisor: RepoSupervisorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruffleHogConfig {
    pub program: PathBuf,
    pub rules: PathBuf,
    pub entropy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoSupervisorConfig {
    pub program: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output: PathBuf,
    /// Merged JSON instead of concatenated raw output
    pub merge: bool,
    /// Deduplicate finding strings across tools, not only within one
    pub cross_tool_dedup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub clone_forks: bool,
    pub org_only: bool,
    pub private_only: bool,
    /// Glob patterns of repository names to leave out
    pub skip: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            job_timeout_secs: 0,
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp"),
            reuse_existing_clones: true,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enterprise_url: String::new(),
            gh_program: PathBuf::from("gh"),
            ssh_key: "~/.ssh/id_rsa".to_string(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl Default for TruffleHogConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("trufflehog"),
            rules: PathBuf::from("/root/truffleHog/rules.json"),
            entropy: false,
        }
    }
}

impl Default for RepoSupervisorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/root/repo-supervisor/runreposupervisor.sh"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("results.txt"),
            merge: false,
            cross_tool_dedup: false,
        }
    }
}

impl SweepConfig {
    /// Limiter capacity, never below one
    pub fn threads(&self) -> usize {
        self.general.threads.max(1)
    }

    pub fn job_deadline(&self) -> Option<Duration> {
        match self.general.job_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn enterprise(&self) -> bool {
        !self.github.enterprise_url.trim().is_empty()
    }

    /// SSH key path with a leading `~` expanded from `HOME`
    pub fn ssh_key_path(&self) -> PathBuf {
        expand_home(&self.github.ssh_key)
    }
}

pub(crate) fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ if path == "~" => std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    }
}
