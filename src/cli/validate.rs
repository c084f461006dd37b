//! Setup validation
//!
//! Everything here runs before the first job is scheduled. A failure is a
//! [`SetupError`]: the binary prints it and exits with status 2.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::{PreflightError, Selector};
use crate::targets::{TargetKind, UrlScheme, parse_explicit_url};
use crate::tools::{ToolSelection, locate_program};

/// Exit status for setup errors
pub const SETUP_EXIT_CODE: i32 = 2;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("a GitHub token is required (--token or GITHUB_TOKEN)")]
    MissingToken,

    #[error("one of --org, --user, --repo-url or --gist-url is required")]
    NoSelector,

    #[error("only one of --org, --user, --repo-url or --gist-url may be given (got {})", .0.join(", "))]
    ConflictingSelectors(Vec<String>),

    #[error("--thog-entropy needs truffleHog (--tool all or --tool thog)")]
    EntropyWithoutTruffleHog,

    #[error("--team requires --org")]
    TeamWithoutOrg,

    #[error("--org-only requires --org")]
    OrgOnlyWithoutOrg,

    #[error("--private-only cannot be used with --gist-url; gists are public")]
    PrivateOnlyGist,

    #[error("cannot parse {0} as a repository or gist URL")]
    InvalidUrl(String),

    #[error("{host} is not github.com; pass --enterprise-url for GitHub Enterprise hosts")]
    EnterpriseUrlRequired { host: String },

    #[error("SSH URL {0} needs --private-only or --enterprise-url; use the HTTPS URL for public repositories")]
    SshUrlNotAllowed(String),

    #[error("SSH key {} is missing or empty; it is required with --private-only or --enterprise-url", .0.display())]
    MissingSshKey(PathBuf),

    #[error("`{program}` ({purpose}) was not found; install it or set its path in the configuration")]
    ProgramNotFound { program: String, purpose: String },

    #[error("configuration file {} does not exist", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("{0}")]
    InvalidConfig(String),

    #[error("invalid skip pattern: {0}")]
    InvalidSkipPattern(String),

    #[error("{0}")]
    Preflight(PreflightError),
}

pub fn require_token(token: Option<&str>) -> Result<String, SetupError> {
    match token.map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(SetupError::MissingToken),
    }
}

/// The raw selector flags of a scan
#[derive(Debug, Clone, Default)]
pub struct SelectorFlags {
    pub org: Option<String>,
    pub user: Option<String>,
    pub repo_url: Option<String>,
    pub gist_url: Option<String>,
    pub team: Option<String>,
    pub org_only: bool,
}

/// Exactly one selector; `--team` and `--org-only` only with `--org`
pub fn resolve_selector(flags: SelectorFlags) -> Result<Selector, SetupError> {
    let given: Vec<String> = [
        ("--org", flags.org.is_some()),
        ("--user", flags.user.is_some()),
        ("--repo-url", flags.repo_url.is_some()),
        ("--gist-url", flags.gist_url.is_some()),
    ]
    .into_iter()
    .filter(|(_, present)| *present)
    .map(|(name, _)| name.to_string())
    .collect();

    match given.len() {
        0 => return Err(SetupError::NoSelector),
        1 => {}
        _ => return Err(SetupError::ConflictingSelectors(given)),
    }

    if flags.org.is_none() {
        if flags.team.is_some() {
            return Err(SetupError::TeamWithoutOrg);
        }
        if flags.org_only {
            return Err(SetupError::OrgOnlyWithoutOrg);
        }
    }

    let selector = if let Some(org) = flags.org {
        Selector::Org {
            org,
            team: flags.team,
            org_only: flags.org_only,
        }
    } else if let Some(user) = flags.user {
        Selector::User(user)
    } else if let Some(url) = flags.repo_url {
        Selector::RepoUrl(url)
    } else if let Some(url) = flags.gist_url {
        Selector::GistUrl(url)
    } else {
        return Err(SetupError::NoSelector);
    };
    Ok(selector)
}

pub fn check_entropy(entropy: bool, tools: ToolSelection) -> Result<(), SetupError> {
    if entropy && tools == ToolSelection::RepoSupervisor {
        return Err(SetupError::EntropyWithoutTruffleHog);
    }
    Ok(())
}

/// Rules for explicit repo/gist URLs
pub fn check_selector_urls(
    selector: &Selector,
    private_only: bool,
    enterprise: bool,
) -> Result<(), SetupError> {
    let (url, kind) = match selector {
        Selector::RepoUrl(url) => (url, TargetKind::Repo),
        Selector::GistUrl(url) => {
            if private_only {
                return Err(SetupError::PrivateOnlyGist);
            }
            (url, TargetKind::Gist)
        }
        _ => return Ok(()),
    };

    let parsed = parse_explicit_url(url, kind).ok_or_else(|| SetupError::InvalidUrl(url.clone()))?;
    if !parsed.is_github_com() && !enterprise {
        return Err(SetupError::EnterpriseUrlRequired { host: parsed.host });
    }
    if kind == TargetKind::Repo && parsed.scheme == UrlScheme::Ssh && !private_only && !enterprise {
        return Err(SetupError::SshUrlNotAllowed(url.clone()));
    }
    Ok(())
}

/// A usable key must exist when cloning goes over SSH
pub fn check_ssh_key(key: &Path, required: bool) -> Result<(), SetupError> {
    if !required {
        return Ok(());
    }
    match std::fs::metadata(key) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(SetupError::MissingSshKey(key.to_path_buf())),
    }
}

/// Every `(program, purpose)` must resolve on the host
pub fn check_programs(programs: &[(&Path, &str)]) -> Result<(), SetupError> {
    for (program, purpose) in programs {
        if locate_program(program).is_none() {
            return Err(SetupError::ProgramNotFound {
                program: program.display().to_string(),
                purpose: purpose.to_string(),
            });
        }
    }
    Ok(())
}
