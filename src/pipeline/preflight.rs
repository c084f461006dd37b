use thiserror::Error;

use super::Selector;
use crate::targets::{EnumerationError, TargetDirectory, TargetKind, parse_explicit_url};

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("the token belongs to {login}, not {user}; only the token owner's private repositories can be listed")]
    TokenOwnerMismatch { login: String, user: String },

    #[error("{repo} is not owned by the token owner {login}")]
    NotOwned { repo: String, login: String },

    #[error("{org} has no private repositories visible to this token")]
    NoPrivateRepos { org: String },

    #[error("cannot parse repository URL {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

/// Ownership checks that need the directory, run before any job.
/// Only private-only runs are checked.
pub async fn preflight(
    directory: &dyn TargetDirectory,
    selector: &Selector,
    private_only: bool,
) -> Result<(), PreflightError> {
    if !private_only {
        return Ok(());
    }

    match selector {
        Selector::User(user) => {
            let login = directory.authenticated_login().await?;
            if !login.eq_ignore_ascii_case(user) {
                return Err(PreflightError::TokenOwnerMismatch {
                    login,
                    user: user.clone(),
                });
            }
        }
        Selector::RepoUrl(url) => {
            let parsed = parse_explicit_url(url, TargetKind::Repo)
                .ok_or_else(|| PreflightError::InvalidUrl(url.clone()))?;
            let owned = directory.owned_repos().await?;
            let found = owned.iter().any(|repo| {
                repo.name == parsed.name && repo.owner.login.eq_ignore_ascii_case(&parsed.owner)
            });
            if !found {
                let login = directory.authenticated_login().await?;
                return Err(PreflightError::NotOwned {
                    repo: format!("{}/{}", parsed.owner, parsed.name),
                    login,
                });
            }
        }
        Selector::Org { org, .. } => {
            if directory.org_repos(org, true).await?.is_empty() {
                return Err(PreflightError::NoPrivateRepos { org: org.clone() });
            }
        }
        Selector::GistUrl(_) => {}
    }

    Ok(())
}
