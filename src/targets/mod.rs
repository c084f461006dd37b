//! Clone targets and where they come from
//!
//! A [`Target`] is one repository or gist to clone and scan. Targets are
//! produced by a [`TargetDirectory`] (the GitHub listing service) or parsed
//! from an explicit URL, and consumed once by the clone dispatcher.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::scratch::CloneBucket;

mod github;
mod url;

pub use github::{GhDirectory, enterprise_host};
pub use url::{ExplicitUrl, UrlScheme, parse_explicit_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Repo,
    Gist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetKind,
    pub clone_url: String,
    pub ssh_url: String,
    /// Repository name or gist id; the clone directory name
    pub display_name: String,
    pub bucket: CloneBucket,
    pub is_fork: bool,
}

/// Which remote to clone from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    pub private_only: bool,
    pub enterprise: bool,
}

impl UrlPolicy {
    /// SSH on an enterprise host, or for repositories when restricted to
    /// private ones (the operator's key authenticates); HTTPS otherwise.
    /// Gists keep their HTTPS pull URL in private-only runs.
    pub fn select<'a>(&self, target: &'a Target) -> &'a str {
        let private_repo = self.private_only && target.kind == TargetKind::Repo;
        if private_repo || self.enterprise {
            &target.ssh_url
        } else {
            &target.clone_url
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository descriptor as listed by the directory
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepo {
    pub name: String,
    pub clone_url: String,
    pub ssh_url: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub private: bool,
    pub owner: Owner,
}

/// Gist descriptor as listed by the directory
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteGist {
    pub id: String,
    pub git_pull_url: String,
    #[serde(default)]
    pub owner: Option<Owner>,
}

impl Target {
    pub fn from_repo(repo: RemoteRepo, bucket: CloneBucket) -> Self {
        Self {
            kind: TargetKind::Repo,
            clone_url: repo.clone_url,
            ssh_url: repo.ssh_url,
            display_name: repo.name,
            bucket,
            is_fork: repo.fork,
        }
    }

    /// Gists list only an HTTPS pull URL; the SSH form is derived from the
    /// host: `git@gist.github.com:<id>.git` on github.com,
    /// `git@<host>:gist/<id>.git` on enterprise hosts.
    pub fn from_gist(gist: RemoteGist, bucket: CloneBucket, enterprise_host: Option<&str>) -> Self {
        let ssh_url = match enterprise_host {
            Some(host) => format!("git@{}:gist/{}.git", host, gist.id),
            None => format!("git@gist.github.com:{}.git", gist.id),
        };
        Self {
            kind: TargetKind::Gist,
            clone_url: gist.git_pull_url,
            ssh_url,
            display_name: gist.id,
            bucket,
            is_fork: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("GitHub API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("GitHub rejected the token: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unable to find the team '{team}' in {org}; perhaps the token owner is not a member?")]
    TeamNotFound { team: String, org: String },

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listing {endpoint} failed: {message}")]
    Failed { endpoint: String, message: String },

    #[error("could not decode listing of {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The directory/listing service. Every call is attempted once.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    async fn org_repos(&self, org: &str, private_only: bool) -> Result<Vec<RemoteRepo>, EnumerationError>;

    /// Public repositories of `user`, or with `private_only` the private
    /// repositories visible to the token
    async fn user_repos(&self, user: &str, private_only: bool) -> Result<Vec<RemoteRepo>, EnumerationError>;

    async fn user_gists(&self, user: &str) -> Result<Vec<RemoteGist>, EnumerationError>;

    async fn org_members(&self, org: &str) -> Result<Vec<String>, EnumerationError>;

    async fn team_repos(&self, org: &str, team_name: &str) -> Result<Vec<RemoteRepo>, EnumerationError>;

    async fn authenticated_login(&self) -> Result<String, EnumerationError>;

    /// Repositories owned by the token owner
    async fn owned_repos(&self) -> Result<Vec<RemoteRepo>, EnumerationError>;
}

/// Repository names to leave out of a run, as glob patterns
#[derive(Debug, Clone)]
pub struct SkipList {
    patterns: Vec<String>,
    set: GlobSet,
}

impl SkipList {
    pub fn new(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            builder.add(Glob::new(pattern)?);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, fork: bool) -> RemoteRepo {
        RemoteRepo {
            name: name.to_string(),
            clone_url: format!("https://github.com/acme/{name}.git"),
            ssh_url: format!("git@github.com:acme/{name}.git"),
            fork,
            private: false,
            owner: Owner {
                login: "acme".to_string(),
            },
        }
    }

    #[test]
    fn test_url_policy() {
        let target = Target::from_repo(repo("api", false), CloneBucket::Org("acme".into()));

        assert_eq!(UrlPolicy::default().select(&target), "https://github.com/acme/api.git");
        let private = UrlPolicy {
            private_only: true,
            enterprise: false,
        };
        assert_eq!(private.select(&target), "git@github.com:acme/api.git");
        let enterprise = UrlPolicy {
            private_only: false,
            enterprise: true,
        };
        assert_eq!(enterprise.select(&target), "git@github.com:acme/api.git");
    }

    #[test]
    fn test_gists_clone_over_https_when_private_only() {
        let gist = RemoteGist {
            id: "81963f27".to_string(),
            git_pull_url: "https://gist.github.com/81963f27.git".to_string(),
            owner: None,
        };
        let private = UrlPolicy {
            private_only: true,
            enterprise: false,
        };
        let target = Target::from_gist(gist.clone(), CloneBucket::User("octo".into()), None);
        assert_eq!(private.select(&target), "https://gist.github.com/81963f27.git");

        let enterprise = UrlPolicy {
            private_only: true,
            enterprise: true,
        };
        let target = Target::from_gist(gist, CloneBucket::User("octo".into()), Some("git.corp.example"));
        assert_eq!(enterprise.select(&target), "git@git.corp.example:gist/81963f27.git");
    }

    #[test]
    fn test_gist_ssh_url() {
        let gist = RemoteGist {
            id: "81963f27".to_string(),
            git_pull_url: "https://gist.github.com/81963f27.git".to_string(),
            owner: None,
        };
        let target = Target::from_gist(gist.clone(), CloneBucket::User("octo".into()), None);
        assert_eq!(target.kind, TargetKind::Gist);
        assert_eq!(target.display_name, "81963f27");
        assert_eq!(target.ssh_url, "git@gist.github.com:81963f27.git");

        let target = Target::from_gist(gist, CloneBucket::User("octo".into()), Some("git.corp.example"));
        assert_eq!(target.ssh_url, "git@git.corp.example:gist/81963f27.git");
    }

    #[test]
    fn test_remote_repo_decodes_listing_fields() {
        let listed: RemoteRepo = serde_json::from_str(
            r#"{"name":"api","clone_url":"https://github.com/acme/api.git",
                "ssh_url":"git@github.com:acme/api.git","fork":true,"private":false,
                "owner":{"login":"acme","id":1},"stargazers_count":3}"#,
        )
        .unwrap();
        assert!(listed.fork);
        assert_eq!(listed.owner.login, "acme");
    }

    #[test]
    fn test_skip_list() {
        let skip = SkipList::new(&["legacy-*".to_string(), " docs ".to_string(), String::new()]).unwrap();
        assert!(!skip.is_empty());
        assert!(skip.matches("legacy-billing"));
        assert!(skip.matches("docs"));
        assert!(!skip.matches("api"));

        assert!(!SkipList::empty().matches("anything"));
        assert!(SkipList::new(&["[".to_string()]).is_err());
    }
}
