use lazy_static::lazy_static;
use regex::Regex;

use super::{Target, TargetKind};
use crate::scratch::CloneBucket;

lazy_static! {
    static ref HTTPS_URL: Regex =
        Regex::new(r"^https://(?P<host>[^/]+)/(?P<owner>[^/]+)/(?P<name>[^/]+?)(?:\.git)?/?$")
            .expect("valid HTTPS URL pattern");
    static ref SSH_URL: Regex =
        Regex::new(r"^git@(?P<host>[^:]+):(?P<owner>[^/]+)/(?P<name>[^/]+?)(?:\.git)?$")
            .expect("valid SSH URL pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    Https,
    Ssh,
}

/// A repository or gist URL given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitUrl {
    pub kind: TargetKind,
    pub scheme: UrlScheme,
    pub host: String,
    pub owner: String,
    pub name: String,
    pub url: String,
}

/// Parse `https://host/owner/name[.git]` or `git@host:owner/name[.git]`.
/// For gists the "name" is the gist id.
pub fn parse_explicit_url(url: &str, kind: TargetKind) -> Option<ExplicitUrl> {
    let url = url.trim();
    let (scheme, captures) = if let Some(captures) = HTTPS_URL.captures(url) {
        (UrlScheme::Https, captures)
    } else {
        (UrlScheme::Ssh, SSH_URL.captures(url)?)
    };

    Some(ExplicitUrl {
        kind,
        scheme,
        host: captures["host"].to_string(),
        owner: captures["owner"].to_string(),
        name: captures["name"].to_string(),
        url: url.to_string(),
    })
}

impl ExplicitUrl {
    pub fn is_github_com(&self) -> bool {
        self.host == "github.com" || self.host == "gist.github.com"
    }

    fn ssh_form(&self) -> String {
        match (self.kind, self.scheme) {
            (_, UrlScheme::Ssh) => self.url.clone(),
            (TargetKind::Repo, UrlScheme::Https) => {
                format!("git@{}:{}/{}.git", self.host, self.owner, self.name)
            }
            (TargetKind::Gist, UrlScheme::Https) => format!("git@{}:{}.git", self.host, self.name),
        }
    }

    /// Build the single target of a repo/gist run. With an enterprise host an
    /// HTTPS URL is rewritten to `git@host:owner/name`.
    pub fn into_target(self, enterprise: bool) -> Target {
        let ssh_url = if enterprise && self.scheme == UrlScheme::Https {
            format!("git@{}:{}/{}", self.host, self.owner, self.name)
        } else {
            self.ssh_form()
        };
        let clone_url = match self.scheme {
            UrlScheme::Https => self.url.clone(),
            UrlScheme::Ssh => ssh_url.clone(),
        };
        Target {
            kind: self.kind,
            clone_url,
            ssh_url,
            display_name: self.name,
            bucket: CloneBucket::Direct(self.owner),
            is_fork: false,
        }
    }
}
