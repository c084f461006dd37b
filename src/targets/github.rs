use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{EnumerationError, Owner, RemoteGist, RemoteRepo, TargetDirectory};

#[derive(Debug, Deserialize)]
struct Team {
    name: String,
    slug: String,
}

/// GitHub listings through the `gh` CLI.
///
/// `gh api --paginate` follows the Link headers itself, so every endpoint
/// here is fully paged. The token travels in the environment, never on the
/// command line.
#[derive(Debug, Clone)]
pub struct GhDirectory {
    program: PathBuf,
    token: String,
    hostname: Option<String>,
}

impl GhDirectory {
    pub fn new(program: impl Into<PathBuf>, token: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            token: token.into(),
            hostname: None,
        }
    }

    /// Talk to a GitHub Enterprise host instead of github.com
    pub fn with_enterprise_url(mut self, enterprise_url: &str) -> Self {
        self.hostname = enterprise_host(enterprise_url);
        self
    }

    async fn api(&self, endpoint: &str, paginate: bool) -> Result<Vec<u8>, EnumerationError> {
        let mut command = Command::new(&self.program);
        command.arg("api");
        if paginate {
            command.arg("--paginate");
        }
        if let Some(host) = &self.hostname {
            command.arg("--hostname").arg(host);
        }
        command
            .arg(endpoint)
            .env("GH_TOKEN", &self.token)
            .env("GH_ENTERPRISE_TOKEN", &self.token)
            .env("GH_PROMPT_DISABLED", "1")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!("Listing {}", endpoint);
        let output = command
            .output()
            .await
            .map_err(|source| EnumerationError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(endpoint, stderr.trim()));
        }
        Ok(output.stdout)
    }

    async fn list<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, EnumerationError> {
        let body = self.api(endpoint, true).await?;
        decode_pages(endpoint, &body)
    }
}

/// `gh api --paginate` prints one JSON array per page back to back
pub(crate) fn decode_pages<T: DeserializeOwned>(
    endpoint: &str,
    body: &[u8],
) -> Result<Vec<T>, EnumerationError> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_slice(body).into_iter::<Vec<T>>() {
        let page = page.map_err(|source| EnumerationError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;
        items.extend(page);
    }
    Ok(items)
}

pub(crate) fn classify_failure(endpoint: &str, stderr: &str) -> EnumerationError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("rate limit") {
        EnumerationError::RateLimited(stderr.to_string())
    } else if lowered.contains("bad credentials")
        || stderr.contains("HTTP 401")
        || stderr.contains("HTTP 403")
    {
        EnumerationError::Unauthorized(stderr.to_string())
    } else if stderr.contains("HTTP 404") || lowered.contains("not found") {
        EnumerationError::NotFound(endpoint.to_string())
    } else {
        EnumerationError::Failed {
            endpoint: endpoint.to_string(),
            message: stderr.to_string(),
        }
    }
}

/// Host part of an enterprise base URL such as `https://git.corp.example/`
pub fn enterprise_host(enterprise_url: &str) -> Option<String> {
    let trimmed = enterprise_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    without_scheme
        .split('/')
        .next()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TargetDirectory for GhDirectory {
    async fn org_repos(&self, org: &str, private_only: bool) -> Result<Vec<RemoteRepo>, EnumerationError> {
        let endpoint = if private_only {
            format!("orgs/{org}/repos?type=private&per_page=100")
        } else {
            format!("orgs/{org}/repos?per_page=100")
        };
        self.list(&endpoint).await
    }

    async fn user_repos(&self, user: &str, private_only: bool) -> Result<Vec<RemoteRepo>, EnumerationError> {
        if private_only {
            // Private repositories are only listed for the token owner
            let repos: Vec<RemoteRepo> = self.list("user/repos?visibility=private&per_page=100").await?;
            Ok(repos
                .into_iter()
                .filter(|repo| repo.owner.login.eq_ignore_ascii_case(user))
                .collect())
        } else {
            self.list(&format!("users/{user}/repos?per_page=100")).await
        }
    }

    async fn user_gists(&self, user: &str) -> Result<Vec<RemoteGist>, EnumerationError> {
        self.list(&format!("users/{user}/gists?per_page=100")).await
    }

    async fn org_members(&self, org: &str) -> Result<Vec<String>, EnumerationError> {
        let members: Vec<Owner> = self.list(&format!("orgs/{org}/members?per_page=100")).await?;
        Ok(members.into_iter().map(|member| member.login).collect())
    }

    async fn team_repos(&self, org: &str, team_name: &str) -> Result<Vec<RemoteRepo>, EnumerationError> {
        let teams: Vec<Team> = self.list(&format!("orgs/{org}/teams?per_page=100")).await?;
        let team = teams
            .into_iter()
            .find(|team| team.name == team_name || team.slug == team_name)
            .ok_or_else(|| EnumerationError::TeamNotFound {
                team: team_name.to_string(),
                org: org.to_string(),
            })?;
        self.list(&format!("orgs/{org}/teams/{}/repos?per_page=100", team.slug))
            .await
    }

    async fn authenticated_login(&self) -> Result<String, EnumerationError> {
        let body = self.api("user", false).await?;
        let owner: Owner = serde_json::from_slice(&body).map_err(|source| EnumerationError::Decode {
            endpoint: "user".to_string(),
            source,
        })?;
        Ok(owner.login)
    }

    async fn owned_repos(&self) -> Result<Vec<RemoteRepo>, EnumerationError> {
        self.list("user/repos?affiliation=owner&per_page=100").await
    }
}
