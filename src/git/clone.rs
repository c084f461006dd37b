use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::parallel::JobError;
use crate::scratch::create_private_dir;

/// Clone capability: fetch `url` into `destination`.
#[async_trait]
pub trait Cloner: Send + Sync {
    async fn clone_repo(&self, url: &str, destination: &Path) -> Result<(), JobError>;
}

/// Clones with the system git binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl Cloner for GitCli {
    async fn clone_repo(&self, url: &str, destination: &Path) -> Result<(), JobError> {
        if let Some(parent) = destination.parent() {
            create_private_dir(parent)?;
        }

        let output = Command::new(&self.program)
            .arg("clone")
            .arg("--quiet")
            .arg(url)
            .arg(destination)
            // A credential prompt would hold the slot forever
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| JobError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(JobError::ExitStatus {
                program: format!("{} clone {}", self.program.display(), url),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use tempfile::TempDir;

    fn seed_repository(path: &Path) {
        let repo = Repository::init(path).unwrap();
        std::fs::write(path.join("README.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])
            .unwrap();
    }

    #[tokio::test]
    async fn test_clone_local_repository() {
        if which::which("git").is_err() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        seed_repository(&source);

        let destination = temp.path().join("repos/org/acme/source");
        GitCli::default()
            .clone_repo(source.to_str().unwrap(), &destination)
            .await
            .unwrap();

        assert!(destination.join("README.md").is_file());
        assert!(crate::git::is_work_tree(&destination));
    }

    #[tokio::test]
    async fn test_clone_failure_is_reported() {
        if which::which("git").is_err() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let err = GitCli::default()
            .clone_repo(
                temp.path().join("does-not-exist").to_str().unwrap(),
                &temp.path().join("dest"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::ExitStatus { .. }));
    }

    #[tokio::test]
    async fn test_missing_git_binary() {
        let temp = TempDir::new().unwrap();
        let err = GitCli::new("/nonexistent/git-12345")
            .clone_repo("https://example.invalid/repo.git", &temp.path().join("dest"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Launch { .. }));
    }
}
