use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::clone::ClonedRepo;
use crate::parallel::{ConcurrencyLimiter, JobError, JobKind, PhaseGroup};
use crate::scratch::{ResultKey, ScratchLayout, create_private_dir};
use crate::tools::ScanTool;

#[derive(Debug, Default)]
pub struct ScanReport {
    pub completed: Vec<ResultKey>,
    pub failed: Vec<(ResultKey, JobError)>,
    /// Result keys already claimed by another clone in this run
    pub duplicates: usize,
}

/// One scan job per (clone, tool), all through the limiter.
pub struct ScanDispatcher {
    limiter: ConcurrencyLimiter,
    tools: Vec<Arc<dyn ScanTool>>,
    layout: ScratchLayout,
    deadline: Option<Duration>,
}

impl ScanDispatcher {
    pub fn new(limiter: &ConcurrencyLimiter, tools: Vec<Arc<dyn ScanTool>>, layout: ScratchLayout) -> Self {
        Self {
            limiter: limiter.clone(),
            tools,
            layout,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns once every submitted scan job has finished.
    pub async fn run(&self, cloned: &[ClonedRepo], progress: Option<&ProgressBar>) -> ScanReport {
        let mut report = ScanReport::default();
        let mut group = PhaseGroup::new(&self.limiter, JobKind::Scan, self.deadline);
        let mut claimed = HashSet::new();

        for repo in cloned {
            for tool in &self.tools {
                let key = ResultKey {
                    repo: repo.repo_key.clone(),
                    tool: tool.name(),
                };
                if !claimed.insert(key.clone()) {
                    tracing::debug!("{} already scanned from another clone", key);
                    report.duplicates += 1;
                    continue;
                }

                let paths = self
                    .layout
                    .repo_results_dir(&key.repo)
                    .and_then(|dir| Ok((dir, self.layout.result_file(&key)?)));
                let (results_dir, output) = match paths {
                    Ok(paths) => paths,
                    Err(e) => {
                        tracing::warn!("Cannot scan {}: {}", key, e);
                        report.failed.push((key, e.into()));
                        continue;
                    }
                };

                let tool = Arc::clone(tool);
                let clone_dir = repo.path.clone();
                group.submit(key, async move {
                    create_private_dir(&results_dir)?;
                    tool.scan(&clone_dir, &output).await
                });
            }
        }

        if let Some(bar) = progress {
            bar.set_length(group.len() as u64);
        }

        for (key, outcome) in group.join(progress).await {
            match outcome {
                Ok(()) => {
                    tracing::info!("Scanned {}", key);
                    report.completed.push(key);
                }
                Err(e) => {
                    tracing::warn!("Scan {} failed: {}", key, e);
                    if let Ok(output) = self.layout.result_file(&key) {
                        discard_partial_output(&output);
                    }
                    report.failed.push((key, e));
                }
            }
        }

        report
    }
}

/// A failed or timed-out scan leaves an empty result file, never a partial one
fn discard_partial_output(output: &Path) {
    if !output.is_file() {
        return;
    }
    if let Err(e) = std::fs::File::create(output) {
        tracing::warn!("Cannot truncate {}: {}", output.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::{CloneBucket, RepoKey};
    use crate::targets::{Target, TargetKind};
    use crate::tools::ToolName;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct EchoTool {
        name: ToolName,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl ScanTool for EchoTool {
        fn name(&self) -> ToolName {
            self.name
        }

        async fn scan(&self, clone_dir: &Path, output: &Path) -> Result<(), JobError> {
            std::fs::write(output, clone_dir.display().to_string())?;
            if self
                .fail_for
                .is_some_and(|name| clone_dir.ends_with(name))
            {
                return Err(JobError::ExitStatus {
                    program: "echo".into(),
                    status: "exit status: 2".into(),
                    stderr: String::new(),
                });
            }
            Ok(())
        }
    }

    fn cloned(layout: &ScratchLayout, bucket: CloneBucket, name: &str) -> ClonedRepo {
        let path = layout.clone_dir(&bucket, name).unwrap();
        ClonedRepo {
            repo_key: RepoKey::new(bucket.result_owner(), name),
            target: Target {
                kind: TargetKind::Repo,
                clone_url: String::new(),
                ssh_url: String::new(),
                display_name: name.to_string(),
                bucket,
                is_fork: false,
            },
            path,
            reused: false,
        }
    }

    fn tools(fail_for: Option<&'static str>) -> Vec<Arc<dyn ScanTool>> {
        vec![
            Arc::new(EchoTool {
                name: ToolName::TruffleHog,
                fail_for,
            }),
            Arc::new(EchoTool {
                name: ToolName::RepoSupervisor,
                fail_for: None,
            }),
        ]
    }

    #[tokio::test]
    async fn test_one_result_file_per_repo_and_tool() {
        let temp = TempDir::new().unwrap();
        let layout = ScratchLayout::new(temp.path());
        let repos = vec![
            cloned(&layout, CloneBucket::Org("acme".into()), "api"),
            cloned(&layout, CloneBucket::User("octo".into()), "dots"),
        ];

        let dispatcher = ScanDispatcher::new(&ConcurrencyLimiter::new(3), tools(None), layout.clone());
        let report = dispatcher.run(&repos, None).await;

        assert_eq!(report.completed.len(), 4);
        assert!(report.failed.is_empty());
        for (owner, repo) in [("acme", "api"), ("octo", "dots")] {
            for tool in ToolName::ALL {
                let file: PathBuf = layout
                    .result_file(&ResultKey {
                        repo: RepoKey::new(owner, repo),
                        tool,
                    })
                    .unwrap();
                assert!(file.is_file(), "missing {}", file.display());
            }
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let temp = TempDir::new().unwrap();
        let layout = ScratchLayout::new(temp.path());
        let repos = vec![
            cloned(&layout, CloneBucket::Org("acme".into()), "api"),
            cloned(&layout, CloneBucket::Org("acme".into()), "web"),
        ];

        let dispatcher = ScanDispatcher::new(&ConcurrencyLimiter::new(1), tools(Some("web")), layout.clone());
        let report = dispatcher.run(&repos, None).await;

        assert_eq!(report.completed.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.repo.repo, "web");
        assert_eq!(report.failed[0].0.tool, ToolName::TruffleHog);

        // The failed tool wrote before failing; nothing of it may remain
        let failed = layout.result_file(&report.failed[0].0).unwrap();
        assert_eq!(std::fs::metadata(&failed).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_team_and_org_clone_scanned_once() {
        let temp = TempDir::new().unwrap();
        let layout = ScratchLayout::new(temp.path());
        let repos = vec![
            cloned(&layout, CloneBucket::Org("acme".into()), "api"),
            cloned(&layout, CloneBucket::Team { org: "acme".into() }, "api"),
        ];

        let dispatcher = ScanDispatcher::new(&ConcurrencyLimiter::new(2), tools(None), layout);
        let report = dispatcher.run(&repos, None).await;
        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.duplicates, 2);
    }
}
