use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::git::{Cloner, is_work_tree};
use crate::parallel::{ConcurrencyLimiter, JobError, JobKind, PhaseGroup};
use crate::scratch::{RepoKey, ScratchLayout};
use crate::targets::{SkipList, Target, UrlPolicy};

/// A target with a usable work tree in the scratch tree
#[derive(Debug, Clone)]
pub struct ClonedRepo {
    pub target: Target,
    pub path: PathBuf,
    pub repo_key: RepoKey,
    /// Already on disk from an earlier run; no clone job ran
    pub reused: bool,
}

#[derive(Debug, Default)]
pub struct CloneReport {
    pub cloned: Vec<ClonedRepo>,
    pub failed: Vec<(Target, JobError)>,
    pub skipped_forks: Vec<Target>,
    pub skipped: Vec<Target>,
}

impl CloneReport {
    pub fn cloned_paths(&self) -> Vec<&PathBuf> {
        self.cloned.iter().map(|repo| &repo.path).collect()
    }
}

/// Fans clone jobs out through the limiter and waits for all of them.
pub struct CloneDispatcher {
    limiter: ConcurrencyLimiter,
    cloner: Arc<dyn Cloner>,
    layout: ScratchLayout,
    policy: UrlPolicy,
    clone_forks: bool,
    skip: SkipList,
    reuse_existing: bool,
    deadline: Option<Duration>,
}

impl CloneDispatcher {
    pub fn new(limiter: &ConcurrencyLimiter, cloner: Arc<dyn Cloner>, layout: ScratchLayout) -> Self {
        Self {
            limiter: limiter.clone(),
            cloner,
            layout,
            policy: UrlPolicy::default(),
            clone_forks: false,
            skip: SkipList::empty(),
            reuse_existing: false,
            deadline: None,
        }
    }

    pub fn with_url_policy(mut self, policy: UrlPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clone_forks(mut self, clone_forks: bool) -> Self {
        self.clone_forks = clone_forks;
        self
    }

    pub fn with_skip_list(mut self, skip: SkipList) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_reuse_existing(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Clone every accepted target. Returns once every submitted job has
    /// finished; failures are collected, never propagated.
    pub async fn run(&self, targets: Vec<Target>, progress: Option<&ProgressBar>) -> CloneReport {
        let mut report = CloneReport::default();
        let mut group = PhaseGroup::new(&self.limiter, JobKind::Clone, self.deadline);
        let mut destinations = HashSet::new();

        for target in targets {
            if target.is_fork && !self.clone_forks {
                tracing::info!("Skipping fork {}", target.display_name);
                report.skipped_forks.push(target);
                continue;
            }
            if self.skip.matches(&target.display_name) {
                tracing::info!("Skipping {} (skip list)", target.display_name);
                report.skipped.push(target);
                continue;
            }

            let destination = match self.layout.clone_dir(&target.bucket, &target.display_name) {
                Ok(destination) => destination,
                Err(e) => {
                    tracing::warn!("Cannot clone {}: {}", target.display_name, e);
                    report.failed.push((target, e.into()));
                    continue;
                }
            };
            if !destinations.insert(destination.clone()) {
                tracing::debug!("{} is already queued", destination.display());
                continue;
            }

            let repo_key = RepoKey::new(target.bucket.result_owner(), target.display_name.clone());
            if self.reuse_existing && is_work_tree(&destination) {
                tracing::debug!("Reusing existing clone {}", destination.display());
                report.cloned.push(ClonedRepo {
                    target,
                    path: destination,
                    repo_key,
                    reused: true,
                });
                continue;
            }

            let cloner = Arc::clone(&self.cloner);
            let url = self.policy.select(&target).to_string();
            let job_destination = destination.clone();
            group.submit(
                ClonedRepo {
                    target,
                    path: destination,
                    repo_key,
                    reused: false,
                },
                async move { cloner.clone_repo(&url, &job_destination).await },
            );
        }

        if let Some(bar) = progress {
            bar.set_length(group.len() as u64);
        }

        for (cloned, outcome) in group.join(progress).await {
            match outcome {
                Ok(()) => {
                    tracing::info!("Cloned {}", cloned.target.display_name);
                    report.cloned.push(cloned);
                }
                Err(e) => {
                    tracing::warn!("Clone of {} failed: {}", cloned.target.display_name, e);
                    report.failed.push((cloned.target, e));
                }
            }
        }

        report
    }
}
