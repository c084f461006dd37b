//! The sweep: enumerate, clone everything, scan everything
//!
//! ```text
//! TargetDirectory ──► targets ──► CloneDispatcher ══╗ barrier
//!                                                   ║
//!                    ScanDispatcher ◄── clones ◄────╝
//!                          ║ barrier
//!                          ▼
//!                  results/<owner>/<repo>/<tool>  ──► report::Aggregator
//! ```
//!
//! Enumeration for every scope of the run finishes before the first clone
//! job is submitted. Both dispatchers share one [`ConcurrencyLimiter`], so
//! the ceiling holds across phases.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::git::Cloner;
use crate::parallel::ConcurrencyLimiter;
use crate::scratch::{CloneBucket, ScratchLayout};
use crate::targets::{
    EnumerationError, SkipList, Target, TargetDirectory, TargetKind, UrlPolicy, parse_explicit_url,
};
use crate::tools::ScanTool;

pub mod clone;
pub mod preflight;
pub mod scan;

pub use clone::{CloneDispatcher, CloneReport, ClonedRepo};
pub use preflight::{PreflightError, preflight};
pub use scan::{ScanDispatcher, ScanReport};

static PHASE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template(
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
});

/// What a run sweeps. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Org {
        org: String,
        team: Option<String>,
        org_only: bool,
    },
    User(String),
    RepoUrl(String),
    GistUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Silent,
    Visible,
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub selector: Selector,
    pub url_policy: UrlPolicy,
    pub clone_forks: bool,
    pub skip: SkipList,
    pub reuse_existing: bool,
    pub job_deadline: Option<Duration>,
    /// Host of the enterprise instance, when not github.com
    pub enterprise_host: Option<String>,
    pub progress: ProgressMode,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub targets: usize,
    pub clone: CloneReport,
    pub scan: ScanReport,
}

pub struct Sweep {
    limiter: ConcurrencyLimiter,
    directory: Arc<dyn TargetDirectory>,
    cloner: Arc<dyn Cloner>,
    tools: Vec<Arc<dyn ScanTool>>,
    layout: ScratchLayout,
    options: SweepOptions,
}

impl Sweep {
    pub fn new(
        limiter: ConcurrencyLimiter,
        directory: Arc<dyn TargetDirectory>,
        cloner: Arc<dyn Cloner>,
        tools: Vec<Arc<dyn ScanTool>>,
        layout: ScratchLayout,
        options: SweepOptions,
    ) -> Self {
        Self {
            limiter,
            directory,
            cloner,
            tools,
            layout,
            options,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Every target of the run. Any listing failure is fatal.
    pub async fn collect_targets(&self) -> Result<Vec<Target>, EnumerationError> {
        let private_only = self.options.url_policy.private_only;
        let mut targets = Vec::new();

        match &self.options.selector {
            Selector::Org {
                org,
                team,
                org_only,
            } => {
                let bucket = CloneBucket::Org(org.clone());
                for repo in self.directory.org_repos(org, private_only).await? {
                    targets.push(Target::from_repo(repo, bucket.clone()));
                }

                if let Some(team) = team {
                    let bucket = CloneBucket::Team { org: org.clone() };
                    for repo in self.directory.team_repos(org, team).await? {
                        targets.push(Target::from_repo(repo, bucket.clone()));
                    }
                }

                if !org_only {
                    let members = self.directory.org_members(org).await?;
                    tracing::info!("{} has {} members", org, members.len());
                    for member in members {
                        self.collect_user(&member, private_only, &mut targets).await?;
                    }
                }
            }
            Selector::User(user) => self.collect_user(user, private_only, &mut targets).await?,
            Selector::RepoUrl(url) => targets.extend(self.explicit_target(url, TargetKind::Repo)),
            Selector::GistUrl(url) => targets.extend(self.explicit_target(url, TargetKind::Gist)),
        }

        tracing::info!("Enumerated {} targets", targets.len());
        Ok(targets)
    }

    async fn collect_user(
        &self,
        user: &str,
        private_only: bool,
        targets: &mut Vec<Target>,
    ) -> Result<(), EnumerationError> {
        let bucket = CloneBucket::User(user.to_string());
        for repo in self.directory.user_repos(user, private_only).await? {
            targets.push(Target::from_repo(repo, bucket.clone()));
        }
        // Public and secret gists alike, whatever the private-only setting
        for gist in self.directory.user_gists(user).await? {
            targets.push(Target::from_gist(
                gist,
                bucket.clone(),
                self.options.enterprise_host.as_deref(),
            ));
        }
        Ok(())
    }

    fn explicit_target(&self, url: &str, kind: TargetKind) -> Option<Target> {
        let parsed = parse_explicit_url(url, kind);
        if parsed.is_none() {
            tracing::warn!("Could not parse {}", url);
        }
        parsed.map(|parsed| parsed.into_target(self.options.url_policy.enterprise))
    }

    fn phase_bar(&self, message: &str) -> ProgressBar {
        match self.options.progress {
            ProgressMode::Silent => ProgressBar::hidden(),
            ProgressMode::Visible => {
                let bar = ProgressBar::new(0);
                bar.set_style(PHASE_STYLE.clone());
                bar.set_message(message.to_string());
                bar
            }
        }
    }

    /// Enumerate, then clone phase, then scan phase. Per-job failures end
    /// up in the report; only enumeration failures are returned as errors.
    pub async fn run(&self) -> Result<SweepReport, EnumerationError> {
        let targets = self.collect_targets().await?;
        self.run_targets(targets).await
    }

    /// Clone then scan an already enumerated target list
    pub async fn run_targets(&self, targets: Vec<Target>) -> Result<SweepReport, EnumerationError> {
        let target_count = targets.len();

        let bar = self.phase_bar("Cloning");
        let clone_report = CloneDispatcher::new(&self.limiter, Arc::clone(&self.cloner), self.layout.clone())
            .with_url_policy(self.options.url_policy)
            .with_clone_forks(self.options.clone_forks)
            .with_skip_list(self.options.skip.clone())
            .with_reuse_existing(self.options.reuse_existing)
            .with_deadline(self.options.job_deadline)
            .run(targets, Some(&bar))
            .await;
        bar.finish_and_clear();

        let bar = self.phase_bar("Scanning");
        let scan_report = ScanDispatcher::new(&self.limiter, self.tools.clone(), self.layout.clone())
            .with_deadline(self.options.job_deadline)
            .run(&clone_report.cloned, Some(&bar))
            .await;
        bar.finish_and_clear();

        Ok(SweepReport {
            targets: target_count,
            clone: clone_report,
            scan: scan_report,
        })
    }
}
