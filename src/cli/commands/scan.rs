use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_config, write_report};
use crate::cli::GlobalArgs;
use crate::cli::validate::{
    SelectorFlags, SetupError, check_entropy, check_programs, check_selector_urls, check_ssh_key,
    require_token, resolve_selector,
};
use crate::config::SweepConfig;
use crate::config::overrides::prune_unset;
use crate::git::GitCli;
use crate::parallel::ConcurrencyLimiter;
use crate::pipeline::{PreflightError, Selector, Sweep, SweepOptions, SweepReport, preflight};
use crate::scratch::ScratchLayout;
use crate::targets::{GhDirectory, SkipList, UrlPolicy, enterprise_host};
use crate::tools::{RepoSupervisor, ScanTool, ToolName, ToolSelection, TruffleHog};

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Scan every repository of an organization (and, unless --org-only, of its members)
    #[arg(long, value_name = "ORG")]
    pub org: Option<String>,

    /// Scan the repositories and gists of a user
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Scan a single repository
    #[arg(long, value_name = "URL")]
    pub repo_url: Option<String>,

    /// Scan a single gist
    #[arg(long, value_name = "URL")]
    pub gist_url: Option<String>,

    /// Also scan the repositories granted to this team (requires --org)
    #[arg(long, value_name = "NAME")]
    pub team: Option<String>,

    /// Skip organization members' repositories and gists (requires --org)
    #[arg(long)]
    pub org_only: bool,

    /// Clone forked repositories too
    #[arg(long)]
    pub clone_forks: bool,

    /// Only private repositories, cloned over SSH
    #[arg(long)]
    pub private_only: bool,

    /// Base URL of a GitHub Enterprise instance
    #[arg(long, value_name = "URL")]
    pub enterprise_url: Option<String>,

    /// GitHub token used for listing
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Tools to run
    #[arg(long, value_enum, default_value_t = ToolSelection::All)]
    pub tool: ToolSelection,

    /// Enable truffleHog's entropy checks
    #[arg(long)]
    pub thog_entropy: bool,

    /// Write one merged JSON report instead of concatenated raw output
    #[arg(long)]
    pub merge_output: bool,

    /// Report file
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum clone/scan subprocesses in flight
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Repository names (glob patterns) to leave out, comma separated
    #[arg(long, value_delimiter = ',', value_name = "PATTERNS")]
    pub skip: Vec<String>,

    /// Give up on a clone or scan job after this many seconds
    #[arg(long, value_name = "SECS")]
    pub job_timeout: Option<u64>,

    /// Deduplicate finding strings across tools in the merged report
    #[arg(long)]
    pub dedup_across_tools: bool,
}

impl ScanArgs {
    /// The flags that override configuration, and only those that were set
    fn overrides(&self) -> serde_json::Value {
        let set = |flag: bool| flag.then_some(true);
        prune_unset(json!({
            "general": {
                "threads": self.threads,
                "job_timeout_secs": self.job_timeout,
            },
            "github": { "enterprise_url": self.enterprise_url },
            "tools": { "trufflehog": { "entropy": set(self.thog_entropy) } },
            "report": {
                "output": self.output,
                "merge": set(self.merge_output),
                "cross_tool_dedup": set(self.dedup_across_tools),
            },
            "targets": {
                "clone_forks": set(self.clone_forks),
                "org_only": set(self.org_only),
                "private_only": set(self.private_only),
                "skip": self.skip,
            },
        }))
    }

    fn selector_flags(&self, org_only: bool) -> SelectorFlags {
        SelectorFlags {
            org: self.org.clone(),
            user: self.user.clone(),
            repo_url: self.repo_url.clone(),
            gist_url: self.gist_url.clone(),
            team: self.team.clone(),
            org_only,
        }
    }
}

/// A validated scan, ready to run
pub(crate) struct ScanPlan {
    pub config: SweepConfig,
    pub token: String,
    pub selector: Selector,
    pub tools: ToolSelection,
    pub skip: SkipList,
}

/// Checks that need no network: everything up to and including the
/// program lookup.
pub(crate) fn plan(args: &ScanArgs, global: &GlobalArgs) -> Result<ScanPlan, SetupError> {
    let config = load_config(global, args.overrides())?;
    let token = require_token(args.token.as_deref())?;
    let selector = resolve_selector(args.selector_flags(config.targets.org_only))?;

    check_entropy(args.thog_entropy, args.tool)?;
    let private_only = config.targets.private_only;
    let enterprise = config.enterprise();
    check_selector_urls(&selector, private_only, enterprise)?;
    check_ssh_key(&config.ssh_key_path(), private_only || enterprise)?;

    let skip = SkipList::new(&config.targets.skip)
        .map_err(|e| SetupError::InvalidSkipPattern(e.to_string()))?;

    let mut programs = vec![(config.git.program.as_path(), "git")];
    let needs_directory = matches!(selector, Selector::Org { .. } | Selector::User(_)) || private_only;
    if needs_directory {
        programs.push((config.github.gh_program.as_path(), "GitHub CLI"));
    }
    if args.tool.includes(ToolName::TruffleHog) {
        programs.push((config.tools.trufflehog.program.as_path(), "truffleHog"));
    }
    if args.tool.includes(ToolName::RepoSupervisor) {
        programs.push((config.tools.repo_supervisor.program.as_path(), "repo-supervisor"));
    }
    check_programs(&programs)?;

    Ok(ScanPlan {
        config,
        token,
        selector,
        tools: args.tool,
        skip,
    })
}

fn scan_tools(config: &SweepConfig, selection: ToolSelection) -> Vec<Arc<dyn ScanTool>> {
    selection
        .tools()
        .into_iter()
        .map(|tool| -> Arc<dyn ScanTool> {
            match tool {
                ToolName::TruffleHog => Arc::new(TruffleHog {
                    program: config.tools.trufflehog.program.clone(),
                    rules: config.tools.trufflehog.rules.clone(),
                    entropy: config.tools.trufflehog.entropy,
                    // Only the merged report parses truffleHog's output
                    json: config.report.merge,
                }),
                ToolName::RepoSupervisor => Arc::new(RepoSupervisor {
                    program: config.tools.repo_supervisor.program.clone(),
                }),
            }
        })
        .collect()
}

pub async fn execute(args: ScanArgs, global: &GlobalArgs) -> Result<()> {
    let output = global.output();
    let plan = plan(&args, global)?;
    let config = &plan.config;

    let layout = ScratchLayout::new(&config.scratch.root);
    layout.ensure_base_dirs()?;

    let mut directory = GhDirectory::new(&config.github.gh_program, plan.token.as_str());
    if config.enterprise() {
        directory = directory.with_enterprise_url(&config.github.enterprise_url);
    }

    let private_only = config.targets.private_only;
    preflight(&directory, &plan.selector, private_only)
        .await
        .map_err(|e| match e {
            PreflightError::Enumeration(e) => anyhow::Error::new(e),
            other => anyhow::Error::new(SetupError::Preflight(other)),
        })?;

    let options = SweepOptions {
        selector: plan.selector.clone(),
        url_policy: UrlPolicy {
            private_only,
            enterprise: config.enterprise(),
        },
        clone_forks: config.targets.clone_forks,
        skip: plan.skip.clone(),
        reuse_existing: config.scratch.reuse_existing_clones,
        job_deadline: config.job_deadline(),
        enterprise_host: enterprise_host(&config.github.enterprise_url),
        progress: output.progress_mode(),
    };

    let sweep = Sweep::new(
        ConcurrencyLimiter::new(config.threads()),
        Arc::new(directory),
        Arc::new(GitCli::new(&config.git.program)),
        scan_tools(config, plan.tools),
        layout,
        options,
    );

    output.step(&format!(
        "Sweeping {} with {} ({} jobs at a time)",
        describe(&plan.selector),
        plan.tools.tools().iter().map(ToString::to_string).collect::<Vec<_>>().join(" + "),
        sweep.limiter().capacity()
    ));
    output.verbose(&format!("Scratch tree: {}", config.scratch.root.display()));

    let report = sweep.run().await.context("Target enumeration failed")?;
    summarize(&report, &output);

    write_report(config, plan.tools, &output)
}

fn describe(selector: &Selector) -> String {
    match selector {
        Selector::Org { org, team: Some(team), .. } => format!("organization {org} (team {team})"),
        Selector::Org { org, .. } => format!("organization {org}"),
        Selector::User(user) => format!("user {user}"),
        Selector::RepoUrl(url) | Selector::GistUrl(url) => url.clone(),
    }
}

fn summarize(report: &SweepReport, output: &crate::cli::Output) {
    output.summary_stats("Targets enumerated", report.targets);
    output.summary_stats("Cloned", report.clone.cloned.len());
    output.summary_stats("Forks skipped", report.clone.skipped_forks.len());
    output.summary_stats("Skip-listed", report.clone.skipped.len());
    output.summary_stats("Scans completed", report.scan.completed.len());

    if !report.clone.failed.is_empty() {
        output.warning(&format!("{} clones failed", report.clone.failed.len()));
        for (target, error) in &report.clone.failed {
            output.verbose(&format!("{}: {}", target.display_name, error));
        }
    }
    if !report.scan.failed.is_empty() {
        output.warning(&format!("{} scans failed", report.scan.failed.len()));
        for (key, error) in &report.scan.failed {
            output.verbose(&format!("{key}: {error}"));
        }
    }
}
