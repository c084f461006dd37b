//! Result aggregation
//!
//! Runs after both phase barriers. Everything it knows comes from the
//! scratch tree: one directory per repository under `results/`, one raw
//! file per tool inside it. A missing or empty file means the tool found
//! nothing (or never ran); a file that exists but does not parse aborts the
//! report, since an incomplete report is worse than none.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scratch::{RepoKey, ResultKey, ScratchError, ScratchLayout};
use crate::tools::{OutputFamily, ToolName};

pub mod findings;
pub mod parsers;

pub use findings::{MergePolicy, NormalizedFindings};
pub use parsers::{FindingsParser, LineJsonParser, ParseError, ResultMapParser, parser_for};

/// Width of the line closing each repository block in the text report
pub const DELIMITER_WIDTH: usize = 304;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    MergedJson,
    ConcatenatedText,
}

impl ReportMode {
    pub fn from_merge_flag(merge: bool) -> Self {
        if merge {
            ReportMode::MergedJson
        } else {
            ReportMode::ConcatenatedText
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read result file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse result file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("invalid result tree entry: {0}")]
    Scratch(#[from] ScratchError),

    #[error("failed to list result tree: {0:#}")]
    Listing(anyhow::Error),
}

/// One repository in the merged report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryScan {
    pub repository: String,
    #[serde(rename = "stringsFound")]
    pub findings: NormalizedFindings,
}

/// What a report run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub repositories: usize,
    pub blocks: usize,
}

pub struct Aggregator {
    layout: ScratchLayout,
    tools: Vec<ToolName>,
    policy: MergePolicy,
}

impl Aggregator {
    pub fn new(layout: ScratchLayout, tools: Vec<ToolName>, policy: MergePolicy) -> Self {
        Self {
            layout,
            tools,
            policy,
        }
    }

    /// Selected tools in merge order: the result-map family first, so a
    /// path both tools report lists its result-map findings first.
    fn merge_order(&self) -> Vec<ToolName> {
        let mut tools = self.tools.clone();
        tools.sort_by_key(|tool| match tool.output_family() {
            OutputFamily::ResultMap => 0,
            OutputFamily::LineJson => 1,
        });
        tools
    }

    /// Merged findings of every repository with at least one finding,
    /// sorted by owner then repository.
    pub fn collect(&self) -> Result<Vec<RepositoryScan>, ReportError> {
        let repos = self.layout.result_repos().map_err(ReportError::Listing)?;
        let loaded = repos
            .par_iter()
            .map(|repo| self.load_repository(repo))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(loaded.into_iter().flatten().collect())
    }

    /// Load and merge one repository's result files. `None` when nothing
    /// was found.
    pub fn load_repository(&self, repo: &RepoKey) -> Result<Option<RepositoryScan>, ReportError> {
        let clone_dir = self.layout.locate_clone(repo);
        let mut merged = NormalizedFindings::new();

        for tool in self.merge_order() {
            let path = self.layout.result_file(&ResultKey {
                repo: repo.clone(),
                tool,
            })?;
            let Some(raw) = read_result_file(&path)? else {
                continue;
            };
            let parser = parser_for(tool.output_family(), clone_dir.as_deref());
            let findings = parser
                .parse(&raw)
                .map_err(|source| ReportError::Parse {
                    path: path.clone(),
                    source,
                })?;
            merged.merge(findings, self.policy);
        }

        merged.prune();
        if merged.is_empty() {
            return Ok(None);
        }

        Ok(Some(RepositoryScan {
            repository: repository_identifier(repo, clone_dir.as_deref()),
            findings: merged,
        }))
    }

    pub fn write(&self, mode: ReportMode, output: &Path) -> Result<ReportSummary> {
        match mode {
            ReportMode::MergedJson => self.write_merged_json(output),
            ReportMode::ConcatenatedText => self.write_text(output),
        }
    }

    /// One JSON array of `{"repository", "stringsFound"}` records
    pub fn write_merged_json(&self, output: &Path) -> Result<ReportSummary> {
        let scans = self.collect()?;
        let file = File::create(output)
            .with_context(|| format!("Failed to create report {}", output.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &scans).context("Failed to serialize report")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer
            .get_ref()
            .sync_data()
            .with_context(|| format!("Failed to sync report {}", output.display()))?;

        Ok(ReportSummary {
            repositories: scans.len(),
            blocks: scans.len(),
        })
    }

    /// Raw tool output, grouped per tool, one delimited block per repository.
    /// Every result file is read before the report file is touched.
    pub fn write_text(&self, output: &Path) -> Result<ReportSummary> {
        let repos = self.layout.result_repos()?;
        let delimiter = "-".repeat(DELIMITER_WIDTH);
        let mut buffer = Vec::new();
        let mut summary = ReportSummary::default();
        let mut reported = std::collections::BTreeSet::new();

        for tool in &self.tools {
            writeln!(buffer, "Tool: {tool}")?;
            for repo in &repos {
                let path = self.layout.result_file(&ResultKey {
                    repo: repo.clone(),
                    tool: *tool,
                })?;
                let Some(raw) = read_result_file(&path)? else {
                    continue;
                };
                if !has_text_findings(*tool, &raw) {
                    continue;
                }

                writeln!(buffer, "OrgorUser: {} RepoName: {}", repo.owner, repo.repo)?;
                buffer.extend_from_slice(&raw);
                if !raw.ends_with(b"\n") {
                    buffer.push(b'\n');
                }
                writeln!(buffer, "{delimiter}")?;

                summary.blocks += 1;
                reported.insert(repo.clone());
            }
        }

        let mut file = File::create(output)
            .with_context(|| format!("Failed to create report {}", output.display()))?;
        file.write_all(&buffer)?;
        file.sync_data()
            .with_context(|| format!("Failed to sync report {}", output.display()))?;

        summary.repositories = reported.len();
        Ok(summary)
    }
}

/// Contents of a result file, or `None` when it is absent or empty
fn read_result_file(path: &Path) -> Result<Option<Vec<u8>>, ReportError> {
    match std::fs::read(path) {
        Ok(raw) if raw.is_empty() => Ok(None),
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReportError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether a raw result belongs in the text report. Text-mode truffleHog
/// output is not JSON; only blank output or a result map that decodes to
/// nothing is left out.
fn has_text_findings(tool: ToolName, raw: &[u8]) -> bool {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return false;
    }
    match tool.output_family() {
        OutputFamily::ResultMap => ResultMapParser::new(None)
            .parse(raw)
            .map(|findings| !findings.is_empty())
            .unwrap_or(true),
        OutputFamily::LineJson => true,
    }
}

/// The clone's `origin` URL; `owner/repo` when the clone is gone or has no
/// usable remote.
fn repository_identifier(repo: &RepoKey, clone_dir: Option<&Path>) -> String {
    let Some(clone_dir) = clone_dir else {
        tracing::warn!("No clone found for {}; reporting it by name", repo);
        return repo.to_string();
    };
    match crate::git::remote_url(clone_dir) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Could not read the remote of {}: {:#}", clone_dir.display(), e);
            repo.to_string()
        }
    }
}
