//! Secret-detection tools
//!
//! The sweep never looks for secrets itself. Each tool is an external program
//! run against a clone; its raw output lands in the tool's result file and is
//! only interpreted later by the aggregator, according to the tool's
//! [`OutputFamily`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::parallel::JobError;

mod repo_supervisor;
mod trufflehog;

pub use repo_supervisor::RepoSupervisor;
pub use trufflehog::TruffleHog;

#[cfg(test)]
mod tests;

/// Known tools. The result file names are part of the scratch layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolName {
    TruffleHog,
    RepoSupervisor,
}

/// How a tool encodes its findings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFamily {
    /// One JSON record per line: `{"path": .., "stringsFound": [..]}`
    LineJson,
    /// One JSON object: `{"result": {"<path>": [..]}}`
    ResultMap,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::TruffleHog, ToolName::RepoSupervisor];

    pub fn result_file_name(&self) -> &'static str {
        match self {
            ToolName::TruffleHog => "truffleHog",
            ToolName::RepoSupervisor => "repo-supervisor",
        }
    }

    pub fn output_family(&self) -> OutputFamily {
        match self {
            ToolName::TruffleHog => OutputFamily::LineJson,
            ToolName::RepoSupervisor => OutputFamily::ResultMap,
        }
    }

    /// Exit code the tool uses to say "ran fine, found something"
    pub fn findings_exit_code(&self) -> Option<i32> {
        match self {
            ToolName::TruffleHog => Some(1),
            ToolName::RepoSupervisor => None,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.result_file_name())
    }
}

/// Which tools a run drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolSelection {
    #[default]
    All,
    #[value(name = "thog", alias = "trufflehog")]
    #[serde(rename = "thog", alias = "trufflehog")]
    Thog,
    RepoSupervisor,
}

impl ToolSelection {
    pub fn tools(&self) -> Vec<ToolName> {
        match self {
            ToolSelection::All => ToolName::ALL.to_vec(),
            ToolSelection::Thog => vec![ToolName::TruffleHog],
            ToolSelection::RepoSupervisor => vec![ToolName::RepoSupervisor],
        }
    }

    pub fn includes(&self, tool: ToolName) -> bool {
        self.tools().contains(&tool)
    }
}

/// Scan capability: run one tool against one clone, leaving its raw output
/// in `output`. The output file must exist afterwards even when the tool
/// found nothing.
#[async_trait]
pub trait ScanTool: Send + Sync {
    fn name(&self) -> ToolName;

    async fn scan(&self, clone_dir: &Path, output: &Path) -> Result<(), JobError>;
}

/// Where a tool's stdout goes
pub(crate) enum StdoutTarget<'a> {
    /// Redirect stdout into the result file
    ResultFile(&'a Path),
    /// Discard stdout; the tool writes the result file itself
    Discard,
}

/// Run a tool subprocess once and judge its exit status.
pub(crate) async fn run_tool(
    tool: ToolName,
    program: &Path,
    args: &[String],
    stdout: StdoutTarget<'_>,
) -> Result<(), JobError> {
    let program_name = program.display().to_string();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match stdout {
        StdoutTarget::ResultFile(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            command.stdout(Stdio::from(file));
        }
        StdoutTarget::Discard => {
            command.stdout(Stdio::null());
        }
    }

    // `output()` would replace the stdout handle with a pipe
    let child = command.spawn().map_err(|source| JobError::Launch {
        program: program_name.clone(),
        source,
    })?;
    let output = child.wait_with_output().await?;

    let findings_present = tool.findings_exit_code().is_some()
        && output.status.code() == tool.findings_exit_code();
    if output.status.success() || findings_present {
        return Ok(());
    }

    Err(JobError::ExitStatus {
        program: program_name,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Make sure a result file exists and is empty before a tool runs
pub(crate) fn reset_result_file(path: &Path) -> Result<(), JobError> {
    std::fs::File::create(path)?;
    Ok(())
}

/// Resolve a configured program on the host, as `which` does
pub fn locate_program(program: &Path) -> Option<PathBuf> {
    which::which(program).ok()
}
