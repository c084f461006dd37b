use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ScanTool, StdoutTarget, ToolName, reset_result_file, run_tool};
use crate::parallel::JobError;

/// repo-supervisor wrapper script, invoked as `<program> <clone> <result file>`.
/// The script writes the result file itself.
#[derive(Debug, Clone)]
pub struct RepoSupervisor {
    pub program: PathBuf,
}

#[async_trait]
impl ScanTool for RepoSupervisor {
    fn name(&self) -> ToolName {
        ToolName::RepoSupervisor
    }

    async fn scan(&self, clone_dir: &Path, output: &Path) -> Result<(), JobError> {
        // An empty file marks "ran, found nothing" if the script writes nothing
        reset_result_file(output)?;
        let args = vec![
            clone_dir.display().to_string(),
            output.display().to_string(),
        ];
        run_tool(self.name(), &self.program, &args, StdoutTarget::Discard).await
    }
}
