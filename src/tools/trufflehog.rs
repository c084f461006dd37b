use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ScanTool, StdoutTarget, ToolName, run_tool};
use crate::parallel::JobError;

/// truffleHog run in regex mode with its stdout captured as the result file.
#[derive(Debug, Clone)]
pub struct TruffleHog {
    pub program: PathBuf,
    pub rules: PathBuf,
    /// Also report high-entropy strings
    pub entropy: bool,
    /// Emit one JSON record per line (needed for the merged report)
    pub json: bool,
}

impl TruffleHog {
    pub fn args(&self, clone_dir: &Path) -> Vec<String> {
        let mut args = vec![
            clone_dir.display().to_string(),
            format!("--rules={}", self.rules.display()),
            "--regex".to_string(),
        ];
        if self.json {
            args.push("--json".to_string());
        }
        args.push(if self.entropy {
            "--entropy=True".to_string()
        } else {
            "--entropy=False".to_string()
        });
        args
    }
}

#[async_trait]
impl ScanTool for TruffleHog {
    fn name(&self) -> ToolName {
        ToolName::TruffleHog
    }

    async fn scan(&self, clone_dir: &Path, output: &Path) -> Result<(), JobError> {
        let args = self.args(clone_dir);
        run_tool(
            self.name(),
            &self.program,
            &args,
            StdoutTarget::ResultFile(output),
        )
        .await
    }
}
