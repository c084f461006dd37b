use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use super::{load_config, write_report};
use crate::cli::GlobalArgs;
use crate::config::overrides::prune_unset;
use crate::tools::ToolSelection;

#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Write one merged JSON report instead of concatenated raw output
    #[arg(long)]
    pub merge_output: bool,

    /// Tools whose results are reported
    #[arg(long, value_enum, default_value_t = ToolSelection::All)]
    pub tool: ToolSelection,

    /// Report file
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Deduplicate finding strings across tools in the merged report
    #[arg(long)]
    pub dedup_across_tools: bool,
}

pub async fn execute(args: ReportArgs, global: &GlobalArgs) -> Result<()> {
    let output = global.output();
    let overrides = prune_unset(json!({
        "report": {
            "output": args.output,
            "merge": args.merge_output.then_some(true),
            "cross_tool_dedup": args.dedup_across_tools.then_some(true),
        },
    }));
    let config = load_config(global, overrides)?;

    output.verbose(&format!("Reading results under {}", config.scratch.root.display()));
    write_report(&config, args.tool, &output)
}
