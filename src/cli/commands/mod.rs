//! Command implementations for the reposweep CLI

use anyhow::Result;
use std::path::Path;

use super::{GlobalArgs, Output, SetupError};
use crate::config::SweepConfig;
use crate::report::{Aggregator, MergePolicy, ReportMode};
use crate::scratch::ScratchLayout;
use crate::tools::ToolSelection;

pub mod config;
pub mod report;
pub mod scan;
pub mod version;

/// Load the layered configuration. `overrides` carries only the flags the
/// operator set; `--scratch-dir` is folded in here for every command.
pub(crate) fn load_config(global: &GlobalArgs, overrides: serde_json::Value) -> Result<SweepConfig, SetupError> {
    if let Some(path) = &global.config {
        if !path.exists() {
            return Err(SetupError::ConfigNotFound(path.clone()));
        }
    }

    let mut overrides = overrides;
    if let (Some(scratch), Some(map)) = (&global.scratch_dir, overrides.as_object_mut()) {
        map.insert(
            "scratch".to_string(),
            serde_json::json!({ "root": scratch }),
        );
    }

    SweepConfig::load(global.config.as_deref(), Some(overrides))
        .map_err(|e| SetupError::InvalidConfig(format!("{e:#}")))
}

/// Aggregate the scratch tree into the configured report
pub(crate) fn write_report(
    config: &SweepConfig,
    tools: ToolSelection,
    output: &Output,
) -> Result<()> {
    let mode = ReportMode::from_merge_flag(config.report.merge);
    let aggregator = Aggregator::new(
        ScratchLayout::new(&config.scratch.root),
        tools.tools(),
        MergePolicy::from_cross_tool_dedup(config.report.cross_tool_dedup),
    );

    let destination: &Path = &config.report.output;
    output.step(&format!("Writing report to {}", destination.display()));
    let summary = aggregator.write(mode, destination)?;

    match mode {
        ReportMode::MergedJson => output.success(&format!(
            "{} repositories with findings written to {}",
            summary.repositories,
            destination.display()
        )),
        ReportMode::ConcatenatedText => output.success(&format!(
            "{} result blocks from {} repositories written to {}",
            summary.blocks,
            summary.repositories,
            destination.display()
        )),
    }
    Ok(())
}
