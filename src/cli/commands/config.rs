use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::load_config;
use crate::cli::GlobalArgs;
use crate::config::SweepConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration as TOML
    Show {
        /// Only the built-in defaults
        #[arg(long)]
        defaults: bool,
    },
}

pub async fn execute(args: ConfigArgs, global: &GlobalArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show { defaults } => {
            let config = if defaults {
                SweepConfig::defaults()?
            } else {
                load_config(global, serde_json::json!({}))?
            };
            print!("{}", render(&config)?);
        }
    }
    Ok(())
}

fn render(config: &SweepConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}
