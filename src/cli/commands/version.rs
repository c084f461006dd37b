use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show detailed version information
    #[arg(short = 'd', long = "detailed")]
    pub detailed: bool,
}

pub async fn execute(args: VersionArgs) -> Result<()> {
    // Set at build time when available
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    println!("reposweep {} ({})", env!("CARGO_PKG_VERSION"), git_sha);
    if args.detailed {
        println!("Rust Edition: 2024");
        println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
        println!("Drives: git, gh, trufflehog, repo-supervisor");
    }
    Ok(())
}
