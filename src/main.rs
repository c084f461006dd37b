use clap::Parser;
use std::process::ExitCode;

use reposweep::cli::{Cli, Output, SETUP_EXIT_CODE, SetupError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.verbose > 0, cli.quiet);

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.error(&format!("{e:#}"));
            if e.downcast_ref::<SetupError>().is_some() {
                ExitCode::from(SETUP_EXIT_CODE as u8)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
