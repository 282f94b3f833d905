use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use brieflow::cli::{self, Cli};
use brieflow::logging::init_logging;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;
    init_logging(&config.logging)?;

    let succeeded = cli::execute(cli.command, config).await?;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
