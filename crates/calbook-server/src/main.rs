//! calbook CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use calbook_core::{TracingConfig, init_tracing};
use calbook_server::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.json_logs {
        let config = TracingConfig::service();
        if cli.debug { config.with_level(Level::DEBUG) } else { config }
    } else if cli.debug {
        TracingConfig::development()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
