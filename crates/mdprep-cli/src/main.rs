mod cli;
mod commands;
mod error;
mod fetch;
mod logging;
mod progress;

use crate::cli::Cli;
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    info!("🚀 mdprep v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = commands::run::run(cli).await;

    match &result {
        Ok(_) => {
            info!("✅ Pipeline completed successfully.");
        }
        Err(e) => {
            error!("❌ Pipeline failed: {}", e);
        }
    }

    result
}
