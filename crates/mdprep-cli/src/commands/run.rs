use std::path::Path;

use mdprep::core::checkpoint::Extent;
use mdprep::core::mutation::MutationSpec;
use mdprep::core::source::SourceReference;
use mdprep::core::stage::StageId;
use mdprep::engine::cancel::CancellationToken;
use mdprep::engine::config::PipelineConfig;
use mdprep::engine::error::EngineError;
use mdprep::engine::progress::ProgressReporter;
use mdprep::tools::convert::StructureConverter;
use mdprep::tools::gromacs::GromacsToolchain;
use mdprep::tools::mutate::ExternalMutator;
use mdprep::workflows::setup::{self, RunRequest, Toolbox};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::fetch::RcsbFetcher;
use crate::progress::CliProgressHandler;

const DEFAULT_WORKING_DIR: &str = "md_run";

pub async fn run(cli: Cli) -> Result<()> {
    info!("Resolving pipeline configuration from {:?}", &cli.config);
    let config = PipelineConfig::load(&cli.config, Path::new(DEFAULT_WORKING_DIR))
        .map_err(EngineError::from)?;

    let mutations: MutationSpec = cli
        .mutations
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(|e: mdprep::core::mutation::MutationParseError| {
            CliError::Argument(e.to_string())
        })?;
    let extent = Extent::parse_lenient(cli.extent.as_deref());
    let source = SourceReference::parse(&cli.input);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping at the next stage boundary.");
                cancel.cancel();
            }
        });
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let executor = GromacsToolchain::new();
    let fetcher = RcsbFetcher::new(tokio::runtime::Handle::current());
    let mutator = ExternalMutator::from_properties(&config.stage(StageId::Mutate).properties)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let converter = StructureConverter::new();
    let toolbox = Toolbox {
        executor: &executor,
        fetcher: &fetcher,
        mutator: &mutator,
        converter: &converter,
    };

    let request = RunRequest {
        source,
        mutations,
        extent,
        output: cli.output.clone(),
    };

    info!("Invoking the preparation pipeline...");
    let report = tokio::task::block_in_place(|| {
        setup::run(&config, &request, &toolbox, &reporter, cancel)
    })?;
    progress_handler.finish();

    println!(
        "✓ {} stage(s) executed; final structure written to: {}",
        report.executed.len(),
        report.output.display()
    );
    Ok(())
}
