use std::path::PathBuf;

use tracing::{info, instrument};

use crate::core::checkpoint::Extent;
use crate::core::mutation::MutationSpec;
use crate::core::source::SourceReference;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::PipelineConfig;
use crate::engine::context::RunContext;
use crate::engine::convert::ArtifactConverter;
use crate::engine::error::EngineError;
use crate::engine::input::{self, StructureFetcher, StructureMutator};
use crate::engine::pipeline::{self, RunReport};
use crate::engine::progress::ProgressReporter;
use crate::tools::StageExecutor;

/// What one pipeline run should do: where the structure comes from, which
/// mutations to apply, how far to run, and where the final artifact goes.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source: SourceReference,
    pub mutations: MutationSpec,
    pub extent: Extent,
    pub output: PathBuf,
}

/// The external collaborators a run is wired with. Everything behind these
/// references is a black box to the engine.
pub struct Toolbox<'a> {
    pub executor: &'a dyn StageExecutor,
    pub fetcher: &'a dyn StructureFetcher,
    pub mutator: &'a dyn StructureMutator,
    pub converter: &'a dyn ArtifactConverter,
}

/// Run the preparation pipeline: materialize the input, execute the stage
/// chain up to the requested checkpoint, and convert the snapshot into the
/// final structure.
#[instrument(skip_all, name = "preparation_pipeline")]
pub fn run(
    config: &PipelineConfig,
    request: &RunRequest,
    toolbox: &Toolbox<'_>,
    reporter: &ProgressReporter<'_>,
    cancel: CancellationToken,
) -> Result<RunReport, EngineError> {
    info!(
        extent = ?request.extent,
        workdir = %config.working_dir().display(),
        "Starting preparation pipeline."
    );

    let ctx = RunContext::new(config, reporter, cancel);
    input::resolve_input(
        &ctx,
        &request.source,
        &request.mutations,
        toolbox.fetcher,
        toolbox.mutator,
    )?;

    let report = pipeline::run_chain(
        &ctx,
        request.extent,
        &request.output,
        toolbox.executor,
        toolbox.converter,
    )?;

    info!(
        stages = report.executed.len(),
        terminal = %report.terminal,
        output = %report.output.display(),
        "Pipeline complete."
    );
    Ok(report)
}
