//! The pipeline engine.
//!
//! Drives the fixed stage chain strictly in order, one blocking stage at a
//! time. The run is a small explicit state machine: `Running(k)` advances to
//! `Running(k + 1)` on success, to `Done` when stage `k` is the requested
//! checkpoint's terminal stage (via the conversion side effect), and to
//! `Failed` on the first error. `Done` and `Failed` are terminal, each with
//! a single exit path.
//!
//! No stage is ever skipped on the way to the checkpoint — the energy
//! report stages run purely for their reporting value — and nothing that an
//! earlier stage wrote is deleted on failure: partial outputs stay on disk
//! as diagnostic artifacts.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::context::RunContext;
use super::convert::ArtifactConverter;
use super::error::EngineError;
use super::input::ensure_parent;
use super::progress::Progress;
use crate::core::checkpoint::Extent;
use crate::core::stage::StageId;
use crate::tools::{StageExecutor, ToolError};

/// What a successful run did: the stages that executed, the terminal stage,
/// and the converted output artifact.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub executed: Vec<StageId>,
    pub terminal: StageId,
    pub output: PathBuf,
}

enum EngineState {
    Running(usize),
    Done,
    Failed(EngineError),
}

/// Execute the engine chain up to and including the extent's terminal
/// stage, then convert the checkpoint snapshot into `output`.
pub fn run_chain(
    ctx: &RunContext<'_>,
    extent: Extent,
    output: &Path,
    executor: &dyn StageExecutor,
    converter: &dyn ArtifactConverter,
) -> Result<RunReport, EngineError> {
    let chain = &StageId::ENGINE_CHAIN;
    let terminal = extent.terminal_stage();
    let planned = chain
        .iter()
        .position(|&id| id == terminal)
        .expect("every extent terminates inside the engine chain")
        + 1;

    let mut executed = Vec::with_capacity(planned);
    let mut state = EngineState::Running(0);

    loop {
        state = match state {
            EngineState::Running(index) => {
                let id = chain[index];
                match execute_stage(ctx, id, index, planned, executor) {
                    Err(e) => EngineState::Failed(e),
                    Ok(()) => {
                        executed.push(id);
                        if id == terminal {
                            match finalize(ctx, extent, output, converter) {
                                Ok(()) => EngineState::Done,
                                Err(e) => EngineState::Failed(e),
                            }
                        } else {
                            EngineState::Running(index + 1)
                        }
                    }
                }
            }
            EngineState::Done => {
                return Ok(RunReport {
                    executed,
                    terminal,
                    output: output.to_path_buf(),
                });
            }
            EngineState::Failed(err) => {
                error!(error = %err, "Pipeline run failed.");
                return Err(err);
            }
        };
    }
}

fn execute_stage(
    ctx: &RunContext<'_>,
    id: StageId,
    index: usize,
    planned: usize,
    executor: &dyn StageExecutor,
) -> Result<(), EngineError> {
    if ctx.cancel.is_cancelled() {
        return Err(EngineError::Cancelled { stage: id });
    }

    ctx.reporter.report(Progress::StageStart {
        stage: id,
        description: id.description(),
        index,
        planned,
    });
    ctx.announce(id, id.description());

    let stage = ctx.config.stage(id);
    for path in stage.outputs.values() {
        ensure_parent(path)?;
    }

    executor
        .execute(stage)
        .map_err(|source| EngineError::Stage { stage: id, source })?;

    // Synchronous barrier: the stage contract is "all declared outputs or
    // failure", so a missing file here is a stage failure even if the tool
    // reported success.
    for path in stage.outputs.values() {
        if !path.exists() {
            return Err(EngineError::Stage {
                stage: id,
                source: ToolError::MissingOutput { path: path.clone() },
            });
        }
    }

    ctx.reporter.report(Progress::StageFinish);
    Ok(())
}

fn finalize(
    ctx: &RunContext<'_>,
    extent: Extent,
    output: &Path,
    converter: &dyn ArtifactConverter,
) -> Result<(), EngineError> {
    let (snapshot_stage, port) = extent.snapshot();
    let snapshot = ctx
        .config
        .stage(snapshot_stage)
        .require_output(port)
        .map_err(|source| EngineError::Conversion { source })?;

    ensure_parent(output)?;
    converter
        .convert(snapshot, output)
        .map_err(|source| EngineError::Conversion { source })?;

    let message = format!(
        "{} completed. Final structure saved to {}",
        extent.completion_label(),
        output.display()
    );
    info!("{}", message);
    ctx.journal.record(extent.terminal_stage(), &message);
    ctx.reporter.report(Progress::Message(message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::PipelineConfig;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::testing::{CopyConverter, FailingConverter, RecordingExecutor};
    use tempfile::{TempDir, tempdir};

    fn fixture() -> (TempDir, PipelineConfig) {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("run");
        let config = PipelineConfig::from_toml_str(
            &crate::engine::testing::config_toml(&workdir),
            dir.path(),
        )
        .unwrap();
        (dir, config)
    }

    fn chain_up_to(terminal: StageId) -> Vec<StageId> {
        let end = StageId::ENGINE_CHAIN
            .iter()
            .position(|&id| id == terminal)
            .unwrap();
        StageId::ENGINE_CHAIN[..=end].to_vec()
    }

    #[test]
    fn each_extent_executes_exactly_the_stages_up_to_its_checkpoint() {
        for extent in [
            Extent::Repair,
            Extent::Minimization,
            Extent::ThermalEquilibration,
            Extent::PressureEquilibration,
            Extent::Production,
        ] {
            let (dir, config) = fixture();
            let reporter = ProgressReporter::new();
            let ctx = RunContext::new(&config, &reporter, CancellationToken::new());
            let executor = RecordingExecutor::default();
            let output = dir.path().join("final.pdb");

            let report =
                run_chain(&ctx, extent, &output, &executor, &CopyConverter).unwrap();

            let expected = chain_up_to(extent.terminal_stage());
            assert_eq!(*executor.trace.borrow(), expected, "extent {:?}", extent);
            assert_eq!(report.executed, expected);
            assert_eq!(report.terminal, extent.terminal_stage());
            assert!(output.is_file());
        }
    }

    #[test]
    fn full_production_runs_the_entire_chain() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());
        let executor = RecordingExecutor::default();

        run_chain(
            &ctx,
            Extent::Production,
            &dir.path().join("final.pdb"),
            &executor,
            &CopyConverter,
        )
        .unwrap();

        assert_eq!(*executor.trace.borrow(), StageId::ENGINE_CHAIN.to_vec());
    }

    #[test]
    fn converted_output_comes_from_the_extent_snapshot() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());
        let output = dir.path().join("final.pdb");

        run_chain(
            &ctx,
            Extent::Minimization,
            &output,
            &RecordingExecutor::default(),
            &CopyConverter,
        )
        .unwrap();

        // The recording executor writes each stage's key into its outputs;
        // the minimization snapshot is the minimize stage's structure.
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "minimize");
    }

    #[test]
    fn failure_at_a_stage_preserves_earlier_outputs_and_stops_the_chain() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());
        let executor = RecordingExecutor::failing_at(StageId::Solvate);
        let output = dir.path().join("final.pdb");

        let result = run_chain(&ctx, Extent::Production, &output, &executor, &CopyConverter);

        match result {
            Err(EngineError::Stage { stage, .. }) => assert_eq!(stage, StageId::Solvate),
            other => panic!("expected Stage error, got {:?}", other),
        }
        assert_eq!(*executor.trace.borrow(), chain_up_to(StageId::Solvate));

        // Stages before the failure left their artifacts behind.
        for id in [StageId::Repair, StageId::Topology, StageId::BoxSetup] {
            for port in id.outputs() {
                assert!(config.stage(id).output(port).unwrap().is_file());
            }
        }
        // The failing stage produced nothing, and no output was written.
        for port in StageId::Solvate.outputs() {
            assert!(!config.stage(StageId::Solvate).output(port).unwrap().exists());
        }
        assert!(!output.exists());
    }

    #[test]
    fn missing_declared_output_is_a_stage_failure() {
        struct NoOutputExecutor;
        impl StageExecutor for NoOutputExecutor {
            fn execute(&self, _stage: &crate::core::stage::Stage) -> Result<(), ToolError> {
                Ok(())
            }
        }

        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());

        let result = run_chain(
            &ctx,
            Extent::Repair,
            &dir.path().join("final.pdb"),
            &NoOutputExecutor,
            &CopyConverter,
        );
        match result {
            Err(EngineError::Stage {
                stage,
                source: ToolError::MissingOutput { .. },
            }) => assert_eq!(stage, StageId::Repair),
            other => panic!("expected MissingOutput stage failure, got {:?}", other),
        }
    }

    #[test]
    fn cancellation_stops_before_the_next_stage() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = RunContext::new(&config, &reporter, cancel);
        let executor = RecordingExecutor::default();

        let result = run_chain(
            &ctx,
            Extent::Production,
            &dir.path().join("final.pdb"),
            &executor,
            &CopyConverter,
        );
        assert!(matches!(
            result,
            Err(EngineError::Cancelled {
                stage: StageId::Repair
            })
        ));
        assert!(executor.trace.borrow().is_empty());
    }

    #[test]
    fn conversion_failure_is_reported_after_the_terminal_stage() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());
        let executor = RecordingExecutor::default();

        let result = run_chain(
            &ctx,
            Extent::Repair,
            &dir.path().join("final.pdb"),
            &executor,
            &FailingConverter,
        );
        assert!(matches!(result, Err(EngineError::Conversion { .. })));
        // The terminal stage itself ran and left its output.
        assert_eq!(*executor.trace.borrow(), vec![StageId::Repair]);
    }

    #[test]
    fn journal_records_stage_lines_in_execution_order() {
        let (dir, config) = fixture();
        let reporter = ProgressReporter::new();
        let ctx = RunContext::new(&config, &reporter, CancellationToken::new());

        run_chain(
            &ctx,
            Extent::Repair,
            &dir.path().join("final.pdb"),
            &RecordingExecutor::default(),
            &CopyConverter,
        )
        .unwrap();

        let journal = std::fs::read_to_string(
            config.working_dir().join(crate::engine::journal::JOURNAL_FILE),
        )
        .unwrap();
        let lines: Vec<&str> = journal.lines().collect();
        assert!(lines[0].starts_with("repair:"));
        assert!(lines.last().unwrap().contains("Final structure saved to"));
    }
}
