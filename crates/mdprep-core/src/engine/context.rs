use tracing::info;

use super::cancel::CancellationToken;
use super::config::PipelineConfig;
use super::journal::ProgressLog;
use super::progress::ProgressReporter;
use crate::core::stage::StageId;

/// Everything a stage invocation needs, constructed once per run and passed
/// by reference: the resolved configuration, the run journal, the progress
/// reporter, and the cancellation flag. There is no process-wide mutable
/// state anywhere in the engine.
pub struct RunContext<'a> {
    pub config: &'a PipelineConfig,
    pub journal: ProgressLog,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: CancellationToken,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        reporter: &'a ProgressReporter<'a>,
        cancel: CancellationToken,
    ) -> Self {
        RunContext {
            config,
            journal: ProgressLog::open(config.working_dir()),
            reporter,
            cancel,
        }
    }

    /// Log a stage event to both the tracing subscriber and the run journal.
    pub fn announce(&self, stage: StageId, message: &str) {
        info!(stage = %stage, "{}", message);
        self.journal.record(stage, message);
    }
}
