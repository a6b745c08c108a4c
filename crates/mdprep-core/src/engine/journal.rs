//! The run journal.
//!
//! An append-only `pipeline.log` in the working directory records one line
//! per stage event, in call order, mirroring the stage announcements the
//! original workflow wrote to its global log. The journal is purely
//! observational: any failure to open or write it is downgraded to a
//! warning and never affects the run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use crate::core::stage::StageId;

pub const JOURNAL_FILE: &str = "pipeline.log";

#[derive(Debug, Default)]
pub struct ProgressLog {
    sink: Option<Mutex<File>>,
}

impl ProgressLog {
    /// Open (or create) the journal inside `working_dir`. On failure the
    /// journal is disabled for the rest of the run.
    pub fn open(working_dir: &Path) -> Self {
        let path = working_dir.join(JOURNAL_FILE);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => ProgressLog {
                sink: Some(Mutex::new(file)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open the run journal; continuing without it.");
                ProgressLog::disabled()
            }
        }
    }

    /// A journal that records nothing.
    pub fn disabled() -> Self {
        ProgressLog::default()
    }

    pub fn record(&self, stage: StageId, message: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Ok(mut file) = sink.lock() else {
            warn!("Run journal lock was poisoned; dropping journal entry.");
            return;
        };
        if let Err(e) = writeln!(file, "{}: {}", stage.key(), message) {
            warn!(error = %e, "Failed to append to the run journal.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn records_lines_in_call_order() {
        let dir = tempdir().unwrap();
        let journal = ProgressLog::open(dir.path());
        journal.record(StageId::Repair, "Repairing");
        journal.record(StageId::Topology, "Generating topology");

        let content = std::fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["repair: Repairing", "topology: Generating topology"]);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempdir().unwrap();
        ProgressLog::open(dir.path()).record(StageId::Repair, "first run");
        ProgressLog::open(dir.path()).record(StageId::Repair, "second run");

        let content = std::fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn unopenable_journal_swallows_writes() {
        let journal = ProgressLog::open(Path::new("/nonexistent/mdprep-journal-dir"));
        // Must not panic or error.
        journal.record(StageId::Repair, "lost");
    }

    #[test]
    fn disabled_journal_is_inert() {
        ProgressLog::disabled().record(StageId::Strip, "nothing");
    }
}
