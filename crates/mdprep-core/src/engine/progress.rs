use crate::core::stage::StageId;

#[derive(Debug, Clone)]
pub enum Progress {
    StageStart {
        stage: StageId,
        description: &'static str,
        /// Position of this stage within the stages planned for the run.
        index: usize,
        planned: usize,
    },
    StageFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::StageFinish);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let seen: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            let label = match event {
                Progress::StageStart { stage, .. } => format!("start:{}", stage),
                Progress::StageFinish => "finish".to_string(),
                Progress::Message(msg) => msg,
            };
            seen.lock().unwrap().push(label);
        }));

        reporter.report(Progress::StageStart {
            stage: StageId::Repair,
            description: StageId::Repair.description(),
            index: 0,
            planned: 1,
        });
        reporter.report(Progress::StageFinish);
        reporter.report(Progress::Message("done".to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["start:repair", "finish", "done"]
        );
    }
}
