use std::path::PathBuf;

use thiserror::Error;

use super::config::ConfigError;
use super::input::FetchFailure;
use crate::core::stage::StageId;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch remote structure '{id}': {source}")]
    Fetch {
        id: String,
        #[source]
        source: FetchFailure,
    },

    #[error("Input structure not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: StageId,
        #[source]
        source: ToolError,
    },

    #[error("Final structure conversion failed: {source}")]
    Conversion {
        #[source]
        source: ToolError,
    },

    #[error("Run cancelled before stage '{stage}'")]
    Cancelled { stage: StageId },

    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// The stage a failure originated at, when one is attached.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            EngineError::Stage { stage, .. } | EngineError::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }
}
