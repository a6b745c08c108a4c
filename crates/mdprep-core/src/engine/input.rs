//! Input resolution.
//!
//! Before the engine chain starts, the starting structure is materialized at
//! the acquisition stage's output path — fetched from the remote archive or
//! copied from a local file — and the mutation stage's output is produced
//! from it. The mutation step always runs as stage 1b: with an empty spec it
//! degenerates to a verbatim copy and the mutation collaborator is never
//! invoked, which keeps the path table identical across configurations.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::context::RunContext;
use super::error::EngineError;
use crate::core::mutation::MutationSpec;
use crate::core::source::SourceReference;
use crate::core::stage::StageId;
use crate::tools::ToolError;

/// Why a remote fetch failed, as reported by the fetch collaborator.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct FetchFailure {
    pub reason: String,
}

/// Retrieves a structure from the remote archive by identifier, writing it
/// to `dest`.
pub trait StructureFetcher {
    fn fetch(&self, id: &str, dest: &Path) -> Result<(), FetchFailure>;
}

/// Applies point mutations to a structure file, writing the mutated copy to
/// `output`. The spec is the collaborator's entire configuration.
pub trait StructureMutator {
    fn mutate(&self, input: &Path, output: &Path, spec: &MutationSpec) -> Result<(), ToolError>;
}

/// Materialize the stage-1 input structure and the stage-1b mutation output.
/// Any failure here is fatal before the first engine stage runs.
pub fn resolve_input(
    ctx: &RunContext<'_>,
    source: &SourceReference,
    mutations: &MutationSpec,
    fetcher: &dyn StructureFetcher,
    mutator: &dyn StructureMutator,
) -> Result<(), EngineError> {
    let acquire = ctx.config.stage(StageId::Acquire);
    let staged = acquire
        .require_output("structure")
        .map_err(|source| EngineError::Stage {
            stage: StageId::Acquire,
            source,
        })?;
    ensure_parent(staged)?;

    match source {
        SourceReference::Remote { id } => {
            ctx.announce(
                StageId::Acquire,
                &format!("Downloading {} from the structure archive", id),
            );
            fetcher
                .fetch(id, staged)
                .map_err(|source| EngineError::Fetch {
                    id: id.clone(),
                    source,
                })?;
        }
        SourceReference::Local { path } => {
            if !path.is_file() {
                return Err(EngineError::InputNotFound { path: path.clone() });
            }
            ctx.announce(
                StageId::Acquire,
                &format!("Staging local structure {}", path.display()),
            );
            fs::copy(path, staged).map_err(|source| EngineError::Io {
                path: staged.to_path_buf(),
                source,
            })?;
        }
    }

    let mutate = ctx.config.stage(StageId::Mutate);
    let mutate_input = mutate
        .require_input("structure")
        .map_err(|source| EngineError::Stage {
            stage: StageId::Mutate,
            source,
        })?;
    let mutate_output = mutate
        .require_output("structure")
        .map_err(|source| EngineError::Stage {
            stage: StageId::Mutate,
            source,
        })?;
    ensure_parent(mutate_output)?;

    if mutations.is_empty() {
        ctx.announce(
            StageId::Mutate,
            "No mutations requested; carrying the structure forward unchanged",
        );
        fs::copy(mutate_input, mutate_output).map_err(|source| EngineError::Io {
            path: mutate_output.to_path_buf(),
            source,
        })?;
    } else {
        ctx.announce(
            StageId::Mutate,
            &format!("Preparing mutated structure ({})", mutations),
        );
        mutator
            .mutate(mutate_input, mutate_output, mutations)
            .map_err(|source| EngineError::Stage {
                stage: StageId::Mutate,
                source,
            })?;
    }

    Ok(())
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
