//! Configuration resolution.
//!
//! The declarative TOML configuration names a working directory and, for
//! every stage, the paths bound to its named ports plus an opaque property
//! table. [`PipelineConfig::load`] turns that file into a fully-resolved,
//! schema-validated path table or fails with a [`ConfigError`] — resolution
//! is all-or-nothing, and nothing the engine touches later can be missing.
//!
//! Validation enforced here, before any stage runs:
//! - every stage in the pipeline has an entry, with exactly the ports its
//!   schema declares (unknown stages and unknown ports are rejected);
//! - every input port is wired to a path some earlier stage produces;
//! - the working directory exists (it is created on demand).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::core::stage::{Stage, StageId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown stage '{0}' in configuration")]
    UnknownStage(String),

    #[error("missing configuration entry for stage '{stage}'")]
    MissingStage { stage: StageId },

    #[error("stage '{stage}' is missing required {kind} port '{port}'")]
    MissingPort {
        stage: StageId,
        kind: &'static str,
        port: &'static str,
    },

    #[error("stage '{stage}' declares unknown {kind} port '{port}'")]
    UnknownPort {
        stage: StageId,
        kind: &'static str,
        port: String,
    },

    #[error(
        "input port '{port}' of stage '{stage}' is bound to {path}, which no earlier stage produces"
    )]
    UnwiredInput {
        stage: StageId,
        port: String,
        path: PathBuf,
    },

    #[error("could not create working directory {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileConfig {
    working_dir: Option<PathBuf>,
    #[serde(default)]
    stages: BTreeMap<String, FileStage>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct FileStage {
    #[serde(default)]
    inputs: BTreeMap<String, PathBuf>,
    #[serde(default)]
    outputs: BTreeMap<String, PathBuf>,
    #[serde(default)]
    properties: toml::Table,
}

/// The fully-resolved pipeline configuration: the working directory plus one
/// wired [`Stage`] per [`StageId`]. Owned by the engine for the duration of
/// a run; nothing mutates it after construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    working_dir: PathBuf,
    stages: BTreeMap<StageId, Stage>,
}

impl PipelineConfig {
    pub fn load(path: &Path, default_working_dir: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading pipeline configuration.");
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, default_working_dir)
    }

    pub fn from_toml_str(
        content: &str,
        default_working_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;

        for key in file.stages.keys() {
            if StageId::from_key(key).is_none() {
                return Err(ConfigError::UnknownStage(key.clone()));
            }
        }

        let working_dir = file
            .working_dir
            .unwrap_or_else(|| default_working_dir.to_path_buf());

        let mut stages = BTreeMap::new();
        for id in StageId::ALL {
            let entry = file
                .stages
                .get(id.key())
                .ok_or(ConfigError::MissingStage { stage: id })?;
            stages.insert(id, resolve_stage(id, entry, &working_dir)?);
        }

        validate_wiring(&stages)?;

        fs::create_dir_all(&working_dir).map_err(|source| ConfigError::Workdir {
            path: working_dir.clone(),
            source,
        })?;

        Ok(PipelineConfig {
            working_dir,
            stages,
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        self.stages
            .get(&id)
            .expect("stage table is complete after validation")
    }
}

fn resolve_stage(
    id: StageId,
    entry: &FileStage,
    working_dir: &Path,
) -> Result<Stage, ConfigError> {
    check_ports(id, "input", id.inputs(), &entry.inputs)?;
    check_ports(id, "output", id.outputs(), &entry.outputs)?;

    let resolve = |ports: &BTreeMap<String, PathBuf>| {
        ports
            .iter()
            .map(|(port, path)| (port.clone(), resolve_under(working_dir, path)))
            .collect::<BTreeMap<_, _>>()
    };

    Ok(Stage {
        id,
        inputs: resolve(&entry.inputs),
        outputs: resolve(&entry.outputs),
        properties: entry.properties.clone(),
    })
}

fn check_ports(
    stage: StageId,
    kind: &'static str,
    schema: &'static [&'static str],
    bound: &BTreeMap<String, PathBuf>,
) -> Result<(), ConfigError> {
    for port in schema {
        if !bound.contains_key(*port) {
            return Err(ConfigError::MissingPort { stage, kind, port });
        }
    }
    for port in bound.keys() {
        if !schema.contains(&port.as_str()) {
            return Err(ConfigError::UnknownPort {
                stage,
                kind,
                port: port.clone(),
            });
        }
    }
    Ok(())
}

fn resolve_under(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

/// Every input port must be bound to a path produced as an output port by an
/// earlier stage (the acquisition stage seeds the chain).
fn validate_wiring(stages: &BTreeMap<StageId, Stage>) -> Result<(), ConfigError> {
    let mut produced: BTreeSet<&Path> = BTreeSet::new();
    for id in StageId::ALL {
        let stage = &stages[&id];
        for (port, path) in &stage.inputs {
            if !produced.contains(path.as_path()) {
                return Err(ConfigError::UnwiredInput {
                    stage: id,
                    port: port.clone(),
                    path: path.clone(),
                });
            }
        }
        produced.extend(stage.outputs.values().map(PathBuf::as_path));
    }
    Ok(())
}
