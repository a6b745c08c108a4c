//! The stage vocabulary of the preparation pipeline.
//!
//! Every unit of pipeline work is identified by a [`StageId`]. The set is
//! closed and ordered: [`StageId::ALL`] lists the stages in execution order,
//! and [`StageId::ENGINE_CHAIN`] is the sub-sequence driven by the pipeline
//! engine ([`StageId::Acquire`] and [`StageId::Mutate`] are materialized by
//! the input resolver before the engine starts).
//!
//! Each stage declares the named input and output ports it requires. The
//! configuration loader validates the user's path table against this schema,
//! so tool adapters can rely on every declared port being bound.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::tools::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    Acquire,
    Mutate,
    Repair,
    Topology,
    BoxSetup,
    Solvate,
    IonPrep,
    Ionize,
    MinPrep,
    Minimize,
    MinEnergy,
    NvtPrep,
    NvtRun,
    NvtEnergy,
    NptPrep,
    NptRun,
    NptEnergy,
    ProdPrep,
    ProdRun,
    RmsdFirst,
    RmsdExp,
    Gyration,
    Image,
    Strip,
}

impl StageId {
    /// Every stage, in pipeline order.
    pub const ALL: [StageId; 24] = [
        StageId::Acquire,
        StageId::Mutate,
        StageId::Repair,
        StageId::Topology,
        StageId::BoxSetup,
        StageId::Solvate,
        StageId::IonPrep,
        StageId::Ionize,
        StageId::MinPrep,
        StageId::Minimize,
        StageId::MinEnergy,
        StageId::NvtPrep,
        StageId::NvtRun,
        StageId::NvtEnergy,
        StageId::NptPrep,
        StageId::NptRun,
        StageId::NptEnergy,
        StageId::ProdPrep,
        StageId::ProdRun,
        StageId::RmsdFirst,
        StageId::RmsdExp,
        StageId::Gyration,
        StageId::Image,
        StageId::Strip,
    ];

    /// The stages executed by the pipeline engine, in order. Acquisition and
    /// mutation happen during input resolution and are excluded.
    pub const ENGINE_CHAIN: [StageId; 22] = [
        StageId::Repair,
        StageId::Topology,
        StageId::BoxSetup,
        StageId::Solvate,
        StageId::IonPrep,
        StageId::Ionize,
        StageId::MinPrep,
        StageId::Minimize,
        StageId::MinEnergy,
        StageId::NvtPrep,
        StageId::NvtRun,
        StageId::NvtEnergy,
        StageId::NptPrep,
        StageId::NptRun,
        StageId::NptEnergy,
        StageId::ProdPrep,
        StageId::ProdRun,
        StageId::RmsdFirst,
        StageId::RmsdExp,
        StageId::Gyration,
        StageId::Image,
        StageId::Strip,
    ];

    /// The stable key identifying this stage in configuration files and
    /// journal lines.
    pub const fn key(self) -> &'static str {
        match self {
            StageId::Acquire => "acquire",
            StageId::Mutate => "mutate",
            StageId::Repair => "repair",
            StageId::Topology => "topology",
            StageId::BoxSetup => "box-setup",
            StageId::Solvate => "solvate",
            StageId::IonPrep => "ion-prep",
            StageId::Ionize => "ionize",
            StageId::MinPrep => "min-prep",
            StageId::Minimize => "minimize",
            StageId::MinEnergy => "min-energy",
            StageId::NvtPrep => "nvt-prep",
            StageId::NvtRun => "nvt-run",
            StageId::NvtEnergy => "nvt-energy",
            StageId::NptPrep => "npt-prep",
            StageId::NptRun => "npt-run",
            StageId::NptEnergy => "npt-energy",
            StageId::ProdPrep => "prod-prep",
            StageId::ProdRun => "prod-run",
            StageId::RmsdFirst => "rmsd-first",
            StageId::RmsdExp => "rmsd-exp",
            StageId::Gyration => "gyration",
            StageId::Image => "image",
            StageId::Strip => "strip",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            StageId::Acquire => "Stage the input structure",
            StageId::Mutate => "Apply requested point mutations",
            StageId::Repair => "Model missing heavy atoms in the structure side chains",
            StageId::Topology => "Generate the molecular topology",
            StageId::BoxSetup => "Create the simulation box",
            StageId::Solvate => "Fill the box with solvent molecules",
            StageId::IonPrep => "Preprocess ion placement",
            StageId::Ionize => "Replace solvent molecules with counter-ions",
            StageId::MinPrep => "Preprocess energy minimization",
            StageId::Minimize => "Run energy minimization",
            StageId::MinEnergy => "Extract potential energy from the minimization run",
            StageId::NvtPrep => "Preprocess temperature equilibration",
            StageId::NvtRun => "Run NVT equilibration",
            StageId::NvtEnergy => "Extract temperature from the NVT run",
            StageId::NptPrep => "Preprocess pressure equilibration",
            StageId::NptRun => "Run NPT equilibration",
            StageId::NptEnergy => "Extract density and pressure from the NPT run",
            StageId::ProdPrep => "Preprocess the production run",
            StageId::ProdRun => "Run production molecular dynamics",
            StageId::RmsdFirst => "Compute RMSD against the equilibrated structure",
            StageId::RmsdExp => "Compute RMSD against the minimized structure",
            StageId::Gyration => "Compute the radius of gyration",
            StageId::Image => "Image the production trajectory",
            StageId::Strip => "Strip solvent and ions from the final structure",
        }
    }

    /// Required input ports. Each must be bound in the path table to a path
    /// produced by an earlier stage's output port.
    pub const fn inputs(self) -> &'static [&'static str] {
        match self {
            StageId::Acquire => &[],
            StageId::Mutate => &["structure"],
            StageId::Repair => &["structure"],
            StageId::Topology => &["structure"],
            StageId::BoxSetup => &["structure"],
            StageId::Solvate => &["structure", "topology"],
            StageId::IonPrep => &["structure", "topology"],
            StageId::Ionize => &["run-input", "topology"],
            StageId::MinPrep => &["structure", "topology"],
            StageId::Minimize => &["run-input"],
            StageId::MinEnergy => &["energy"],
            StageId::NvtPrep => &["structure", "topology"],
            StageId::NvtRun => &["run-input"],
            StageId::NvtEnergy => &["energy"],
            StageId::NptPrep => &["structure", "topology", "checkpoint"],
            StageId::NptRun => &["run-input"],
            StageId::NptEnergy => &["energy"],
            StageId::ProdPrep => &["structure", "topology", "checkpoint"],
            StageId::ProdRun => &["run-input"],
            StageId::RmsdFirst => &["reference", "trajectory"],
            StageId::RmsdExp => &["reference", "trajectory"],
            StageId::Gyration => &["run-input", "trajectory"],
            StageId::Image => &["run-input", "trajectory"],
            StageId::Strip => &["structure", "run-input"],
        }
    }

    /// Declared output ports. The engine treats these as a contract: after a
    /// stage executor returns, every output path must exist on disk.
    pub const fn outputs(self) -> &'static [&'static str] {
        match self {
            StageId::Acquire => &["structure"],
            StageId::Mutate => &["structure"],
            StageId::Repair => &["structure"],
            StageId::Topology => &["structure", "topology"],
            StageId::BoxSetup => &["structure"],
            StageId::Solvate => &["structure", "topology"],
            StageId::IonPrep => &["run-input"],
            StageId::Ionize => &["structure", "topology"],
            StageId::MinPrep => &["run-input"],
            StageId::Minimize => &["structure", "trajectory", "energy"],
            StageId::MinEnergy => &["report"],
            StageId::NvtPrep => &["run-input"],
            StageId::NvtRun => &["structure", "trajectory", "energy", "checkpoint"],
            StageId::NvtEnergy => &["report"],
            StageId::NptPrep => &["run-input"],
            StageId::NptRun => &["structure", "trajectory", "energy", "checkpoint"],
            StageId::NptEnergy => &["report"],
            StageId::ProdPrep => &["run-input"],
            StageId::ProdRun => &["structure", "trajectory", "energy"],
            StageId::RmsdFirst => &["report"],
            StageId::RmsdExp => &["report"],
            StageId::Gyration => &["report"],
            StageId::Image => &["trajectory"],
            StageId::Strip => &["structure"],
        }
    }

    pub fn from_key(key: &str) -> Option<StageId> {
        StageId::ALL.into_iter().find(|id| id.key() == key)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One unit of pipeline work, fully wired: the stage identity, its resolved
/// port paths, and the opaque property table forwarded to the tool adapter.
/// Stages are immutable once constructed and executed exactly once per run.
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,
    pub inputs: BTreeMap<String, PathBuf>,
    pub outputs: BTreeMap<String, PathBuf>,
    pub properties: toml::Table,
}

impl Stage {
    pub fn input(&self, port: &str) -> Option<&Path> {
        self.inputs.get(port).map(PathBuf::as_path)
    }

    pub fn output(&self, port: &str) -> Option<&Path> {
        self.outputs.get(port).map(PathBuf::as_path)
    }

    /// Fetch a schema-declared input port, surfacing a tool error if the
    /// binding is absent. The configuration loader guarantees presence for
    /// stages it constructed.
    pub fn require_input(&self, port: &'static str) -> Result<&Path, ToolError> {
        self.input(port).ok_or(ToolError::MissingPort {
            stage: self.id,
            port,
        })
    }

    pub fn require_output(&self, port: &'static str) -> Result<&Path, ToolError> {
        self.output(port).ok_or(ToolError::MissingPort {
            stage: self.id,
            port,
        })
    }
}
