//! Shared fixtures for engine tests: a fully wired configuration in the
//! conventional step layout, plus recording fakes for every collaborator
//! contract.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use super::convert::ArtifactConverter;
use super::input::{FetchFailure, StructureFetcher, StructureMutator};
use crate::core::mutation::MutationSpec;
use crate::core::stage::{Stage, StageId};
use crate::tools::{StageExecutor, ToolError};

fn stage_body(id: StageId) -> &'static str {
    match id {
        StageId::Acquire => r#"outputs = { structure = "step1_acquire/structure.pdb" }"#,
        StageId::Mutate => {
            r#"inputs = { structure = "step1_acquire/structure.pdb" }
outputs = { structure = "step1b_mutate/mutated.pdb" }"#
        }
        StageId::Repair => {
            r#"inputs = { structure = "step1b_mutate/mutated.pdb" }
outputs = { structure = "step2_repair/fixed.pdb" }"#
        }
        StageId::Topology => {
            r#"inputs = { structure = "step2_repair/fixed.pdb" }
outputs = { structure = "step3_topology/processed.gro", topology = "step3_topology/topol.top" }"#
        }
        StageId::BoxSetup => {
            r#"inputs = { structure = "step3_topology/processed.gro" }
outputs = { structure = "step4_box/boxed.gro" }"#
        }
        StageId::Solvate => {
            r#"inputs = { structure = "step4_box/boxed.gro", topology = "step3_topology/topol.top" }
outputs = { structure = "step5_solvate/solvated.gro", topology = "step5_solvate/topol.top" }"#
        }
        StageId::IonPrep => {
            r#"inputs = { structure = "step5_solvate/solvated.gro", topology = "step5_solvate/topol.top" }
outputs = { "run-input" = "step6_ion_prep/ions.tpr" }"#
        }
        StageId::Ionize => {
            r#"inputs = { "run-input" = "step6_ion_prep/ions.tpr", topology = "step5_solvate/topol.top" }
outputs = { structure = "step7_ionize/ionized.gro", topology = "step7_ionize/topol.top" }"#
        }
        StageId::MinPrep => {
            r#"inputs = { structure = "step7_ionize/ionized.gro", topology = "step7_ionize/topol.top" }
outputs = { "run-input" = "step8_min_prep/min.tpr" }"#
        }
        StageId::Minimize => {
            r#"inputs = { "run-input" = "step8_min_prep/min.tpr" }
outputs = { structure = "step9_minimize/minimized.gro", trajectory = "step9_minimize/minimized.trr", energy = "step9_minimize/minimized.edr" }"#
        }
        StageId::MinEnergy => {
            r#"inputs = { energy = "step9_minimize/minimized.edr" }
outputs = { report = "step10_min_energy/potential.xvg" }"#
        }
        StageId::NvtPrep => {
            r#"inputs = { structure = "step9_minimize/minimized.gro", topology = "step7_ionize/topol.top" }
outputs = { "run-input" = "step11_nvt_prep/nvt.tpr" }"#
        }
        StageId::NvtRun => {
            r#"inputs = { "run-input" = "step11_nvt_prep/nvt.tpr" }
outputs = { structure = "step12_nvt_run/nvt.gro", trajectory = "step12_nvt_run/nvt.trr", energy = "step12_nvt_run/nvt.edr", checkpoint = "step12_nvt_run/nvt.cpt" }"#
        }
        StageId::NvtEnergy => {
            r#"inputs = { energy = "step12_nvt_run/nvt.edr" }
outputs = { report = "step13_nvt_energy/temperature.xvg" }"#
        }
        StageId::NptPrep => {
            r#"inputs = { structure = "step12_nvt_run/nvt.gro", topology = "step7_ionize/topol.top", checkpoint = "step12_nvt_run/nvt.cpt" }
outputs = { "run-input" = "step14_npt_prep/npt.tpr" }"#
        }
        StageId::NptRun => {
            r#"inputs = { "run-input" = "step14_npt_prep/npt.tpr" }
outputs = { structure = "step15_npt_run/npt.gro", trajectory = "step15_npt_run/npt.trr", energy = "step15_npt_run/npt.edr", checkpoint = "step15_npt_run/npt.cpt" }"#
        }
        StageId::NptEnergy => {
            r#"inputs = { energy = "step15_npt_run/npt.edr" }
outputs = { report = "step16_npt_energy/density.xvg" }"#
        }
        StageId::ProdPrep => {
            r#"inputs = { structure = "step15_npt_run/npt.gro", topology = "step7_ionize/topol.top", checkpoint = "step15_npt_run/npt.cpt" }
outputs = { "run-input" = "step17_prod_prep/prod.tpr" }"#
        }
        StageId::ProdRun => {
            r#"inputs = { "run-input" = "step17_prod_prep/prod.tpr" }
outputs = { structure = "step18_prod_run/prod.gro", trajectory = "step18_prod_run/prod.trr", energy = "step18_prod_run/prod.edr" }"#
        }
        StageId::RmsdFirst => {
            r#"inputs = { reference = "step15_npt_run/npt.gro", trajectory = "step18_prod_run/prod.trr" }
outputs = { report = "step19_rmsd_first/rmsd.xvg" }"#
        }
        StageId::RmsdExp => {
            r#"inputs = { reference = "step9_minimize/minimized.gro", trajectory = "step18_prod_run/prod.trr" }
outputs = { report = "step20_rmsd_exp/rmsd.xvg" }"#
        }
        StageId::Gyration => {
            r#"inputs = { "run-input" = "step17_prod_prep/prod.tpr", trajectory = "step18_prod_run/prod.trr" }
outputs = { report = "step21_gyration/gyration.xvg" }"#
        }
        StageId::Image => {
            r#"inputs = { "run-input" = "step17_prod_prep/prod.tpr", trajectory = "step18_prod_run/prod.trr" }
outputs = { trajectory = "step22_image/imaged.trr" }"#
        }
        StageId::Strip => {
            r#"inputs = { structure = "step18_prod_run/prod.gro", "run-input" = "step17_prod_prep/prod.tpr" }
outputs = { structure = "step23_strip/dry.gro" }"#
        }
    }
}

/// A complete, consistently wired configuration in the conventional
/// step-per-directory layout.
pub(crate) fn config_toml(working_dir: &Path) -> String {
    let mut rendered = format!("working-dir = \"{}\"\n", working_dir.display());
    for id in StageId::ALL {
        rendered.push_str(&format!("\n[stages.{}]\n{}\n", id.key(), stage_body(id)));
    }
    rendered
}

/// The canonical configuration with one stage section removed.
pub(crate) fn config_toml_without(working_dir: &Path, omitted: StageId) -> String {
    let mut rendered = format!("working-dir = \"{}\"\n", working_dir.display());
    for id in StageId::ALL {
        if id != omitted {
            rendered.push_str(&format!("\n[stages.{}]\n{}\n", id.key(), stage_body(id)));
        }
    }
    rendered
}

/// The canonical configuration with one stage section replaced by `body`.
pub(crate) fn config_toml_with_stage(
    working_dir: &Path,
    replaced: StageId,
    body: &str,
) -> String {
    let mut rendered = format!("working-dir = \"{}\"\n", working_dir.display());
    for id in StageId::ALL {
        let body = if id == replaced { body } else { stage_body(id) };
        rendered.push_str(&format!("\n[stages.{}]\n{}\n", id.key(), body));
    }
    rendered
}

/// A stage executor that records the invocation order, fabricates every
/// declared output, and optionally fails at one stage.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
    pub trace: RefCell<Vec<StageId>>,
    pub fail_at: Option<StageId>,
}

impl RecordingExecutor {
    pub fn failing_at(stage: StageId) -> Self {
        RecordingExecutor {
            trace: RefCell::new(Vec::new()),
            fail_at: Some(stage),
        }
    }
}

impl StageExecutor for RecordingExecutor {
    fn execute(&self, stage: &Stage) -> Result<(), ToolError> {
        self.trace.borrow_mut().push(stage.id);
        if self.fail_at == Some(stage.id) {
            return Err(ToolError::MissingOutput {
                path: stage.outputs.values().next().cloned().unwrap_or_default(),
            });
        }
        for path in stage.outputs.values() {
            fs::write(path, stage.id.key())?;
        }
        Ok(())
    }
}

/// A fetcher that writes fixed content and remembers the identifier asked
/// for.
#[derive(Default)]
pub(crate) struct RecordingFetcher {
    pub fetched: RefCell<Option<String>>,
    pub fail: bool,
}

impl StructureFetcher for RecordingFetcher {
    fn fetch(&self, id: &str, dest: &Path) -> Result<(), FetchFailure> {
        *self.fetched.borrow_mut() = Some(id.to_string());
        if self.fail {
            return Err(FetchFailure {
                reason: "synthetic fetch failure".to_string(),
            });
        }
        fs::write(dest, format!("REMOTE {}\n", id)).map_err(|e| FetchFailure {
            reason: e.to_string(),
        })
    }
}

/// A mutator that records the spec it was handed and writes a marker file.
#[derive(Default)]
pub(crate) struct RecordingMutator {
    pub applied: RefCell<Option<String>>,
}

impl StructureMutator for RecordingMutator {
    fn mutate(
        &self,
        input: &Path,
        output: &Path,
        spec: &MutationSpec,
    ) -> Result<(), ToolError> {
        *self.applied.borrow_mut() = Some(spec.to_string());
        let base = fs::read_to_string(input)?;
        fs::write(output, format!("{}MUTATED {}\n", base, spec))?;
        Ok(())
    }
}

/// A converter that copies the snapshot verbatim.
#[derive(Default)]
pub(crate) struct CopyConverter;

impl ArtifactConverter for CopyConverter {
    fn convert(&self, snapshot: &Path, output: &Path) -> Result<(), ToolError> {
        fs::copy(snapshot, output)?;
        Ok(())
    }
}

/// A converter that always fails, for conversion-error paths.
pub(crate) struct FailingConverter;

impl ArtifactConverter for FailingConverter {
    fn convert(&self, snapshot: &Path, _output: &Path) -> Result<(), ToolError> {
        Err(ToolError::EmptySelection {
            path: snapshot.to_path_buf(),
        })
    }
}
