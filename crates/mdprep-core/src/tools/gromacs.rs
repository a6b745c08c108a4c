//! GROMACS-style toolchain adapter.
//!
//! [`GromacsToolchain`] is the production [`StageExecutor`]: it dispatches on
//! the stage identity and invokes the matching external program. The `gmx`
//! binary name, forcefield, water model, group selections, and `.mdp`
//! parameters all come from the stage's property table, so the engine stays
//! ignorant of tool specifics.
//!
//! Preprocessing stages accept their simulation parameters as an inline
//! `mdp` property table which is written to a `grompp.mdp` file next to the
//! stage output, mirroring how the original workflow carried per-stage MD
//! settings in its configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{StageExecutor, ToolError, prop_bool, prop_str, run_command, stage_timeout};
use crate::core::stage::{Stage, StageId};

const DEFAULT_BINARY: &str = "gmx";
const DEFAULT_REPAIR_PROGRAM: &str = "pdbfixer";
const DEFAULT_FORCEFIELD: &str = "amber99sb-ildn";
const DEFAULT_WATER_MODEL: &str = "spce";
const DEFAULT_SOLVENT_BOX: &str = "spc216.gro";

#[derive(Debug, Default, Clone, Copy)]
pub struct GromacsToolchain;

impl GromacsToolchain {
    pub fn new() -> Self {
        GromacsToolchain
    }

    fn gmx(&self, stage: &Stage, subcommand: &str) -> Command {
        let mut command = Command::new(prop_str(&stage.properties, "binary", DEFAULT_BINARY));
        command.arg(subcommand);
        command
    }

    fn repair(&self, stage: &Stage) -> Result<(), ToolError> {
        let input = stage.require_input("structure")?;
        let output = stage.require_output("structure")?;

        let program = prop_str(&stage.properties, "program", DEFAULT_REPAIR_PROGRAM);
        let mut command = Command::new(program);
        command
            .arg(input)
            .arg(format!("--output={}", output.display()))
            .arg("--add-atoms=heavy");
        if let Some(extra) = stage.properties.get("args").and_then(|v| v.as_array()) {
            for arg in extra {
                match arg.as_str() {
                    Some(arg) => {
                        command.arg(arg);
                    }
                    None => {
                        return Err(ToolError::InvalidProperty {
                            key: "args".to_string(),
                            reason: "expected an array of strings".to_string(),
                        });
                    }
                }
            }
        }
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn pdb2gmx(&self, stage: &Stage) -> Result<(), ToolError> {
        let output = stage.require_output("structure")?;
        let mut command = self.gmx(stage, "pdb2gmx");
        command
            .arg("-f")
            .arg(stage.require_input("structure")?)
            .arg("-o")
            .arg(output)
            .arg("-p")
            .arg(stage.require_output("topology")?)
            .arg("-ff")
            .arg(prop_str(&stage.properties, "forcefield", DEFAULT_FORCEFIELD))
            .arg("-water")
            .arg(prop_str(&stage.properties, "water", DEFAULT_WATER_MODEL));
        set_scratch_dir(&mut command, output);
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn editconf(&self, stage: &Stage) -> Result<(), ToolError> {
        let distance = stage
            .properties
            .get("distance")
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|n| n as f64)))
            .unwrap_or(1.0);
        let mut command = self.gmx(stage, "editconf");
        command
            .arg("-f")
            .arg(stage.require_input("structure")?)
            .arg("-o")
            .arg(stage.require_output("structure")?)
            .arg("-c")
            .arg("-d")
            .arg(format!("{}", distance))
            .arg("-bt")
            .arg(prop_str(&stage.properties, "box-type", "cubic"));
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn solvate(&self, stage: &Stage) -> Result<(), ToolError> {
        // gmx solvate rewrites the topology in place; work on the declared
        // output copy so the upstream artifact stays untouched.
        let topology = carry_topology(stage)?;
        let mut command = self.gmx(stage, "solvate");
        command
            .arg("-cp")
            .arg(stage.require_input("structure")?)
            .arg("-cs")
            .arg(prop_str(&stage.properties, "solvent-box", DEFAULT_SOLVENT_BOX))
            .arg("-o")
            .arg(stage.require_output("structure")?)
            .arg("-p")
            .arg(&topology);
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn grompp(&self, stage: &Stage) -> Result<(), ToolError> {
        let run_input = stage.require_output("run-input")?;
        let mdp_path = write_mdp_file(stage, run_input)?;

        let mut command = self.gmx(stage, "grompp");
        command
            .arg("-f")
            .arg(&mdp_path)
            .arg("-c")
            .arg(stage.require_input("structure")?)
            .arg("-p")
            .arg(stage.require_input("topology")?)
            .arg("-o")
            .arg(run_input);
        if let Some(checkpoint) = stage.input("checkpoint") {
            command.arg("-t").arg(checkpoint);
        }
        if let Some(maxwarn) = stage.properties.get("maxwarn").and_then(|v| v.as_integer()) {
            command.arg("-maxwarn").arg(maxwarn.to_string());
        }
        set_scratch_dir(&mut command, run_input);
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn genion(&self, stage: &Stage) -> Result<(), ToolError> {
        let topology = carry_topology(stage)?;
        let mut command = self.gmx(stage, "genion");
        command
            .arg("-s")
            .arg(stage.require_input("run-input")?)
            .arg("-o")
            .arg(stage.require_output("structure")?)
            .arg("-p")
            .arg(&topology)
            .arg("-pname")
            .arg(prop_str(&stage.properties, "positive-ion", "NA"))
            .arg("-nname")
            .arg(prop_str(&stage.properties, "negative-ion", "CL"));
        if prop_bool(&stage.properties, "neutral", true) {
            command.arg("-neutral");
        }
        if let Some(concentration) = stage.properties.get("concentration").and_then(|v| v.as_float())
        {
            command.arg("-conc").arg(format!("{}", concentration));
        }

        let group = prop_str(&stage.properties, "group", "SOL");
        run_command(
            command,
            Some(&format!("{}\n", group)),
            stage_timeout(&stage.properties)?,
        )
    }

    fn mdrun(&self, stage: &Stage) -> Result<(), ToolError> {
        let structure = stage.require_output("structure")?;
        let mut command = self.gmx(stage, "mdrun");
        command
            .arg("-s")
            .arg(stage.require_input("run-input")?)
            .arg("-c")
            .arg(structure)
            .arg("-o")
            .arg(stage.require_output("trajectory")?)
            .arg("-e")
            .arg(stage.require_output("energy")?)
            .arg("-g")
            .arg(scratch_dir(structure).join("md.log"));
        if let Some(checkpoint) = stage.output("checkpoint") {
            command.arg("-cpo").arg(checkpoint);
        }
        if let Some(threads) = stage.properties.get("threads").and_then(|v| v.as_integer()) {
            command.arg("-nt").arg(threads.to_string());
        }
        run_command(command, None, stage_timeout(&stage.properties)?)
    }

    fn energy(&self, stage: &Stage) -> Result<(), ToolError> {
        let mut command = self.gmx(stage, "energy");
        command
            .arg("-f")
            .arg(stage.require_input("energy")?)
            .arg("-o")
            .arg(stage.require_output("report")?);

        let terms = prop_str(&stage.properties, "terms", "Potential");
        let selection = format!("{}\n", terms.split_whitespace().collect::<Vec<_>>().join("\n"));
        run_command(command, Some(&selection), stage_timeout(&stage.properties)?)
    }

    fn rms(&self, stage: &Stage) -> Result<(), ToolError> {
        let mut command = self.gmx(stage, "rms");
        command
            .arg("-s")
            .arg(stage.require_input("reference")?)
            .arg("-f")
            .arg(stage.require_input("trajectory")?)
            .arg("-o")
            .arg(stage.require_output("report")?)
            .arg("-tu")
            .arg(prop_str(&stage.properties, "time-unit", "ns"));

        let group = prop_str(&stage.properties, "group", "Backbone");
        run_command(
            command,
            Some(&format!("{}\n{}\n", group, group)),
            stage_timeout(&stage.properties)?,
        )
    }

    fn gyrate(&self, stage: &Stage) -> Result<(), ToolError> {
        let mut command = self.gmx(stage, "gyrate");
        command
            .arg("-s")
            .arg(stage.require_input("run-input")?)
            .arg("-f")
            .arg(stage.require_input("trajectory")?)
            .arg("-o")
            .arg(stage.require_output("report")?);

        let group = prop_str(&stage.properties, "group", "Protein");
        run_command(
            command,
            Some(&format!("{}\n", group)),
            stage_timeout(&stage.properties)?,
        )
    }

    fn image(&self, stage: &Stage) -> Result<(), ToolError> {
        let mut command = self.gmx(stage, "trjconv");
        command
            .arg("-s")
            .arg(stage.require_input("run-input")?)
            .arg("-f")
            .arg(stage.require_input("trajectory")?)
            .arg("-o")
            .arg(stage.require_output("trajectory")?)
            .arg("-pbc")
            .arg(prop_str(&stage.properties, "pbc", "mol"));
        if prop_bool(&stage.properties, "center", true) {
            command.arg("-center");
        }

        let center_group = prop_str(&stage.properties, "center-group", "Protein");
        let output_group = prop_str(&stage.properties, "output-group", "System");
        run_command(
            command,
            Some(&format!("{}\n{}\n", center_group, output_group)),
            stage_timeout(&stage.properties)?,
        )
    }

    fn strip(&self, stage: &Stage) -> Result<(), ToolError> {
        let mut command = self.gmx(stage, "trjconv");
        command
            .arg("-s")
            .arg(stage.require_input("run-input")?)
            .arg("-f")
            .arg(stage.require_input("structure")?)
            .arg("-o")
            .arg(stage.require_output("structure")?);

        let group = prop_str(&stage.properties, "group", "Protein");
        run_command(
            command,
            Some(&format!("{}\n", group)),
            stage_timeout(&stage.properties)?,
        )
    }
}

impl StageExecutor for GromacsToolchain {
    fn execute(&self, stage: &Stage) -> Result<(), ToolError> {
        match stage.id {
            StageId::Repair => self.repair(stage),
            StageId::Topology => self.pdb2gmx(stage),
            StageId::BoxSetup => self.editconf(stage),
            StageId::Solvate => self.solvate(stage),
            StageId::IonPrep
            | StageId::MinPrep
            | StageId::NvtPrep
            | StageId::NptPrep
            | StageId::ProdPrep => self.grompp(stage),
            StageId::Ionize => self.genion(stage),
            StageId::Minimize | StageId::NvtRun | StageId::NptRun | StageId::ProdRun => {
                self.mdrun(stage)
            }
            StageId::MinEnergy | StageId::NvtEnergy | StageId::NptEnergy => self.energy(stage),
            StageId::RmsdFirst | StageId::RmsdExp => self.rms(stage),
            StageId::Gyration => self.gyrate(stage),
            StageId::Image => self.image(stage),
            StageId::Strip => self.strip(stage),
            StageId::Acquire | StageId::Mutate => {
                Err(ToolError::UnsupportedStage { stage: stage.id })
            }
        }
    }
}

fn scratch_dir(output: &Path) -> PathBuf {
    output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Tools that scatter auxiliary files (mdout.mdp, posre.itp, backups) are
/// run from the stage's own output directory.
fn set_scratch_dir(command: &mut Command, output: &Path) {
    command.current_dir(scratch_dir(output));
}

/// Copy the input topology to the declared output path and return it, so
/// in-place topology edits stay within the stage's own directory.
fn carry_topology(stage: &Stage) -> Result<PathBuf, ToolError> {
    let input = stage.require_input("topology")?;
    let output = stage.require_output("topology")?;
    if input != output {
        fs::copy(input, output)?;
    }
    Ok(output.to_path_buf())
}

/// Render the stage's `mdp` property table into a grompp parameter file
/// placed next to the run input.
fn write_mdp_file(stage: &Stage, run_input: &Path) -> Result<PathBuf, ToolError> {
    let table = match stage.properties.get("mdp") {
        Some(value) => value
            .as_table()
            .ok_or_else(|| ToolError::InvalidProperty {
                key: "mdp".to_string(),
                reason: "expected a table of parameter = value entries".to_string(),
            })?
            .clone(),
        None => toml::Table::new(),
    };

    let mut rendered = String::new();
    for (key, value) in &table {
        let value = match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered.push_str(&format!("{} = {}\n", key, value));
    }

    let path = scratch_dir(run_input).join("grompp.mdp");
    fs::write(&path, rendered)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn stage_with_mdp(dir: &Path, mdp: &str) -> Stage {
        let properties: toml::Table = toml::from_str(mdp).unwrap();
        Stage {
            id: StageId::MinPrep,
            inputs: BTreeMap::from([
                ("structure".to_string(), dir.join("in.gro")),
                ("topology".to_string(), dir.join("topol.top")),
            ]),
            outputs: BTreeMap::from([("run-input".to_string(), dir.join("min.tpr"))]),
            properties,
        }
    }

    #[test]
    fn mdp_table_is_rendered_as_parameter_lines() {
        let dir = tempdir().unwrap();
        let stage = stage_with_mdp(
            dir.path(),
            "[mdp]\nintegrator = \"steep\"\nnsteps = 5000\nemtol = 1000.0\n",
        );

        let path = write_mdp_file(&stage, stage.output("run-input").unwrap()).unwrap();
        let rendered = fs::read_to_string(&path).unwrap();
        assert!(rendered.contains("integrator = steep"));
        assert!(rendered.contains("nsteps = 5000"));
        assert!(rendered.contains("emtol = 1000"));
    }

    #[test]
    fn missing_mdp_table_renders_an_empty_file() {
        let dir = tempdir().unwrap();
        let stage = stage_with_mdp(dir.path(), "");
        let path = write_mdp_file(&stage, stage.output("run-input").unwrap()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn non_table_mdp_property_is_rejected() {
        let dir = tempdir().unwrap();
        let stage = stage_with_mdp(dir.path(), "mdp = \"steep\"\n");
        assert!(matches!(
            write_mdp_file(&stage, &dir.path().join("min.tpr")),
            Err(ToolError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn carry_topology_copies_into_the_stage_directory() {
        let dir = tempdir().unwrap();
        let upstream = dir.path().join("upstream.top");
        let carried = dir.path().join("carried.top");
        fs::write(&upstream, "; topology\n").unwrap();

        let stage = Stage {
            id: StageId::Solvate,
            inputs: BTreeMap::from([
                ("structure".to_string(), dir.path().join("boxed.gro")),
                ("topology".to_string(), upstream.clone()),
            ]),
            outputs: BTreeMap::from([
                ("structure".to_string(), dir.path().join("solvated.gro")),
                ("topology".to_string(), carried.clone()),
            ]),
            properties: toml::Table::new(),
        };

        let result = carry_topology(&stage).unwrap();
        assert_eq!(result, carried);
        assert_eq!(fs::read_to_string(&carried).unwrap(), "; topology\n");
    }

    #[test]
    fn input_resolution_stages_are_not_executable() {
        let stage = Stage {
            id: StageId::Acquire,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            properties: toml::Table::new(),
        };
        assert!(matches!(
            GromacsToolchain::new().execute(&stage),
            Err(ToolError::UnsupportedStage { .. })
        ));
    }
}
