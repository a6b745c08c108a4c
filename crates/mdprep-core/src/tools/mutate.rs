//! External mutation collaborator.
//!
//! Point mutations are delegated to a configured modelling program. The
//! adapter hands over the input structure, the output path, and the
//! canonical serialization of the mutation spec; the program's internals
//! are out of scope here.

use std::path::Path;
use std::process::Command;

use super::{ToolError, prop_str, run_command, stage_timeout};
use crate::core::mutation::MutationSpec;
use crate::engine::input::StructureMutator;

const DEFAULT_PROGRAM: &str = "mutate-model";

#[derive(Debug, Clone)]
pub struct ExternalMutator {
    program: String,
    timeout: Option<std::time::Duration>,
}

impl ExternalMutator {
    /// Build from the mutate stage's property table (`program`,
    /// `timeout-sec`).
    pub fn from_properties(properties: &toml::Table) -> Result<Self, ToolError> {
        Ok(ExternalMutator {
            program: prop_str(properties, "program", DEFAULT_PROGRAM).to_string(),
            timeout: stage_timeout(properties)?,
        })
    }
}

impl StructureMutator for ExternalMutator {
    fn mutate(
        &self,
        input: &Path,
        output: &Path,
        spec: &MutationSpec,
    ) -> Result<(), ToolError> {
        let mut command = Command::new(&self.program);
        command
            .arg(input)
            .arg(output)
            .arg("--mutations")
            .arg(spec.to_string());
        run_command(command, None, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_override_the_default_program() {
        let props: toml::Table = toml::from_str("program = \"faspr\"").unwrap();
        let mutator = ExternalMutator::from_properties(&props).unwrap();
        assert_eq!(mutator.program, "faspr");

        let mutator = ExternalMutator::from_properties(&toml::Table::new()).unwrap();
        assert_eq!(mutator.program, DEFAULT_PROGRAM);
    }

    #[test]
    fn missing_program_surfaces_as_a_launch_failure() {
        let props: toml::Table =
            toml::from_str("program = \"mdprep-no-such-mutator\"").unwrap();
        let mutator = ExternalMutator::from_properties(&props).unwrap();
        let spec: MutationSpec = "A:V45W".parse().unwrap();
        let result = mutator.mutate(Path::new("in.pdb"), Path::new("out.pdb"), &spec);
        assert!(matches!(result, Err(ToolError::Launch { .. })));
    }
}
