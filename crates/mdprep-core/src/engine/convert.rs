use std::path::Path;

use crate::tools::ToolError;

/// Converts the native structural snapshot held at a checkpoint into the
/// user-requested output structure, restricted to the macromolecule
/// selection — solvent and ions never appear in the written file, whichever
/// checkpoint triggered the conversion.
pub trait ArtifactConverter {
    fn convert(&self, snapshot: &Path, output: &Path) -> Result<(), ToolError>;
}
