//! Native structure conversion for checkpoint artifacts.
//!
//! The snapshots the pipeline holds at its checkpoints are line-oriented
//! text files (GRO after a simulation stage, PDB after repair). Converting
//! one into the user-facing output structure only requires reading the atom
//! records, dropping solvent and ion residues, and writing PDB records, so
//! this is done natively rather than through another tool invocation.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::ToolError;
use crate::engine::convert::ArtifactConverter;

/// Residue names excluded from the converted structure. Covers the common
/// water models and the counter-ion names used by the ionization stage.
const EXCLUDED_RESIDUES: &[&str] = &[
    "SOL", "WAT", "HOH", "TIP3", "TIP4", "TIP5", "SPC", "SPCE", "NA", "NA+", "CL", "CL-", "K",
    "K+", "MG", "MG2+", "CA2+", "ZN", "ION",
];

#[derive(Debug, Clone)]
struct AtomRecord {
    name: String,
    res_name: String,
    chain: char,
    res_seq: i32,
    /// Coordinates in Ångström.
    x: f64,
    y: f64,
    z: f64,
}

/// Converts a native snapshot into a macromolecule-only PDB structure.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructureConverter;

impl StructureConverter {
    pub fn new() -> Self {
        StructureConverter
    }
}

impl ArtifactConverter for StructureConverter {
    fn convert(&self, snapshot: &Path, output: &Path) -> Result<(), ToolError> {
        let atoms = match snapshot.extension().and_then(|e| e.to_str()) {
            Some("gro") => read_gro(snapshot)?,
            Some("pdb") => read_pdb(snapshot)?,
            _ => {
                return Err(ToolError::UnsupportedFormat {
                    path: snapshot.to_path_buf(),
                });
            }
        };

        let kept: Vec<&AtomRecord> = atoms.iter().filter(|a| !is_excluded(&a.res_name)).collect();
        if kept.is_empty() {
            return Err(ToolError::EmptySelection {
                path: snapshot.to_path_buf(),
            });
        }
        debug!(
            total = atoms.len(),
            kept = kept.len(),
            "Writing converted structure."
        );

        let mut out = fs::File::create(output)?;
        for (index, atom) in kept.iter().enumerate() {
            writeln!(out, "{}", pdb_atom_line(atom, index as u32 + 1))?;
        }
        writeln!(out, "END")?;
        Ok(())
    }
}

fn is_excluded(res_name: &str) -> bool {
    let upper = res_name.trim().to_ascii_uppercase();
    EXCLUDED_RESIDUES.contains(&upper.as_str())
}

fn field(line: &str, range: std::ops::Range<usize>) -> &str {
    let end = range.end.min(line.len());
    if range.start >= end {
        ""
    } else {
        line.get(range.start..end).unwrap_or("")
    }
}

fn read_gro(path: &Path) -> Result<Vec<AtomRecord>, ToolError> {
    let content = fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return Err(ToolError::MalformedStructure {
            path: path.to_path_buf(),
            line: lines.len(),
        });
    }

    let count: usize =
        lines[1]
            .trim()
            .parse()
            .map_err(|_| ToolError::MalformedStructure {
                path: path.to_path_buf(),
                line: 2,
            })?;
    if lines.len() < 2 + count {
        return Err(ToolError::MalformedStructure {
            path: path.to_path_buf(),
            line: lines.len(),
        });
    }

    let mut atoms = Vec::with_capacity(count);
    for (offset, line) in lines[2..2 + count].iter().enumerate() {
        let line_no = offset + 3;
        let malformed = || ToolError::MalformedStructure {
            path: path.to_path_buf(),
            line: line_no,
        };

        let res_seq: i32 = field(line, 0..5).trim().parse().map_err(|_| malformed())?;
        let res_name = field(line, 5..10).trim().to_string();
        let name = field(line, 10..15).trim().to_string();
        let _serial: u32 = field(line, 15..20).trim().parse().map_err(|_| malformed())?;
        // GRO coordinates are nanometres.
        let x: f64 = field(line, 20..28).trim().parse().map_err(|_| malformed())?;
        let y: f64 = field(line, 28..36).trim().parse().map_err(|_| malformed())?;
        let z: f64 = field(line, 36..44).trim().parse().map_err(|_| malformed())?;
        if res_name.is_empty() || name.is_empty() {
            return Err(malformed());
        }

        atoms.push(AtomRecord {
            name,
            res_name,
            chain: 'A',
            res_seq,
            x: x * 10.0,
            y: y * 10.0,
            z: z * 10.0,
        });
    }
    Ok(atoms)
}

fn read_pdb(path: &Path) -> Result<Vec<AtomRecord>, ToolError> {
    let content = fs::read_to_string(path)?;
    let mut atoms = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if !line.starts_with("ATOM") && !line.starts_with("HETATM") {
            continue;
        }
        let malformed = || ToolError::MalformedStructure {
            path: path.to_path_buf(),
            line: index + 1,
        };

        let _serial: u32 = field(line, 6..11).trim().parse().map_err(|_| malformed())?;
        let name = field(line, 12..16).trim().to_string();
        let res_name = field(line, 17..20).trim().to_string();
        let chain = field(line, 21..22).chars().next().unwrap_or(' ');
        let res_seq: i32 = field(line, 22..26).trim().parse().map_err(|_| malformed())?;
        let x: f64 = field(line, 30..38).trim().parse().map_err(|_| malformed())?;
        let y: f64 = field(line, 38..46).trim().parse().map_err(|_| malformed())?;
        let z: f64 = field(line, 46..54).trim().parse().map_err(|_| malformed())?;
        if res_name.is_empty() || name.is_empty() {
            return Err(malformed());
        }

        atoms.push(AtomRecord {
            name,
            res_name,
            chain,
            res_seq,
            x,
            y,
            z,
        });
    }
    Ok(atoms)
}

fn pdb_atom_line(atom: &AtomRecord, serial: u32) -> String {
    let name = if atom.name.len() >= 4 {
        atom.name.clone()
    } else {
        format!(" {:<3}", atom.name)
    };
    format!(
        "ATOM  {:>5} {:<4} {:<3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}",
        serial, name, atom.res_name, atom.chain, atom.res_seq, atom.x, atom.y, atom.z, 1.00, 0.00
    )
}
