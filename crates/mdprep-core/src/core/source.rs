//! Input source references.
//!
//! The starting structure is either fetched from the remote structure
//! archive by identifier (`pdb:1ABC`) or copied from a local file. The
//! reference is computed once from the raw CLI argument and never changes
//! afterwards.

use std::path::PathBuf;

const REMOTE_PREFIX: &str = "pdb:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceReference {
    /// Fetch by archive identifier (e.g. `1ABC`).
    Remote { id: String },
    /// Copy an existing local structure file.
    Local { path: PathBuf },
}

impl SourceReference {
    /// Interpret a raw input argument. A `pdb:` prefix followed by a
    /// non-empty identifier selects a remote fetch; anything else is treated
    /// as a local path.
    pub fn parse(raw: &str) -> SourceReference {
        let trimmed = raw.trim();
        if let Some(id) = trimmed.strip_prefix(REMOTE_PREFIX) {
            let id = id.trim();
            if !id.is_empty() {
                return SourceReference::Remote { id: id.to_string() };
            }
        }
        SourceReference::Local {
            path: PathBuf::from(trimmed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn prefixed_identifier_is_remote() {
        assert_eq!(
            SourceReference::parse("pdb:1ABC"),
            SourceReference::Remote {
                id: "1ABC".to_string()
            }
        );
        assert_eq!(
            SourceReference::parse("  pdb: 6m0j "),
            SourceReference::Remote {
                id: "6m0j".to_string()
            }
        );
    }

    #[test]
    fn plain_path_is_local() {
        assert_eq!(
            SourceReference::parse("structures/input.pdb"),
            SourceReference::Local {
                path: Path::new("structures/input.pdb").to_path_buf()
            }
        );
    }

    #[test]
    fn empty_identifier_falls_back_to_local() {
        assert_eq!(
            SourceReference::parse("pdb:"),
            SourceReference::Local {
                path: Path::new("pdb:").to_path_buf()
            }
        );
    }
}
