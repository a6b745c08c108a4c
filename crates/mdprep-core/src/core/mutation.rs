//! Point-mutation specifications.
//!
//! A [`MutationSpec`] is an ordered list of single-residue substitutions
//! parsed from the compact grammar used by the CLI:
//!
//! ```text
//! spec     := entry [ "," entry ]*
//! entry    := [ chains ":" ] substitution
//! chains   := chain [ "|" chain ]*          // "*" selects every chain
//! substitution := WT position TARGET        // e.g. V45W
//! ```
//!
//! `A|B:V45W` applies the same substitution to chains A and B. An entry with
//! no chain group defaults to `*`. The canonical serialization produced by
//! [`MutationSpec::to_string`] expands chain groups to one chain per entry,
//! and parsing that form is idempotent.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationParseError {
    #[error("Empty mutation entry in '{0}'.")]
    EmptyEntry(String),

    #[error("Empty chain group in mutation entry '{0}'.")]
    EmptyChain(String),

    #[error(
        "Invalid substitution '{0}'. Expected wild-type code, position, target code (e.g. 'V45W')."
    )]
    InvalidSubstitution(String),

    #[error("Invalid residue position in '{0}'.")]
    InvalidPosition(String),
}

/// One point substitution: replace the wild-type residue at `position` on
/// `chain` with `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub chain: String,
    pub wild_type: char,
    pub position: u32,
    pub target: char,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}{}",
            self.chain, self.wild_type, self.position, self.target
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationSpec {
    mutations: Vec<Mutation>,
}

impl MutationSpec {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }
}

impl FromStr for MutationSpec {
    type Err = MutationParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(MutationSpec::default());
        }

        let mut mutations = Vec::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(MutationParseError::EmptyEntry(raw.to_string()));
            }

            let (chains, substitution) = match entry.rsplit_once(':') {
                Some((chains, substitution)) => (chains, substitution),
                None => ("*", entry),
            };

            let (wild_type, position, target) = parse_substitution(substitution)?;
            for chain in chains.split('|') {
                let chain = chain.trim();
                if chain.is_empty() {
                    return Err(MutationParseError::EmptyChain(entry.to_string()));
                }
                mutations.push(Mutation {
                    chain: chain.to_string(),
                    wild_type,
                    position,
                    target,
                });
            }
        }

        Ok(MutationSpec { mutations })
    }
}

impl fmt::Display for MutationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mutation) in self.mutations.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", mutation)?;
        }
        Ok(())
    }
}

fn parse_substitution(raw: &str) -> Result<(char, u32, char), MutationParseError> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let (first, last) = match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(MutationParseError::InvalidSubstitution(raw.to_string())),
    };
    if !first.is_ascii_alphabetic() || !last.is_ascii_alphabetic() {
        return Err(MutationParseError::InvalidSubstitution(raw.to_string()));
    }

    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MutationParseError::InvalidSubstitution(raw.to_string()));
    }
    let position = digits
        .parse::<u32>()
        .map_err(|_| MutationParseError::InvalidPosition(raw.to_string()))?;

    Ok((first.to_ascii_uppercase(), position, last.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_parses_to_an_empty_spec() {
        let spec: MutationSpec = "".parse().unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.to_string(), "");

        let spec: MutationSpec = "   ".parse().unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn single_entry_with_chain() {
        let spec: MutationSpec = "A:V45W".parse().unwrap();
        assert_eq!(spec.len(), 1);
        let m = spec.iter().next().unwrap();
        assert_eq!(m.chain, "A");
        assert_eq!(m.wild_type, 'V');
        assert_eq!(m.position, 45);
        assert_eq!(m.target, 'W');
    }

    #[test]
    fn chainless_entry_defaults_to_wildcard() {
        let spec: MutationSpec = "V45W".parse().unwrap();
        assert_eq!(spec.to_string(), "*:V45W");
    }

    #[test]
    fn pipe_groups_expand_to_one_entry_per_chain() {
        let spec: MutationSpec = "A|B:T87A,C:G12D".parse().unwrap();
        assert_eq!(spec.to_string(), "A:T87A,B:T87A,C:G12D");
    }

    #[test]
    fn lowercase_residue_codes_are_normalized() {
        let spec: MutationSpec = "A:v45w".parse().unwrap();
        assert_eq!(spec.to_string(), "A:V45W");
    }

    #[test]
    fn canonical_serialization_round_trips() {
        let spec: MutationSpec = "*|A:V45W,B:T87A".parse().unwrap();
        let canonical = spec.to_string();
        let reparsed: MutationSpec = canonical.parse().unwrap();
        assert_eq!(reparsed, spec);
        assert_eq!(reparsed.to_string(), canonical);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(matches!(
            "A:".parse::<MutationSpec>(),
            Err(MutationParseError::InvalidSubstitution(_))
        ));
        assert!(matches!(
            "A:45W".parse::<MutationSpec>(),
            Err(MutationParseError::InvalidSubstitution(_))
        ));
        assert!(matches!(
            "A:VW".parse::<MutationSpec>(),
            Err(MutationParseError::InvalidSubstitution(_))
        ));
        assert!(matches!(
            "A:V45W,,B:T87A".parse::<MutationSpec>(),
            Err(MutationParseError::EmptyEntry(_))
        ));
        assert!(matches!(
            "A|:V45W".parse::<MutationSpec>(),
            Err(MutationParseError::EmptyChain(_))
        ));
    }

    #[test]
    fn positions_larger_than_u32_are_rejected() {
        assert!(matches!(
            "A:V99999999999W".parse::<MutationSpec>(),
            Err(MutationParseError::InvalidPosition(_))
        ));
    }
}
