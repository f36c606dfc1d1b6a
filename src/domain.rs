use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// A KEGG gene identifier of the form `org:locus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneId(String);

impl GeneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn organism(&self) -> &str {
        self.0.split_once(':').map(|(org, _)| org).unwrap_or("")
    }

    pub fn locus(&self) -> &str {
        self.0.split_once(':').map(|(_, locus)| locus).unwrap_or(&self.0)
    }

    /// Loci made only of digits (e.g. NCBI gene ids such as `hsa:7157`) carry no
    /// positional information and cannot be windowed.
    pub fn has_numeric_locus(&self) -> bool {
        let locus = self.locus();
        !locus.is_empty() && locus.chars().all(|ch| ch.is_ascii_digit())
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeneId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = match normalized.split_once(':') {
            Some((org, locus)) => {
                !org.is_empty()
                    && !locus.is_empty()
                    && org.chars().all(|ch| ch.is_ascii_alphanumeric())
                    && !locus.contains(char::is_whitespace)
            }
            None => false,
        };
        if !is_valid {
            return Err(KiraError::InvalidGeneId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// KEGG Orthology identifier (`K` followed by digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KoId(String);

impl KoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KoId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let re = Regex::new(r"^K\d+$").map_err(|err| KiraError::InvalidKoId(err.to_string()))?;
        if !re.is_match(normalized) {
            return Err(KiraError::InvalidKoId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Seed of a vicinity run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    Orthology(KoId),
    File(Utf8PathBuf),
    Genes(Vec<GeneId>),
}

impl RunInput {
    /// Classifies a positional argument. Never touches the network; a value that
    /// is neither a KO id, an existing file nor a colon-delimited list is fatal.
    pub fn classify(value: &str) -> Result<Self, KiraError> {
        let trimmed = value.trim();
        if let Ok(ko) = trimmed.parse::<KoId>() {
            return Ok(RunInput::Orthology(ko));
        }
        let path = Utf8PathBuf::from(trimmed);
        if path.as_std_path().is_file() {
            return Ok(RunInput::File(path));
        }
        if trimmed.contains(':') {
            let genes = trimmed
                .split(|ch: char| ch == ',' || ch.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<GeneId>())
                .collect::<Result<Vec<_>, KiraError>>()?;
            if !genes.is_empty() {
                return Ok(RunInput::Genes(genes));
            }
        }
        Err(KiraError::InvalidInput(value.to_string()))
    }

    /// Stem used for output file names.
    pub fn stem(&self) -> String {
        match self {
            RunInput::Orthology(ko) => ko.as_str().to_string(),
            RunInput::File(path) => path.file_stem().unwrap_or("genes").to_string(),
            RunInput::Genes(genes) => match genes.as_slice() {
                [single] => single.as_str().replace(':', "_"),
                _ => "genes".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Uniprot,
    Swissprot,
    Kegg,
    Pdb,
}

impl Database {
    pub fn label(self) -> &'static str {
        match self {
            Database::Uniprot => "uniprot",
            Database::Swissprot => "swissprot",
            Database::Kegg => "kegg",
            Database::Pdb => "pdb",
        }
    }

    /// Database name as understood by Genome.jp `get_linkdb`.
    pub fn linkdb_name(self) -> &'static str {
        match self {
            Database::Kegg => "genes",
            other => other.label(),
        }
    }

    pub fn supports_protein_data(self) -> bool {
        !matches!(self, Database::Pdb)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Database {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace('-', "").to_lowercase();
        match normalized.as_str() {
            "uniprot" => Ok(Database::Uniprot),
            "swissprot" => Ok(Database::Swissprot),
            "kegg" | "genes" => Ok(Database::Kegg),
            "pdb" => Ok(Database::Pdb),
            _ => Err(KiraError::InvalidDatabase(value.to_string())),
        }
    }
}

/// Parses a `;`- or `,`-separated database list, e.g. `UniProt;KEGG;PDB`.
pub fn parse_database_list(value: &str) -> Result<Vec<Database>, KiraError> {
    let mut databases = Vec::new();
    for part in value.split([';', ',']).filter(|part| !part.trim().is_empty()) {
        let db = part.parse::<Database>()?;
        if !databases.contains(&db) {
            databases.push(db);
        }
    }
    if databases.is_empty() {
        return Err(KiraError::InvalidDatabase(value.to_string()));
    }
    Ok(databases)
}

/// Classification attached to every record produced for one reference gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionOutcome {
    Complete,
    Incomplete,
    Error,
}

impl ResolutionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionOutcome::Complete => "complete",
            ResolutionOutcome::Incomplete => "incomplete",
            ResolutionOutcome::Error => "error",
        }
    }
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResolutionOutcome {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "complete" => Ok(ResolutionOutcome::Complete),
            "incomplete" => Ok(ResolutionOutcome::Incomplete),
            "error" => Ok(ResolutionOutcome::Error),
            other => Err(KiraError::Table(format!("unknown status tag: {other}"))),
        }
    }
}

/// Pipeline stages selected by the characters of `--action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionSet {
    pub ids: bool,
    pub data: bool,
    pub neighbors: bool,
    pub extract: bool,
}

impl ActionSet {
    pub fn all() -> Self {
        Self {
            ids: true,
            data: true,
            neighbors: true,
            extract: true,
        }
    }

    pub fn needs_id_list(&self) -> bool {
        self.ids || self.data || self.neighbors
    }
}

impl FromStr for ActionSet {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(KiraError::InvalidAction(value.to_string()));
        }
        let mut actions = ActionSet::default();
        for ch in trimmed.chars() {
            match ch {
                'a' => actions = ActionSet::all(),
                'i' => actions.ids = true,
                'd' => actions.data = true,
                'n' => actions.neighbors = true,
                'e' => actions.extract = true,
                _ => return Err(KiraError::InvalidAction(value.to_string())),
            }
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_locus_is_detected() {
        let gene: GeneId = "hsa:7157".parse().unwrap();
        assert!(gene.has_numeric_locus());
        let gene: GeneId = "eco:b0002".parse().unwrap();
        assert!(!gene.has_numeric_locus());
    }

    #[test]
    fn action_all_expands() {
        let actions: ActionSet = "a".parse().unwrap();
        assert_eq!(actions, ActionSet::all());
    }
}
