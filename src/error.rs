use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("unrecognized input: {0}")]
    #[diagnostic(help(
        "expected a KEGG Orthology id (K00001), an existing file with gene ids, or org:locus identifiers"
    ))]
    InvalidInput(String),

    #[error("invalid gene identifier: {0}")]
    InvalidGeneId(String),

    #[error("invalid KEGG Orthology id: {0}")]
    InvalidKoId(String),

    #[error("locus tag has no numeric suffix: {0}")]
    InvalidLocusTag(String),

    #[error("invalid action selector: {0}")]
    #[diagnostic(help("use any of a (all), i (ids), d (protein data), n (neighbors), e (extract)"))]
    InvalidAction(String),

    #[error("invalid database: {0}")]
    InvalidDatabase(String),

    #[error("invalid column separator: {0}")]
    InvalidSeparator(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("KEGG request failed: {0}")]
    KeggHttp(String),

    #[error("KEGG returned status {status}: {message}")]
    KeggStatus { status: u16, message: String },

    #[error("Genome.jp request failed: {0}")]
    GenomeJpHttp(String),

    #[error("Genome.jp returned status {status}: {message}")]
    GenomeJpStatus { status: u16, message: String },

    #[error("table error: {0}")]
    Table(String),

    #[error("missing column {column} in {path}")]
    MissingColumn { column: String, path: String },

    #[error("dataset not found locally: {0}")]
    DatasetNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("operation not supported for database {0}")]
    UnsupportedDatabase(String),
}

impl KiraError {
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            KiraError::KeggHttp(_)
                | KiraError::KeggStatus { .. }
                | KiraError::GenomeJpHttp(_)
                | KiraError::GenomeJpStatus { .. }
        )
    }
}

impl From<csv::Error> for KiraError {
    fn from(err: csv::Error) -> Self {
        KiraError::Table(err.to_string())
    }
}
