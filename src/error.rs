use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, normalizing and merging bibliographies.
#[derive(Error, Debug)]
pub enum BibError {
    #[error("No DOI found on first page of {source_name}")]
    IdentifierNotFound { source_name: String },

    #[error("Could not retrieve bib string for {source_name} (DOI {doi})")]
    Retrieval { doi: String, source_name: String },

    #[error("Problem parsing {path}. Likely this is an old PDF not amenable to parsing: {reason}")]
    PdfParsing { path: PathBuf, reason: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("No entry with key \"{0}\"")]
    KeyNotFound(String),

    #[error("An entry with key \"{0}\" already exists")]
    DuplicateKey(String),

    #[error("All 26 suffixes for key \"{0}\" are taken")]
    KeySpaceExhausted(String),

    #[error("Parse error in {source_name} at line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("Duplicate key ({key}) in {base} and {incoming}, aborting as requested")]
    MergeAborted {
        key: String,
        base: String,
        incoming: String,
    },

    #[error("Merge aborted by user")]
    UserAbort,

    #[error("Output file ({0}) exists, stopping")]
    OutputExists(PathBuf),

    #[error("{path} has no {marker} line")]
    MissingMarker { path: PathBuf, marker: &'static str },

    #[error("Invalid citation format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BibError {
    /// Errors that only affect one document of a batch; the batch logs them and moves on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BibError::IdentifierNotFound { .. }
                | BibError::Retrieval { .. }
                | BibError::PdfParsing { .. }
                | BibError::KeySpaceExhausted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BibError>;
