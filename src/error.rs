use std::path::PathBuf;
use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, JmdictError>;

/// Enum representing all possible errors in the jmdict_rs library.
#[derive(Error, Debug)]
pub enum JmdictError {
    #[error("Input file {} not found", .0.display())]
    InputNotFound(PathBuf),

    #[error("Output file {} already exists", .0.display())]
    OutputAlreadyExists(PathBuf),

    #[error("XML parsing error at byte {position}: {source}")]
    MalformedInput {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed XML document: {0}")]
    MalformedDocument(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion aborted")]
    Aborted,

    #[error("Internal error: {0}")]
    Internal(String), // For unexpected situations
}
