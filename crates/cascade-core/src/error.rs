//! Unified error type for the cascade workspace.
//!
//! [`GridError`] covers everything the network layer can report: file access,
//! parsing, validation and the split/merge identity contract. Higher layers
//! wrap it (see `cascade_algo::CascadeError`).
//!
//! ```
//! use cascade_core::{GridError, GridResult, Network};
//! use std::path::Path;
//!
//! fn load(path: &Path) -> GridResult<Network> {
//!     let network = cascade_core::io::load_network(path)?;
//!     Ok(network)
//! }
//!
//! let err = load(Path::new("/nonexistent/grid.json")).unwrap_err();
//! assert!(matches!(err, GridError::Io(_)));
//! ```

use thiserror::Error;

/// Record kind named in an [`GridError::InconsistentMerge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Bus,
    Generator,
    Branch,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RecordKind::Bus => "bus",
            RecordKind::Generator => "generator",
            RecordKind::Branch => "branch",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network structure errors
    #[error("Network error: {0}")]
    Network(String),

    /// A sub-network handed to `merge` names a record the full network lacks.
    ///
    /// This means the split/merge identity contract was broken by the caller.
    #[error("inconsistent merge: {kind} {id} is not present in the original network")]
    InconsistentMerge { kind: RecordKind, id: usize },
}

pub type GridResult<T> = Result<T, GridError>;

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for GridError {
    fn from(err: serde_yaml::Error) -> Self {
        GridError::Parse(err.to_string())
    }
}
