//! Error types for apidiff-core.

use thiserror::Error;

/// Failure to produce a symbol table for one package at one revision.
///
/// These are recoverable: the engine degrades the affected side to an
/// absent table and reports a warning.
#[derive(Error, Debug)]
pub enum LoadError {
    /// IO error reading package sources.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file could not be parsed.
    #[error("Failed to parse {file}: {message}")]
    Parse {
        /// File that failed to parse.
        file: String,
        /// Description of the failure.
        message: String,
    },

    /// The revision or package could not be read at all.
    #[error("Package unavailable: {message}")]
    Unavailable {
        /// Description of why the package is unavailable.
        message: String,
    },
}

impl LoadError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        LoadError::Unavailable {
            message: message.into(),
        }
    }
}

/// Symbol table construction invariant violations.
///
/// These indicate a loader defect rather than bad input and stop the
/// comparison of the affected package.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The same exported key was inserted twice.
    #[error("Duplicate symbol {name} in package {package}")]
    DuplicateSymbol {
        /// Package being built.
        package: String,
        /// Offending qualified name.
        name: String,
    },
}

/// Everything that can go wrong while turning sources into a table.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Table(#[from] TableError),
}
