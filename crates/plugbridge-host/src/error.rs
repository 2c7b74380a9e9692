//! Error types for resolution domains

use std::path::PathBuf;
use thiserror::Error;

/// Result type for symbol and resource lookups
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Errors raised while resolving a name inside a domain or resolver
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// No applicable tier knows the name
    #[error("module not found: {name} (searched {scope})")]
    NotFound {
        /// Fully qualified module name
        name: String,
        /// Who searched, e.g. the extension archive of a domain
        scope: String,
    },

    /// An archive could not be read while looking for the name
    #[error("failed to read {name} from {archive}: {source}")]
    Archive {
        /// Module or resource name
        name: String,
        /// Archive being read
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolutionError {
    /// Shorthand for a not-found error.
    pub fn not_found(name: &str, scope: impl Into<String>) -> Self {
        ResolutionError::NotFound {
            name: name.to_string(),
            scope: scope.into(),
        }
    }

    /// Whether this is a plain miss rather than an I/O failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionError::NotFound { .. })
    }
}

/// Errors raised while constructing a domain
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required runtime library is not in the supplied provisioned set
    #[error("runtime library {library} required by {archive} has not been provisioned")]
    LibraryNotProvisioned {
        /// Library name and version
        library: String,
        /// Extension archive
        archive: PathBuf,
    },

    /// A provisioned library file disappeared
    #[error("runtime library {library} is no longer present at {path}")]
    LibraryMissing {
        /// Library name and version
        library: String,
        /// Expected library path
        path: PathBuf,
    },

    /// The extension archive path cannot be resolved
    #[error("extension archive {archive} is not accessible: {source}")]
    Archive {
        /// Extension archive as given by the host
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
