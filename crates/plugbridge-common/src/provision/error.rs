//! Error types for library provisioning.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an [`ArtifactFetcher`](crate::provision::ArtifactFetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or transfer failure
    #[error("network error: {0}")]
    Network(String),

    /// Timed out
    #[error("timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds
        seconds: u64,
    },

    /// Anything but 200 OK
    #[error("unexpected HTTP status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Fewer or more bytes than the declared content length
    #[error("transfer incomplete: expected {expected} bytes, received {received}")]
    Truncated {
        /// Declared content length
        expected: u64,
        /// Bytes actually received
        received: u64,
    },

    /// The source returned no content
    #[error("empty response body")]
    Empty,

    /// Writing the downloaded bytes failed
    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that make [`Provisioner::ensure`](crate::provision::Provisioner::ensure) fail.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Fetching a library failed
    #[error("failed to fetch {library} from {url}: {source}")]
    Fetch {
        /// Library name and version
        library: String,
        /// Remote source
        url: String,
        #[source]
        source: FetchError,
    },

    /// The download lock could not be taken
    #[error("failed to acquire download lock {path}: {source}")]
    Lock {
        /// Lock file
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shared library directory is unusable
    #[error("library directory {path} is unusable: {source}")]
    Directory {
        /// Library directory
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure while staging a download
    #[error("filesystem error for {library} at {path}: {source}")]
    Io {
        /// Library name and version
        library: String,
        /// Path being written
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving the staged file onto its final name failed
    #[error("failed to install {library} at {path}: {source}")]
    Install {
        /// Library name and version
        library: String,
        /// Final library path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy fallback after a failed rename also failed
    #[error("non-atomic install of {library} at {path} failed: {source}")]
    NonAtomicInstall {
        /// Library name and version
        library: String,
        /// Final library path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;
