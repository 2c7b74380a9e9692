//! Runtime library provisioning.
//!
//! Extension domains need a fixed set of runtime support archives that the
//! host does not bundle. The provisioner makes sure each of them exists in a
//! shared directory before any domain is built.
//!
//! # Overview
//!
//! For every requested library [`Provisioner::ensure`]:
//!
//! 1. Returns immediately when `<dir>/<artifact>-<version>.jar` exists and is
//!    non-empty. No lock, no network.
//! 2. Otherwise takes the download lock (`<dir>/.download.lock`, exclusive
//!    across threads and processes) and checks again.
//! 3. Streams the artifact into a staging file in the same directory,
//!    verifies the declared length, and renames it onto the final name.
//!
//! A failed or interrupted transfer never leaves a file under the final name.
//!
//! # Configuration
//!
//! ```toml
//! [libraries]
//! directory = "libraries/scala"
//! repository = "https://repo1.maven.org/maven2"
//! allow_non_atomic_install = false
//!
//! [network]
//! connect_timeout_secs = 30
//! read_timeout_secs = 60
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use plugbridge_common::config::BridgeConfig;
//! use plugbridge_common::provision::{Provisioner, DEFAULT_LIBRARIES};
//!
//! let provisioner = Provisioner::from_config(&BridgeConfig::default())?;
//! let provisioned = provisioner.ensure(DEFAULT_LIBRARIES)?;
//! ```

pub mod error;
pub mod http;
pub mod library;
pub mod lock;
pub mod provisioner;

pub use error::{FetchError, ProvisionError, Result};
pub use http::{ArtifactFetcher, HttpFetcher};
pub use library::{DEFAULT_LIBRARIES, MAVEN_CENTRAL, RuntimeLibrary, SCALA2_LIBRARY, SCALA3_LIBRARY};
pub use lock::{DownloadLock, LOCK_FILE_NAME};
pub use provisioner::{LibraryStatus, ProvisionedSet, Provisioner};
