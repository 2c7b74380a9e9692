//! Runtime library catalog.

use serde::Serialize;
use std::fmt;

/// Maven Central, the default artifact repository.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

/// Scala 3 standard library.
pub const SCALA3_LIBRARY: RuntimeLibrary =
    RuntimeLibrary::maven("scala3-library", "org.scala-lang", "scala3-library_3", "3.3.1");

/// Scala 2.13 standard library, required by the Scala 3 library at runtime.
pub const SCALA2_LIBRARY: RuntimeLibrary =
    RuntimeLibrary::maven("scala-library", "org.scala-lang", "scala-library", "2.13.12");

/// Every library an extension domain needs.
pub const DEFAULT_LIBRARIES: &[RuntimeLibrary] = &[SCALA3_LIBRARY, SCALA2_LIBRARY];

/// One required support archive.
///
/// Libraries are compile-time constants; only the repository base may be
/// swapped for a mirror at provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuntimeLibrary {
    /// Logical name
    pub name: &'static str,
    /// Repository group, dot separated
    pub group: &'static str,
    /// Repository artifact id
    pub artifact: &'static str,
    /// Version
    pub version: &'static str,
    /// Repository base URL
    pub repository: &'static str,
}

impl RuntimeLibrary {
    /// A library hosted on Maven Central.
    pub const fn maven(
        name: &'static str,
        group: &'static str,
        artifact: &'static str,
        version: &'static str,
    ) -> Self {
        Self {
            name,
            group,
            artifact,
            version,
            repository: MAVEN_CENTRAL,
        }
    }

    /// The same library hosted in another repository.
    pub const fn with_repository(self, repository: &'static str) -> Self {
        Self { repository, ..self }
    }

    /// Local file name, derived from artifact and version.
    pub fn file_name(&self) -> String {
        format!("{}-{}.jar", self.artifact, self.version)
    }

    /// Remote URL in this library's own repository.
    pub fn url(&self) -> String {
        self.url_in(self.repository)
    }

    /// Remote URL in `repository`, laid out as `/<group>/<artifact>/<version>/<file>`.
    pub fn url_in(&self, repository: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            repository.trim_end_matches('/'),
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }
}

impl fmt::Display for RuntimeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
