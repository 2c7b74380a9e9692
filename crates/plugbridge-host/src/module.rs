//! Resolved modules.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a module's bytes came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Registered in memory by the embedding process
    Memory,
    /// Read from an archive on disk
    Archive(PathBuf),
}

/// A named unit of compiled code.
///
/// Modules are shared as `Arc<Module>`; two lookups yield the same module
/// exactly when they yield the same `Arc`.
#[derive(Debug)]
pub struct Module {
    name: String,
    origin: ModuleOrigin,
    bytes: Arc<[u8]>,
}

impl Module {
    pub fn new(name: impl Into<String>, origin: ModuleOrigin, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            origin,
            bytes: bytes.into(),
        }
    }

    /// Fully qualified name, e.g. `a.b.C`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }

    /// Archive the module was read from, if any.
    pub fn archive(&self) -> Option<&Path> {
        match &self.origin {
            ModuleOrigin::Archive(path) => Some(path),
            ModuleOrigin::Memory => None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// The tier that produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    Bootstrap,
    Host,
    Runtime,
    Extension,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TierKind::Bootstrap => "bootstrap",
            TierKind::Host => "host",
            TierKind::Runtime => "runtime",
            TierKind::Extension => "extension",
        };
        f.write_str(name)
    }
}

/// Archive entry holding module `name`: `a.b.C` becomes `a/b/C.<suffix>`.
pub fn entry_name(name: &str, suffix: &str) -> String {
    format!("{}.{}", name.replace('.', "/"), suffix)
}
