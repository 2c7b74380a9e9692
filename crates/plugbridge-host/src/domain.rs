//! Per-extension resolution domains.

use crate::error::{ResolutionError, Result};
use crate::module::{Module, TierKind};
use crate::resolver::{ModuleResolver, read_from_archives};
use crate::tier::{ArchiveTier, TierRule};
use plugbridge_common::sync::OnceMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Stable key for an extension archive: its canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionIdentity(PathBuf);

impl ExtensionIdentity {
    /// Canonicalise `archive`. Fails if the archive does not exist.
    pub fn from_archive(archive: &Path) -> std::io::Result<Self> {
        std::fs::canonicalize(archive).map(Self)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ExtensionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A module together with the tier that produced it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub module: Arc<Module>,
    pub tier: TierKind,
}

/// The isolated resolver for one extension.
///
/// Lookups walk the domain's tier rules in order. Results, including misses,
/// are cached per name for the life of the domain, so once a name resolves it
/// keeps resolving to the same module instance.
pub struct ResolutionDomain {
    identity: ExtensionIdentity,
    rules: Vec<TierRule>,
    extension: Arc<ArchiveTier>,
    host: Weak<dyn ModuleResolver>,
    search_paths: Vec<PathBuf>,
    symbols: OnceMap<String, Option<Resolved>>,
}

impl fmt::Debug for ResolutionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionDomain")
            .field("identity", &self.identity)
            .field("search_paths", &self.search_paths)
            .field("tiers", &self.rules.len())
            .finish()
    }
}

impl ResolutionDomain {
    pub(crate) fn new(
        identity: ExtensionIdentity,
        rules: Vec<TierRule>,
        extension: Arc<ArchiveTier>,
        host: Weak<dyn ModuleResolver>,
        search_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            identity,
            rules,
            extension,
            host,
            search_paths,
            symbols: OnceMap::new(),
        }
    }

    pub fn identity(&self) -> &ExtensionIdentity {
        &self.identity
    }

    /// Canonical path of the extension archive.
    pub fn archive(&self) -> &Path {
        self.identity.path()
    }

    /// Runtime library paths, in lookup order.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Number of names with a cached result, hits and misses alike.
    pub fn cached_names(&self) -> usize {
        self.symbols.len()
    }

    /// Resolve `name` to a module.
    pub fn resolve(&self, name: &str) -> Result<Arc<Module>> {
        self.resolve_traced(name).map(|resolved| resolved.module)
    }

    /// Resolve `name`, also reporting which tier produced it.
    pub fn resolve_traced(&self, name: &str) -> Result<Resolved> {
        let cached = self
            .symbols
            .get_or_try_insert_with(name.to_string(), || self.lookup(name))?;
        cached.ok_or_else(|| {
            ResolutionError::not_found(name, format!("domain for {}", self.identity))
        })
    }

    /// Fetch a resource: the extension archive first, then the host.
    pub fn get_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = read_from_archives(self.extension.archives(), name)? {
            return Ok(Some(bytes));
        }
        match self.host.upgrade() {
            Some(host) => host.get_resource(name),
            None => Ok(None),
        }
    }

    fn lookup(&self, name: &str) -> Result<Option<Resolved>> {
        let mut attempted: Vec<TierKind> = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            if !rule.scope.applies_to(name) {
                continue;
            }
            let kind = rule.tier.kind();
            // The host is consulted at most once, by prefix or as last resort.
            if attempted.contains(&kind) {
                continue;
            }
            attempted.push(kind);

            if let Some(module) = rule.tier.find(name)? {
                debug!("{} resolved by {} tier in {}", name, kind, self.identity);
                return Ok(Some(Resolved { module, tier: kind }));
            }
            if rule.terminal {
                break;
            }
        }

        debug!("{} not found in {}", name, self.identity);
        Ok(None)
    }
}

impl ModuleResolver for ResolutionDomain {
    fn resolve(&self, name: &str) -> Result<Arc<Module>> {
        ResolutionDomain::resolve(self, name)
    }

    fn get_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        ResolutionDomain::get_resource(self, name)
    }
}
