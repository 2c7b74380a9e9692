//! Resolver capabilities consumed from, and offered to, the host.

use crate::archive::Archive;
use crate::error::{ResolutionError, Result};
use crate::module::{Module, ModuleOrigin, entry_name};
use plugbridge_common::sync::OnceMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A source of modules and resources.
///
/// The host supplies one per extension; the bootstrap tier uses one for the
/// platform's own namespaces; every [`ResolutionDomain`](crate::ResolutionDomain)
/// is one too, so a domain can serve as the host of another.
pub trait ModuleResolver: Send + Sync {
    /// Resolve a fully qualified module name.
    fn resolve(&self, name: &str) -> Result<Arc<Module>>;

    /// Fetch an embedded resource by path.
    fn get_resource(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory resolver with a fixed set of modules and resources.
#[derive(Debug, Default)]
pub struct StaticResolver {
    label: String,
    modules: HashMap<String, Arc<Module>>,
    resources: HashMap<String, Vec<u8>>,
}

impl StaticResolver {
    /// Create an empty resolver. `label` names it in not-found errors.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Add a module.
    pub fn with_module(mut self, name: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        let module = Module::new(name, ModuleOrigin::Memory, bytes);
        self.modules.insert(name.to_string(), Arc::new(module));
        self
    }

    /// Add a resource.
    pub fn with_resource(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(name.to_string(), bytes.into());
        self
    }
}

impl ModuleResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Result<Arc<Module>> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ResolutionError::not_found(name, self.label.as_str()))
    }

    fn get_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.resources.get(name.trim_start_matches('/')).cloned())
    }
}

/// Resolver over an ordered list of archives, first match wins.
///
/// Resolved modules are memoised so every caller shares one instance per name.
pub struct ArchiveResolver {
    archives: Vec<Archive>,
    module_suffix: String,
    modules: OnceMap<String, Option<Arc<Module>>>,
}

impl ArchiveResolver {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>, module_suffix: impl Into<String>) -> Self {
        Self {
            archives: paths.into_iter().map(Archive::new).collect(),
            module_suffix: module_suffix.into(),
            modules: OnceMap::new(),
        }
    }

    fn scope(&self) -> String {
        let paths: Vec<String> = self
            .archives
            .iter()
            .map(|a| a.path().display().to_string())
            .collect();
        format!("archives [{}]", paths.join(", "))
    }
}

impl ModuleResolver for ArchiveResolver {
    fn resolve(&self, name: &str) -> Result<Arc<Module>> {
        let found = self
            .modules
            .get_or_try_insert_with(name.to_string(), || {
                find_in_archives(&self.archives, name, &self.module_suffix)
            })?;
        found.ok_or_else(|| ResolutionError::not_found(name, self.scope()))
    }

    fn get_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        read_from_archives(&self.archives, name)
    }
}

/// Look `name` up in each archive in order, building a fresh module on a hit.
pub(crate) fn find_in_archives(
    archives: &[Archive],
    name: &str,
    suffix: &str,
) -> Result<Option<Arc<Module>>> {
    let entry = entry_name(name, suffix);
    for archive in archives {
        let bytes = archive
            .read(&entry)
            .map_err(|source| ResolutionError::Archive {
                name: name.to_string(),
                archive: archive.path().to_path_buf(),
                source,
            })?;
        if let Some(bytes) = bytes {
            let origin = ModuleOrigin::Archive(archive.path().to_path_buf());
            return Ok(Some(Arc::new(Module::new(name, origin, bytes))));
        }
    }
    Ok(None)
}

/// Read resource `name` from the first archive that has it.
pub(crate) fn read_from_archives(archives: &[Archive], name: &str) -> Result<Option<Vec<u8>>> {
    for archive in archives {
        let bytes = archive
            .read(name)
            .map_err(|source| ResolutionError::Archive {
                name: name.to_string(),
                archive: archive.path().to_path_buf(),
                source,
            })?;
        if bytes.is_some() {
            return Ok(bytes);
        }
    }
    Ok(None)
}
