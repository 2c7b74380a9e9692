//! Construction and caching of resolution domains.

use crate::archive::Archive;
use crate::domain::{ExtensionIdentity, ResolutionDomain};
use crate::error::DomainError;
use crate::module::TierKind;
use crate::resolver::ModuleResolver;
use crate::tier::{ArchiveTier, BootstrapTier, HostTier, Namespaces, Scope, Tier, TierRule};
use plugbridge_common::config::BridgeConfig;
use plugbridge_common::provision::{ProvisionedSet, RuntimeLibrary};
use plugbridge_common::sync::OnceMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds one [`ResolutionDomain`] per extension archive and hands out the
/// cached instance on every later request for the same archive.
pub struct DomainFactory {
    bootstrap: Arc<dyn ModuleResolver>,
    bootstrap_namespaces: Namespaces,
    host_namespaces: Namespaces,
    runtime_namespaces: Namespaces,
    module_suffix: String,
    required: Vec<RuntimeLibrary>,
    domains: OnceMap<ExtensionIdentity, Arc<ResolutionDomain>>,
}

impl DomainFactory {
    /// Create a factory.
    ///
    /// # Arguments
    /// * `config` - namespace prefixes and archive layout
    /// * `bootstrap` - resolver for the platform's own namespaces
    /// * `required` - libraries every domain needs provisioned
    pub fn new(
        config: &BridgeConfig,
        bootstrap: Arc<dyn ModuleResolver>,
        required: &[RuntimeLibrary],
    ) -> Self {
        Self {
            bootstrap,
            bootstrap_namespaces: Namespaces::new(config.namespaces.bootstrap.iter().cloned()),
            host_namespaces: Namespaces::new(config.namespaces.host.iter().cloned()),
            runtime_namespaces: Namespaces::new(config.namespaces.runtime.iter().cloned()),
            module_suffix: config.archives.module_suffix.clone(),
            required: required.to_vec(),
            domains: OnceMap::new(),
        }
    }

    /// Return the domain for `archive`, building it on first request.
    ///
    /// Concurrent calls for the same archive build at most one domain; the
    /// others receive it. Later calls ignore `host` and `provisioned`.
    pub fn create_domain(
        &self,
        archive: &Path,
        host: &Arc<dyn ModuleResolver>,
        provisioned: &ProvisionedSet,
    ) -> Result<Arc<ResolutionDomain>, DomainError> {
        let identity =
            ExtensionIdentity::from_archive(archive).map_err(|source| DomainError::Archive {
                archive: archive.to_path_buf(),
                source,
            })?;

        if let Some(existing) = self.domains.get(&identity) {
            debug!("Reusing resolution domain for {}", identity);
            return Ok(existing);
        }

        self.domains
            .get_or_try_insert_with(identity.clone(), || self.build(identity, host, provisioned))
    }

    /// The live domain for `identity`, if any.
    pub fn get(&self, identity: &ExtensionIdentity) -> Option<Arc<ResolutionDomain>> {
        self.domains.get(identity)
    }

    /// Forget the domain for `identity` once the host retires the extension.
    ///
    /// A build still running for `identity` finishes first and its domain is
    /// the one retired; the next `create_domain` builds a fresh one.
    pub fn retire(&self, identity: &ExtensionIdentity) -> Option<Arc<ResolutionDomain>> {
        let retired = self.domains.remove(identity);
        if retired.is_some() {
            info!("Retired resolution domain for {}", identity);
        }
        retired
    }

    /// Number of live domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    fn build(
        &self,
        identity: ExtensionIdentity,
        host: &Arc<dyn ModuleResolver>,
        provisioned: &ProvisionedSet,
    ) -> Result<Arc<ResolutionDomain>, DomainError> {
        for library in &self.required {
            let Some(path) = provisioned.path_of(library) else {
                return Err(DomainError::LibraryNotProvisioned {
                    library: library.to_string(),
                    archive: identity.path().to_path_buf(),
                });
            };
            if !provisioned.verify(library) {
                return Err(DomainError::LibraryMissing {
                    library: library.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }

        let search_paths = provisioned.search_paths();
        let runtime = ArchiveTier::new(
            TierKind::Runtime,
            search_paths.iter().cloned().map(Archive::new).collect(),
            self.module_suffix.as_str(),
        );
        let extension = Arc::new(ArchiveTier::new(
            TierKind::Extension,
            vec![Archive::new(identity.path())],
            self.module_suffix.as_str(),
        ));
        let host_tier: Arc<dyn Tier> = Arc::new(HostTier::new(Arc::downgrade(host)));

        let rules = vec![
            TierRule::new(
                Scope::Within(self.bootstrap_namespaces.clone()),
                Arc::new(BootstrapTier::new(self.bootstrap.clone())),
            )
            .terminal(),
            TierRule::new(Scope::Within(self.host_namespaces.clone()), host_tier.clone()),
            TierRule::new(Scope::Within(self.runtime_namespaces.clone()), Arc::new(runtime)),
            TierRule::new(Scope::Any, extension.clone()),
            TierRule::new(Scope::Any, host_tier),
        ];

        info!(
            "Created resolution domain for {} ({} runtime libraries)",
            identity,
            search_paths.len()
        );

        Ok(Arc::new(ResolutionDomain::new(
            identity,
            rules,
            extension,
            Arc::downgrade(host),
            search_paths,
        )))
    }
}
