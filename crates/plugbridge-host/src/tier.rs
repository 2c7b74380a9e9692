//! Delegation tiers of a resolution domain.
//!
//! A domain is an ordered list of [`TierRule`]s. Each rule pairs a namespace
//! predicate with a [`Tier`]; lookups walk the list and stop at the first
//! tier that produces a module, or at a terminal rule.

use crate::archive::Archive;
use crate::error::Result;
use crate::module::{Module, TierKind};
use crate::resolver::{ModuleResolver, find_in_archives};
use std::sync::{Arc, Weak};
use tracing::debug;

/// A set of namespace prefixes, matched literally against module names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: Vec<String>,
}

impl Namespaces {
    pub fn new<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

/// Which names a rule applies to.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Names under one of the prefixes
    Within(Namespaces),
    /// Every name
    Any,
}

impl Scope {
    pub fn applies_to(&self, name: &str) -> bool {
        match self {
            Scope::Within(namespaces) => namespaces.matches(name),
            Scope::Any => true,
        }
    }
}

/// One delegate a domain can consult.
pub trait Tier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Look `name` up. `Ok(None)` means "not here", letting the domain fall
    /// through to the next rule.
    fn find(&self, name: &str) -> Result<Option<Arc<Module>>>;
}

/// A namespace predicate paired with a tier.
pub struct TierRule {
    pub scope: Scope,
    pub tier: Arc<dyn Tier>,
    /// Stop after this rule when it applies, whether or not it found the name.
    pub terminal: bool,
}

impl TierRule {
    pub fn new(scope: Scope, tier: Arc<dyn Tier>) -> Self {
        Self {
            scope,
            tier,
            terminal: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// The process's bootstrap resolver. Its misses are final.
pub struct BootstrapTier {
    resolver: Arc<dyn ModuleResolver>,
}

impl BootstrapTier {
    pub fn new(resolver: Arc<dyn ModuleResolver>) -> Self {
        Self { resolver }
    }
}

impl Tier for BootstrapTier {
    fn kind(&self) -> TierKind {
        TierKind::Bootstrap
    }

    fn find(&self, name: &str) -> Result<Option<Arc<Module>>> {
        match self.resolver.resolve(name) {
            Ok(module) => Ok(Some(module)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The host's resolver, held weakly. Any failure falls through.
pub struct HostTier {
    host: Weak<dyn ModuleResolver>,
}

impl HostTier {
    pub fn new(host: Weak<dyn ModuleResolver>) -> Self {
        Self { host }
    }
}

impl Tier for HostTier {
    fn kind(&self) -> TierKind {
        TierKind::Host
    }

    fn find(&self, name: &str) -> Result<Option<Arc<Module>>> {
        let Some(host) = self.host.upgrade() else {
            debug!("Host resolver is gone, skipping host lookup of {}", name);
            return Ok(None);
        };
        match host.resolve(name) {
            Ok(module) => Ok(Some(module)),
            Err(e) => {
                debug!("Host did not resolve {}: {}", name, e);
                Ok(None)
            }
        }
    }
}

/// Archives private to one domain: the runtime libraries or the extension.
///
/// Every hit builds a new module, so two domains reading the same archive
/// still get distinct module instances.
pub struct ArchiveTier {
    kind: TierKind,
    archives: Vec<Archive>,
    module_suffix: String,
}

impl ArchiveTier {
    pub fn new(kind: TierKind, archives: Vec<Archive>, module_suffix: impl Into<String>) -> Self {
        Self {
            kind,
            archives,
            module_suffix: module_suffix.into(),
        }
    }

    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }
}

impl Tier for ArchiveTier {
    fn kind(&self) -> TierKind {
        self.kind
    }

    fn find(&self, name: &str) -> Result<Option<Arc<Module>>> {
        find_in_archives(&self.archives, name, &self.module_suffix)
    }
}
