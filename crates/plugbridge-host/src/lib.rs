//! plugbridge host - isolated module resolution for secondary-language extensions
//!
//! This crate provides the per-extension resolution domains a plugin host
//! uses to load extensions compiled for a language runtime it does not ship:
//! - Archive readers for jar files and exploded directories
//! - Ordered delegation tiers (bootstrap, host API, runtime libraries, extension)
//! - A factory that builds and caches one domain per extension archive

pub mod archive;
pub mod domain;
pub mod error;
pub mod factory;
pub mod module;
pub mod resolver;
pub mod tier;

pub use domain::{ExtensionIdentity, Resolved, ResolutionDomain};
pub use error::{DomainError, ResolutionError, Result};
pub use factory::DomainFactory;
pub use module::{Module, ModuleOrigin, TierKind};
pub use resolver::{ArchiveResolver, ModuleResolver, StaticResolver};
