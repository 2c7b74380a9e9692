//! Shared building blocks for plugbridge: configuration, runtime library
//! provisioning, and keyed caching/locking primitives.

pub mod config;
pub mod provision;
pub mod sync;

pub use config::{BridgeConfig, ConfigError};
pub use provision::{ProvisionError, ProvisionedSet, Provisioner, RuntimeLibrary};
