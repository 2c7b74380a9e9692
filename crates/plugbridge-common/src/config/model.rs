use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration from plugbridge.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Runtime library storage and installation settings
    #[serde(default)]
    pub libraries: LibrariesSection,

    /// Network settings for the artifact fetcher
    #[serde(default)]
    pub network: NetworkSection,

    /// Namespace prefixes that route lookups to tiers
    #[serde(default)]
    pub namespaces: NamespaceSection,

    /// Archive layout settings
    #[serde(default)]
    pub archives: ArchiveSection,
}

/// [libraries] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrariesSection {
    /// Shared directory holding the runtime library files.
    #[serde(default = "default_library_directory")]
    pub directory: PathBuf,

    /// Repository base URL. Replaces the catalog's default repository, never
    /// the coordinates.
    #[serde(default)]
    pub repository: Option<String>,

    /// Allow a copy-then-delete install when the atomic rename fails.
    #[serde(default)]
    pub allow_non_atomic_install: bool,
}

impl Default for LibrariesSection {
    fn default() -> Self {
        Self {
            directory: default_library_directory(),
            repository: None,
            allow_non_atomic_install: false,
        }
    }
}

/// [network] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSection {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for the whole transfer in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// User agent string.
    pub user_agent: Option<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            user_agent: None,
        }
    }
}

impl NetworkSection {
    /// The user agent sent with every request.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("plugbridge/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// [namespaces] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSection {
    /// Platform namespaces, always served by the bootstrap resolver.
    #[serde(default = "default_bootstrap_prefixes")]
    pub bootstrap: Vec<String>,

    /// Namespaces owned by the host API.
    #[serde(default = "default_host_prefixes")]
    pub host: Vec<String>,

    /// Namespaces owned by the provisioned runtime libraries.
    #[serde(default = "default_runtime_prefixes")]
    pub runtime: Vec<String>,
}

impl Default for NamespaceSection {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap_prefixes(),
            host: default_host_prefixes(),
            runtime: default_runtime_prefixes(),
        }
    }
}

/// [archives] section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSection {
    /// File suffix of compiled module entries, without the dot.
    #[serde(default = "default_module_suffix")]
    pub module_suffix: String,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            module_suffix: default_module_suffix(),
        }
    }
}

fn default_library_directory() -> PathBuf {
    PathBuf::from("libraries").join("scala")
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_module_suffix() -> String {
    "class".to_string()
}

fn prefixes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_bootstrap_prefixes() -> Vec<String> {
    prefixes(&["java.", "javax.", "jdk.", "sun."])
}

fn default_host_prefixes() -> Vec<String> {
    prefixes(&["org.bukkit.", "io.papermc.", "net.kyori.", "com.destroystokyo."])
}

fn default_runtime_prefixes() -> Vec<String> {
    prefixes(&["scala."])
}
