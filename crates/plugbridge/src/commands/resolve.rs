use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use plugbridge_common::BridgeConfig;
use plugbridge_common::provision::{DEFAULT_LIBRARIES, Provisioner};
use plugbridge_host::{
    ArchiveResolver, DomainFactory, ModuleOrigin, ModuleResolver, StaticResolver,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs of `plugbridge resolve`.
#[derive(Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Extension archive, a jar or an exploded directory
    pub archive: PathBuf,
    /// Archives standing in for the host's API
    pub hosts: Vec<PathBuf>,
    /// Archives standing in for the platform's bootstrap modules
    pub bootstrap: Vec<PathBuf>,
    /// Look `name` up as a resource path instead of a module
    pub resource: bool,
    pub name: String,
}

/// Build a domain for one extension archive and resolve a single name in it.
pub fn run_resolve(config: &BridgeConfig, args: &ResolveArgs, out: &mut dyn Write) -> Result<()> {
    let provisioner =
        Provisioner::from_config(config).context("failed to create artifact fetcher")?;
    let provisioned = provisioner
        .ensure(DEFAULT_LIBRARIES)
        .context("failed to provision runtime libraries")?;

    let suffix = config.archives.module_suffix.as_str();
    let bootstrap: Arc<dyn ModuleResolver> = if args.bootstrap.is_empty() {
        Arc::new(StaticResolver::new("bootstrap"))
    } else {
        Arc::new(ArchiveResolver::new(args.bootstrap.iter().cloned(), suffix))
    };
    let host: Arc<dyn ModuleResolver> =
        Arc::new(ArchiveResolver::new(args.hosts.iter().cloned(), suffix));

    let factory = DomainFactory::new(config, bootstrap, DEFAULT_LIBRARIES);
    let domain = factory
        .create_domain(&args.archive, &host, &provisioned)
        .with_context(|| format!("failed to create domain for {}", args.archive.display()))?;

    if args.resource {
        let Some(bytes) = domain.get_resource(&args.name)? else {
            bail!("resource {} not found in {}", args.name, domain.identity());
        };
        writeln!(out, "{}  {} bytes", args.name.bold(), bytes.len())?;
        return Ok(());
    }

    let resolved = domain.resolve_traced(&args.name)?;
    let origin = match resolved.module.origin() {
        ModuleOrigin::Memory => "memory".to_string(),
        ModuleOrigin::Archive(path) => path.display().to_string(),
    };
    writeln!(
        out,
        "{}  tier={}  origin={}  size={}",
        resolved.module.name().bold(),
        resolved.tier,
        origin,
        resolved.module.bytes().len()
    )?;
    Ok(())
}
