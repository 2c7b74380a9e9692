use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use plugbridge_common::BridgeConfig;
use plugbridge_common::provision::{DEFAULT_LIBRARIES, ProvisionedSet, Provisioner};
use std::io::Write;

/// Make sure every catalog library is installed, downloading what is missing.
pub fn run_provision(config: &BridgeConfig, out: &mut dyn Write) -> Result<ProvisionedSet> {
    let provisioner =
        Provisioner::from_config(config).context("failed to create artifact fetcher")?;
    let provisioned = provisioner
        .ensure(DEFAULT_LIBRARIES)
        .context("failed to provision runtime libraries")?;

    for (library, path) in provisioned.libraries() {
        writeln!(out, "{} {}  {}", "ready".green(), library, path.display())?;
    }
    writeln!(
        out,
        "{} libraries in {}",
        provisioned.len(),
        provisioned.directory().display()
    )?;
    Ok(provisioned)
}
