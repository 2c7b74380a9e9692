use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use plugbridge_common::BridgeConfig;
use plugbridge_common::provision::{DEFAULT_LIBRARIES, Provisioner};
use std::io::Write;

/// Report which catalog libraries are installed. Never touches the network.
pub fn run_status(config: &BridgeConfig, json: bool, out: &mut dyn Write) -> Result<()> {
    let provisioner =
        Provisioner::from_config(config).context("failed to create artifact fetcher")?;
    let statuses = provisioner.status(DEFAULT_LIBRARIES);

    if json {
        let rendered =
            serde_json::to_string_pretty(&statuses).context("failed to serialize status")?;
        writeln!(out, "{}", rendered)?;
        return Ok(());
    }

    writeln!(out, "Library directory: {}", provisioner.directory().display())?;
    for status in &statuses {
        match status.size {
            Some(size) if status.installed => writeln!(
                out,
                "  {} {} ({} KB)",
                "installed".green(),
                status.library,
                size / 1024
            )?,
            _ => writeln!(
                out,
                "  {} {}  <- {}",
                "missing".yellow(),
                status.library,
                provisioner.source_url(&status.library)
            )?,
        }
    }
    Ok(())
}
