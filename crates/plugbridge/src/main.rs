use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use plugbridge::LogOptions;
use plugbridge::commands::{ResolveArgs, run_provision, run_resolve, run_status};
use plugbridge_common::BridgeConfig;
use std::path::PathBuf;
use std::process::ExitCode;

/// plugbridge - runtime library provisioning and isolated extension resolution
#[derive(Parser)]
#[command(name = "plugbridge")]
#[command(about = "Provision runtime libraries and inspect extension resolution", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./plugbridge.toml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write a daily log file into this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Download any missing runtime libraries
    Provision,
    /// Show which runtime libraries are installed
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a module name inside an extension's domain
    Resolve {
        /// Extension archive (jar or directory)
        #[arg(short, long)]
        archive: PathBuf,
        /// Host API archive; may be repeated
        #[arg(long = "host", value_name = "ARCHIVE")]
        hosts: Vec<PathBuf>,
        /// Bootstrap archive; may be repeated
        #[arg(long, value_name = "ARCHIVE")]
        bootstrap: Vec<PathBuf>,
        /// Treat NAME as a resource path
        #[arg(long)]
        resource: bool,
        /// Fully qualified module name, e.g. com.example.Main
        name: String,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = BridgeConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Provision => run_provision(&config, &mut stdout).map(|_| ()),
        Commands::Status { json } => run_status(&config, json, &mut stdout),
        Commands::Resolve {
            archive,
            hosts,
            bootstrap,
            resource,
            name,
        } => {
            let args = ResolveArgs {
                archive,
                hosts,
                bootstrap,
                resource,
                name,
            };
            run_resolve(&config, &args, &mut stdout)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = LogOptions {
        json: cli.json_logs,
        directory: cli.log_dir.clone(),
    };
    let _guard = match plugbridge::logging::init(&options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("command failed: {:?}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
