mod coordinator;
mod flows;
mod lang_sync;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use semver::Version;
use tracing_subscriber::EnvFilter;
use versionup_core::parse_version_dir;

use crate::flows::{
    run_check_license_command, run_plan_command, run_set_version_command, run_status_command,
    run_upgrade_command, AppContext,
};
use crate::render::TerminalRenderer;

const EXIT_INFRASTRUCTURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "versionup")]
#[command(about = "Applies versioned upgrade packages to an installed application", long_about = None)]
struct Cli {
    /// Application root containing .env and database/upgrade.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Config file; defaults to <root>/versionup.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply every pending package up to the target version.
    Upgrade {
        #[arg(long, value_parser = parse_target)]
        target: Option<Version>,
    },
    Status,
    /// List the packages an upgrade would apply.
    Plan {
        #[arg(long, value_parser = parse_target)]
        target: Option<Version>,
    },
    /// Record the installed version in .env.
    SetVersion { version: String },
    CheckLicense,
}

fn parse_target(raw: &str) -> Result<Version, String> {
    parse_version_dir(raw).ok_or_else(|| format!("expected MAJOR.MINOR.PATCH, got '{raw}'"))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    let context = AppContext::load(&cli.root, cli.config.as_deref())?;
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Upgrade { target } => run_upgrade_command(&context, target, renderer),
        Commands::Status => run_status_command(&context, renderer),
        Commands::Plan { target } => run_plan_command(&context, target, renderer),
        Commands::SetVersion { version } => run_set_version_command(&context, &version, renderer),
        Commands::CheckLicense => run_check_license_command(&context, renderer),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_INFRASTRUCTURE)
        }
    }
}
