use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use refswitch::config::load_config_with_source;
use refswitch::inspect::InspectView;
use refswitch::operation::{self, Operation};
use refswitch::report::render_text;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, CommonArgs, OutputFormat};

/// Environment variable that overrides the log filter.
const LOG_ENV: &str = "REFSWITCH_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.common());

    let common = cli.command.common();
    let operation = to_operation(&cli.command);
    run(common, &operation)
}

fn to_operation(command: &Command) -> Operation {
    match command {
        Command::ToProject(args) => Operation::ToProject {
            folder: args.folder.clone(),
        },
        Command::ToPackage(args) => Operation::ToPackage {
            folder: args.folder.clone(),
        },
        Command::Plan(args) => Operation::Plan {
            folder: args.folder.clone(),
        },
        Command::ScanReferences(_) => Operation::ScanReferences,
        Command::CleanupReferences(_) => Operation::CleanupReferences,
        Command::ScanFiles(_) => Operation::ScanFiles,
        Command::CleanFiles(_) => Operation::CleanFiles,
        Command::Inspect(args) => Operation::Inspect {
            view: if args.by_type {
                InspectView::ByType
            } else {
                InspectView::Hierarchy
            },
        },
    }
}

fn run(common: &CommonArgs, operation: &Operation) -> Result<()> {
    let solution_dir = common
        .solution
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (config, source) = load_config_with_source(common.config.as_deref(), solution_dir)
        .context("failed to load configuration")?;
    debug!(source = %source, "loaded configuration");

    let outcome = operation::run(&common.solution, operation, &config)
        .with_context(|| format!("{} failed for {}", operation.name(), common.solution.display()))?;

    match common.format {
        OutputFormat::Text => println!("{}", render_text(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    if outcome.has_failures() {
        bail!("{} finished with failures", operation.name());
    }
    Ok(())
}

fn init_logging(common: &CommonArgs) {
    let default = if common.verbose {
        "debug"
    } else if common.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
