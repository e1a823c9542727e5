use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "refswitch")]
#[command(about = "Switch solution references between packages and projects, and keep them tidy")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Replace package references with references to projects found in a folder.
    ToProject(ConvertArgs),
    /// Turn references to projects found in a folder back into package references.
    ToPackage(ConvertArgs),
    /// Report dangling project references, orphan entries and missing mappings.
    ScanReferences(CommonArgs),
    /// Remove the dangling project references a fresh scan finds.
    CleanupReferences(CommonArgs),
    /// List files under project folders that no project declares.
    ScanFiles(CommonArgs),
    /// Scan for undeclared files and delete them.
    CleanFiles(CommonArgs),
    /// Show the solution's projects by folder hierarchy or by type.
    Inspect(InspectArgs),
    /// Show what to-project and to-package would do, without writing.
    Plan(ConvertArgs),
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Solution file to operate on.
    #[arg(long, short = 's')]
    pub solution: PathBuf,
    /// Config file. Defaults to refswitch.toml next to the solution if present.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log progress at debug level.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,
    /// Log errors only.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Folder to scan for candidate projects.
    #[arg(long, short = 'f')]
    pub folder: PathBuf,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Group projects by type instead of by solution folder.
    #[arg(long)]
    pub by_type: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::ToProject(args) | Self::ToPackage(args) | Self::Plan(args) => &args.common,
            Self::Inspect(args) => &args.common,
            Self::ScanReferences(args)
            | Self::CleanupReferences(args)
            | Self::ScanFiles(args)
            | Self::CleanFiles(args) => args,
        }
    }
}
