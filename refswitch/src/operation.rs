//! The closed set of operations and their dispatcher.
//!
//! Every operation loads the solution fresh, does its work and returns an
//! [`OperationOutcome`]. Partial success is part of the outcome; only
//! problems that stop an operation before it writes anything are errors.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::consistency::{
    CleanFilesReport, CleanupReport, ConsistencyScanner, FileScanReport, ReferenceReport,
};
use crate::engine::{ConversionReport, Engine, EngineError, Plan};
use crate::inspect::{inspect, InspectReport, InspectView};
use crate::scanner::{FolderScanner, ScanError, ScanOutcome};
use crate::solution::{Solution, SolutionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Swap package references for references to projects under `folder`.
    ToProject { folder: PathBuf },
    /// Swap references to projects under `folder` back to packages.
    ToPackage { folder: PathBuf },
    ScanReferences,
    CleanupReferences,
    ScanFiles,
    /// Scan files, then delete what that scan reported.
    CleanFiles,
    Inspect { view: InspectView },
    /// Dry run of both conversions against `folder`.
    Plan { folder: PathBuf },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToProject { .. } => "to-project",
            Self::ToPackage { .. } => "to-package",
            Self::ScanReferences => "scan-references",
            Self::CleanupReferences => "cleanup-references",
            Self::ScanFiles => "scan-files",
            Self::CleanFiles => "clean-files",
            Self::Inspect { .. } => "inspect",
            Self::Plan { .. } => "plan",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanFilesOutcome {
    pub scan: FileScanReport,
    pub clean: CleanFilesReport,
}

#[derive(Debug, Serialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum OperationOutcome {
    ToProject(ConversionReport),
    ToPackage(ConversionReport),
    ScanReferences(ReferenceReport),
    CleanupReferences(CleanupReport),
    ScanFiles(FileScanReport),
    CleanFiles(CleanFilesOutcome),
    Inspect(InspectReport),
    Plan(Plan),
}

impl OperationOutcome {
    /// Whether the caller should signal failure: a failed item, a write that
    /// did not happen, or a reference finding that breaks the solution.
    pub fn has_failures(&self) -> bool {
        match self {
            Self::ToProject(report) | Self::ToPackage(report) => report.has_failures(),
            Self::ScanReferences(report) => !report.is_clean(),
            Self::CleanupReferences(report) => report.has_failures(),
            Self::CleanFiles(outcome) => outcome.clean.has_failures(),
            Self::ScanFiles(_) | Self::Inspect(_) | Self::Plan(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Solution(#[from] SolutionError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Run one operation against the solution at `solution_path`.
pub fn run(
    solution_path: &Path,
    operation: &Operation,
    config: &Config,
) -> Result<OperationOutcome, OperationError> {
    info!(operation = operation.name(), solution = %solution_path.display(), "starting");
    let solution = Solution::load(solution_path)?;

    let outcome = match operation {
        Operation::ToProject { folder } => {
            let scan = scan_folder(folder, config)?;
            OperationOutcome::ToProject(Engine::new(config.clone()).to_project(solution, &scan)?)
        }
        Operation::ToPackage { folder } => {
            let scan = scan_folder(folder, config)?;
            OperationOutcome::ToPackage(Engine::new(config.clone()).to_package(solution, &scan)?)
        }
        Operation::Plan { folder } => {
            let scan = scan_folder(folder, config)?;
            OperationOutcome::Plan(Engine::new(config.clone()).plan(solution, &scan)?)
        }
        Operation::ScanReferences => {
            OperationOutcome::ScanReferences(ConsistencyScanner::new(config).scan_references(&solution))
        }
        Operation::CleanupReferences => OperationOutcome::CleanupReferences(
            ConsistencyScanner::new(config).cleanup_references(&solution),
        ),
        Operation::ScanFiles => {
            OperationOutcome::ScanFiles(ConsistencyScanner::new(config).scan_files(&solution))
        }
        Operation::CleanFiles => {
            let scanner = ConsistencyScanner::new(config);
            let scan = scanner.scan_files(&solution);
            let clean = scanner.clean_files(&scan);
            OperationOutcome::CleanFiles(CleanFilesOutcome { scan, clean })
        }
        Operation::Inspect { view } => OperationOutcome::Inspect(inspect(&solution, *view)),
    };
    Ok(outcome)
}

fn scan_folder(folder: &Path, config: &Config) -> Result<ScanOutcome, ScanError> {
    let scan = FolderScanner::new(folder, &config.scan).scan()?;
    debug!(candidates = scan.candidates.len(), root = %scan.root.display(), "scanned folder");
    Ok(scan)
}
