//! Conversion between package references and project references.
//!
//! [`Engine::to_project`] replaces assembly/package references that a
//! scanned project can satisfy with project references, registering the
//! project in the solution when needed. [`Engine::to_package`] reverses it,
//! restoring the original reference from the reversal cache.
//!
//! All edits happen in memory on a [`Workspace`]; files are written at the
//! end. Each project file is written before its package manifest, each
//! atomically. The solution manifest is written only if every project write
//! succeeded. The reversal cache is written either way, minus what the
//! unwritten project files never received.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::issues::Issue;
use crate::packages::{PackageError, PACKAGES_CONFIG};
use crate::project::ProjectError;
use crate::scanner::ScanOutcome;
use crate::solution::{ProjectId, Solution, SolutionError};

pub mod cache;
pub mod matching;
mod to_package;
mod to_project;
pub mod workspace;

pub use cache::{CacheError, CachedPackage, ReversalCache};
pub use matching::{find_matches, Match};
pub use workspace::{LoadedProject, Workspace};

/// Errors that abort an operation before anything is written.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Solution(#[from] SolutionError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Packages(#[from] PackageError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Failure of a single conversion; the batch carries on.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("referencing {target} from {owner} would create a reference cycle")]
    CycleDetected { owner: String, target: String },
    #[error("no version found for package '{package}' referenced by {owner}")]
    UnresolvedPackageVersion { owner: String, package: String },
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Packages(#[from] PackageError),
    #[error(transparent)]
    Solution(#[from] SolutionError),
}

impl ConversionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CycleDetected { .. } => "cycle_detected",
            Self::UnresolvedPackageVersion { .. } => "unresolved_package_version",
            Self::Project(ProjectError::DuplicateReference { .. }) => "duplicate_reference",
            Self::Project(_) => "project_error",
            Self::Packages(PackageError::DuplicatePackage { .. }) => "duplicate_package",
            Self::Packages(_) => "package_error",
            Self::Solution(SolutionError::ReferencedEntryInUse { .. }) => "referenced_entry_in_use",
            Self::Solution(_) => "solution_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    ToProject,
    ToPackage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionItem {
    pub project: String,
    pub reference: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub project: String,
    pub reference: String,
    pub code: String,
    pub message: String,
}

/// What a conversion batch did.
#[derive(Debug, Default, Serialize)]
pub struct ConversionReport {
    pub direction: Direction,
    pub solution: PathBuf,
    pub converted: Vec<ConversionItem>,
    pub unconverted: Vec<ConversionItem>,
    pub failed: Vec<FailedItem>,
    /// Projects registered in the solution by this run.
    pub registered: Vec<String>,
    /// Projects removed from the solution by this run.
    pub unregistered: Vec<String>,
    pub warnings: Vec<Issue>,
    pub solution_written: bool,
}

impl ConversionReport {
    fn new(direction: Direction, solution: &Solution) -> Self {
        Self {
            direction,
            solution: solution.path().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn fail(&mut self, project: &str, reference: &str, err: &ConversionError) {
        warn!(project, reference, error = %err, "conversion failed");
        self.failed.push(FailedItem {
            project: project.to_string(),
            reference: reference.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    /// A project file could not be written: its conversions did not happen.
    /// They move to `failed`; a project with none gets one entry of its own.
    fn revoke(&mut self, project: &str, err: &ConversionError) {
        let (lost, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.converted)
            .into_iter()
            .partition(|item| item.project == project);
        self.converted = kept;
        if lost.is_empty() {
            self.fail(project, "-", err);
        }
        for item in lost {
            self.fail(&item.project, &item.reference, err);
        }
    }
}

/// Result of a single match: converted with a detail line, or skipped with
/// a reason. `registered` is set when the conversion added the target
/// project to the solution.
enum Outcome {
    Converted { detail: String, registered: bool },
    Unconverted(String),
}

/// Dry-run view of both directions.
#[derive(Debug, Default, Serialize)]
pub struct Plan {
    pub solution: PathBuf,
    pub candidates: Vec<PlannedCandidate>,
    pub to_project: Vec<PlannedConversion>,
    pub to_package: Vec<PlannedConversion>,
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedCandidate {
    pub name: String,
    pub output_name: String,
    /// Path relative to the solution folder.
    pub path: String,
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedConversion {
    pub project: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub target: String,
    /// Why the conversion would not happen, if it would not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

/// Runs conversions with an explicit configuration and a reversal cache
/// that lives as long as the engine.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    cache: ReversalCache,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: ReversalCache::default(),
        }
    }

    pub fn cache(&self) -> &ReversalCache {
        &self.cache
    }

    /// Replace matched package references with project references.
    pub fn to_project(
        &mut self,
        solution: Solution,
        scan: &ScanOutcome,
    ) -> Result<ConversionReport, EngineError> {
        let cache_path = self.prepare_cache(&solution)?;
        let mut report = ConversionReport::new(Direction::ToProject, &solution);
        let mut workspace = Workspace::load(solution)?;
        report.warnings.append(&mut workspace.warnings);
        report.warnings.extend(scan.warnings.iter().cloned());

        let before = self.cache.clone();
        to_project::run(&mut workspace, scan, &mut self.cache, &mut report);
        self.commit(&mut workspace, &before, cache_path, &mut report);
        info!(
            converted = report.converted.len(),
            unconverted = report.unconverted.len(),
            failed = report.failed.len(),
            "to-project finished"
        );
        Ok(report)
    }

    /// Replace project references to scanned projects with package
    /// references.
    pub fn to_package(
        &mut self,
        solution: Solution,
        scan: &ScanOutcome,
    ) -> Result<ConversionReport, EngineError> {
        let cache_path = self.prepare_cache(&solution)?;
        let mut report = ConversionReport::new(Direction::ToPackage, &solution);
        let mut workspace = Workspace::load(solution)?;
        report.warnings.append(&mut workspace.warnings);
        report.warnings.extend(scan.warnings.iter().cloned());

        let before = self.cache.clone();
        to_package::run(
            &mut workspace,
            scan,
            &mut self.cache,
            &self.config.packages.folder,
            &mut report,
        );
        self.commit(&mut workspace, &before, cache_path, &mut report);
        info!(
            converted = report.converted.len(),
            unconverted = report.unconverted.len(),
            failed = report.failed.len(),
            "to-package finished"
        );
        Ok(report)
    }

    /// What both directions would do, without touching any file.
    pub fn plan(&mut self, solution: Solution, scan: &ScanOutcome) -> Result<Plan, EngineError> {
        self.prepare_cache(&solution)?;
        let mut workspace = Workspace::load(solution)?;
        let mut plan = Plan {
            solution: workspace.solution.path().to_path_buf(),
            warnings: std::mem::take(&mut workspace.warnings),
            ..Plan::default()
        };
        plan.warnings.extend(scan.warnings.iter().cloned());

        for candidate in &scan.candidates {
            plan.candidates.push(PlannedCandidate {
                name: candidate.name.clone(),
                output_name: candidate.output_name.clone(),
                path: workspace.solution.relative_manifest_path(&candidate.path),
                registered: workspace.solution.find_by_path(&candidate.path).is_some(),
            });
        }
        plan.to_project = to_project::plan(&workspace, scan);
        plan.to_package = to_package::plan(&workspace, scan, &self.cache);
        Ok(plan)
    }

    /// Merge the persisted cache into memory; returns where to write it back.
    fn prepare_cache(&mut self, solution: &Solution) -> Result<Option<PathBuf>, EngineError> {
        if !self.config.cache.persist {
            return Ok(None);
        }
        let path = self.config.cache_path(solution.path());
        self.cache.merge_missing(ReversalCache::load(&path)?);
        Ok(Some(path))
    }

    /// Write what the batch changed. `before` is the cache as it was before
    /// the batch, used to undo cache edits for project files left unwritten.
    fn commit(
        &mut self,
        workspace: &mut Workspace,
        before: &ReversalCache,
        cache_path: Option<PathBuf>,
        report: &mut ConversionReport,
    ) {
        let mut unwritten: Vec<ProjectId> = Vec::new();
        let mut all_written = true;
        for project in &mut workspace.projects {
            if project.model.is_dirty() {
                if let Err(err) = project.model.save() {
                    all_written = false;
                    unwritten.push(project.id.clone());
                    report.revoke(&project.name, &err.into());
                    // The manifest stays as it is so it matches the project.
                    continue;
                }
            }
            if project.packages.is_dirty() {
                if let Err(err) = project.packages.save() {
                    all_written = false;
                    report.fail(&project.name, PACKAGES_CONFIG, &err.into());
                }
            }
        }

        for id in &unwritten {
            self.cache.revert_owner(before, id);
        }

        if !all_written {
            warn!("project writes failed; solution manifest left unchanged");
            report.registered.clear();
            report.unregistered.clear();
            report.warnings.push(Issue::warning(
                "solution_not_written",
                "some project files could not be written; the solution manifest was left unchanged",
            ));
        } else if workspace.solution.is_dirty() {
            match workspace.solution.save() {
                Ok(()) => report.solution_written = true,
                Err(err) => {
                    report.fail(
                        &workspace.solution.path().display().to_string(),
                        "-",
                        &err.into(),
                    );
                }
            }
        }

        if let Some(path) = cache_path {
            if self.cache.is_changed() {
                if let Err(err) = self.cache.save(&path) {
                    warn!(path = %path.display(), error = %err, "failed to write reversal cache");
                    report
                        .warnings
                        .push(Issue::warning("cache_not_written", err.to_string()));
                }
            }
        }
    }
}
