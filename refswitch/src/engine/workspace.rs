use std::path::PathBuf;

use tracing::{debug, warn};

use super::EngineError;
use crate::graph::ReferenceGraph;
use crate::issues::Issue;
use crate::packages::{PackageManifest, PACKAGES_CONFIG};
use crate::paths;
use crate::project::{ProjectModel, Reference};
use crate::scanner::ScanOutcome;
use crate::solution::{ProjectEntry, ProjectId, Solution};

/// A compilable solution entry with its project file and package manifest.
#[derive(Debug)]
pub struct LoadedProject {
    pub id: ProjectId,
    pub name: String,
    pub model: ProjectModel,
    pub packages: PackageManifest,
}

impl LoadedProject {
    pub fn is_dirty(&self) -> bool {
        self.model.is_dirty() || self.packages.is_dirty()
    }
}

/// Everything one operation edits, loaded up front.
#[derive(Debug)]
pub struct Workspace {
    pub solution: Solution,
    pub projects: Vec<LoadedProject>,
    pub warnings: Vec<Issue>,
}

impl Workspace {
    /// Load every compilable entry in registration order. Entries whose
    /// project file is missing are skipped with a warning; malformed files
    /// abort the load.
    pub fn load(solution: Solution) -> Result<Self, EngineError> {
        let mut projects = Vec::new();
        let mut warnings = Vec::new();
        for entry in solution.compilable() {
            let path = solution.absolute_path(entry);
            if !path.is_file() {
                warn!(project = %entry.name, path = %path.display(), "project file missing");
                warnings.push(Issue::warning(
                    "missing_project_file",
                    format!("{}: {} does not exist", entry.name, path.display()),
                ));
                continue;
            }
            let model = ProjectModel::load(&path)?;
            let packages = PackageManifest::load_or_empty(&model.folder().join(PACKAGES_CONFIG))?;
            projects.push(LoadedProject {
                id: entry.id.clone(),
                name: entry.name.clone(),
                model,
                packages,
            });
        }
        debug!(projects = projects.len(), "loaded workspace");
        Ok(Self {
            solution,
            projects,
            warnings,
        })
    }

    /// Solution entry a project reference points at: by id, else by path.
    pub fn target_entry(&self, owner: &LoadedProject, reference: &Reference) -> Option<&ProjectEntry> {
        reference
            .project_id
            .as_ref()
            .and_then(|id| self.solution.find(id))
            .or_else(|| {
                let path = paths::resolve(owner.model.folder(), &reference.include);
                self.solution.find_by_path(&path)
            })
    }

    /// Absolute path a project reference points at.
    pub fn target_path(&self, owner: &LoadedProject, reference: &Reference) -> PathBuf {
        match self.target_entry(owner, reference) {
            Some(entry) => self.solution.absolute_path(entry),
            None => paths::resolve(owner.model.folder(), &reference.include),
        }
    }

    /// Ids of loaded projects that hold a project reference to `target`.
    pub fn holders_of(&self, target: &ProjectId) -> Vec<ProjectId> {
        self.projects
            .iter()
            .filter(|project| {
                project.model.project_references().iter().any(|r| {
                    self.target_entry(project, r)
                        .is_some_and(|entry| &entry.id == target)
                })
            })
            .map(|project| project.id.clone())
            .collect()
    }

    /// Reference graph of the loaded projects, extended with the edges that
    /// scanned candidates declare.
    pub fn graph(&self, scan: Option<&ScanOutcome>) -> ReferenceGraph {
        let mut graph = ReferenceGraph::new();
        for project in &self.projects {
            for reference in project.model.project_references() {
                graph.add_edge(project.model.path(), &self.target_path(project, &reference));
            }
        }
        if let Some(scan) = scan {
            for candidate in &scan.candidates {
                for target in candidate.referenced_paths() {
                    graph.add_edge(&candidate.path, &target);
                }
            }
        }
        graph
    }
}
