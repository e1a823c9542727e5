use serde::Serialize;

use super::workspace::Workspace;
use crate::packages::PackageEntry;
use crate::paths;
use crate::project::{Reference, ReferenceKind};
use crate::scanner::{CandidateProject, ScanOutcome};
use crate::solution::ProjectId;

/// A package-style reference that a scanned project can replace.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub owner: ProjectId,
    pub owner_name: String,
    pub reference: Reference,
    pub package: PackageEntry,
    pub candidate: CandidateProject,
}

/// Matches in registration order, then document order within a project.
///
/// An assembly reference matches when both the project's `packages.config`
/// and a scanned candidate's output name carry its name. A
/// `PackageReference` matches on the candidate alone, its version standing
/// in for the manifest entry. Candidates that are the owner itself are
/// ignored.
pub fn find_matches(workspace: &Workspace, scan: &ScanOutcome) -> Vec<Match> {
    let mut out = Vec::new();
    for project in &workspace.projects {
        for reference in project.model.references() {
            let package = match reference.kind {
                ReferenceKind::Assembly => project.packages.find(&reference.name),
                ReferenceKind::Package => Some(PackageEntry::new(
                    reference.name.clone(),
                    reference.version.clone().unwrap_or_default(),
                    None,
                )),
                ReferenceKind::Project => None,
            };
            let Some(package) = package else {
                continue;
            };
            let Some(candidate) = scan.find_by_output_name(&reference.name) else {
                continue;
            };
            if paths::same_path(&candidate.path, project.model.path()) {
                continue;
            }
            out.push(Match {
                owner: project.id.clone(),
                owner_name: project.name.clone(),
                reference,
                package,
                candidate: candidate.clone(),
            });
        }
    }
    out
}
