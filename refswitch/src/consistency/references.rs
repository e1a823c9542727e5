use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::ConsistencyScanner;
use crate::graph::ReferenceGraph;
use crate::issues::Issue;
use crate::paths;
use crate::project::{ProjectModel, Reference};
use crate::solution::{ProjectId, Solution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingReason {
    /// No solution entry has the referenced id or path.
    UnknownProject,
    /// The entry exists but its project file does not.
    TargetMissingOnDisk,
}

/// A project reference that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub project: String,
    pub project_path: PathBuf,
    pub reference: String,
    pub include: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ProjectId>,
    pub reason: DanglingReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    MissingOnDisk,
    Unreferenced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanEntry {
    pub id: ProjectId,
    pub name: String,
    pub path: String,
    pub reason: OrphanReason,
}

/// A declared solution configuration an entry has no mapping for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingMapping {
    pub project: String,
    pub solution_config: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ReferenceReport {
    pub solution: PathBuf,
    pub dangling: Vec<DanglingReference>,
    pub orphans: Vec<OrphanEntry>,
    pub missing_mappings: Vec<MissingMapping>,
    /// Each cycle as solution-relative paths, first and last equal.
    pub cycles: Vec<Vec<String>>,
    pub warnings: Vec<Issue>,
}

impl ReferenceReport {
    /// No finding beyond informational unreferenced entries.
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty()
            && self.missing_mappings.is_empty()
            && self.cycles.is_empty()
            && self
                .orphans
                .iter()
                .all(|o| o.reason == OrphanReason::Unreferenced)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    pub solution: PathBuf,
    pub removed: Vec<DanglingReference>,
    pub failed: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl CleanupReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl ConsistencyScanner<'_> {
    /// Check every compilable entry's project references against the
    /// solution and the disk.
    pub fn scan_references(&self, solution: &Solution) -> ReferenceReport {
        let mut report = ReferenceReport {
            solution: solution.path().to_path_buf(),
            ..ReferenceReport::default()
        };
        for message in solution.projects_with_parents().warnings {
            report.warnings.push(Issue::warning("orphan_parent", message));
        }
        for line in solution.stale_config_lines() {
            report.warnings.push(Issue::info(
                "stale_configuration",
                format!("mapping for an unregistered project: {}", line.trim()),
            ));
        }

        let mut referenced: HashSet<ProjectId> = HashSet::new();
        let mut graph = ReferenceGraph::new();
        let mut present: Vec<ProjectId> = Vec::new();

        for entry in solution.compilable() {
            let path = solution.absolute_path(entry);
            if !path.is_file() {
                report.orphans.push(OrphanEntry {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    path: entry.relative_path.clone(),
                    reason: OrphanReason::MissingOnDisk,
                });
                continue;
            }
            present.push(entry.id.clone());

            let mapped = entry.mapped_configs();
            for config in solution.solution_configs() {
                if !mapped.contains(&config.as_str()) {
                    report.missing_mappings.push(MissingMapping {
                        project: entry.name.clone(),
                        solution_config: config.clone(),
                    });
                }
            }

            let model = match ProjectModel::load(&path) {
                Ok(model) => model,
                Err(err) => {
                    warn!(project = %entry.name, error = %err, "skipping unreadable project");
                    report
                        .warnings
                        .push(Issue::warning("unreadable_project", err.to_string()));
                    continue;
                }
            };

            for reference in model.project_references() {
                match resolve(solution, &model, &reference) {
                    Ok(target) => {
                        graph.add_edge(&path, &solution.absolute_path(target));
                        referenced.insert(target.id.clone());
                    }
                    Err((reason, target_id)) => {
                        if let Some(id) = &target_id {
                            referenced.insert(id.clone());
                        }
                        debug!(project = %entry.name, reference = %reference.name, ?reason, "dangling reference");
                        report.dangling.push(DanglingReference {
                            project: entry.name.clone(),
                            project_path: path.clone(),
                            reference: reference.name.clone(),
                            include: reference.include.clone(),
                            target_id,
                            reason,
                        });
                    }
                }
            }
        }

        for entry in solution.compilable() {
            if present.contains(&entry.id) && !referenced.contains(&entry.id) {
                report.orphans.push(OrphanEntry {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    path: entry.relative_path.clone(),
                    reason: OrphanReason::Unreferenced,
                });
            }
        }

        report.cycles = graph
            .cycles()
            .into_iter()
            .map(|cycle| {
                cycle
                    .iter()
                    .map(|p| solution.relative_manifest_path(p))
                    .collect()
            })
            .collect();
        for cycle in &report.cycles {
            report.warnings.push(Issue::error(
                "reference_cycle",
                format!("project references form a cycle: {}", cycle.join(" -> ")),
            ));
        }
        report
    }

    /// Remove exactly the dangling references a fresh scan finds. Entries are
    /// never removed.
    pub fn cleanup_references(&self, solution: &Solution) -> CleanupReport {
        let scan = self.scan_references(solution);
        let mut report = CleanupReport {
            solution: scan.solution.clone(),
            warnings: scan.warnings.clone(),
            ..CleanupReport::default()
        };

        let mut by_project: Vec<(PathBuf, Vec<DanglingReference>)> = Vec::new();
        for dangling in scan.dangling {
            match by_project
                .iter_mut()
                .find(|(path, _)| *path == dangling.project_path)
            {
                Some((_, list)) => list.push(dangling),
                None => by_project.push((dangling.project_path.clone(), vec![dangling])),
            }
        }

        for (path, dangling) in by_project {
            let mut model = match ProjectModel::load(&path) {
                Ok(model) => model,
                Err(err) => {
                    report
                        .failed
                        .push(Issue::error("project_error", err.to_string()));
                    continue;
                }
            };
            let mut removed = Vec::new();
            for item in dangling {
                let Some(reference) = model
                    .project_references()
                    .into_iter()
                    .find(|r| r.name == item.reference && r.include == item.include)
                else {
                    continue;
                };
                match model.remove_reference(&reference) {
                    Ok(_) => removed.push(item),
                    Err(err) => report
                        .failed
                        .push(Issue::error("project_error", err.to_string())),
                }
            }
            if removed.is_empty() {
                continue;
            }
            match model.save() {
                Ok(()) => {
                    info!(project = %path.display(), removed = removed.len(), "removed dangling references");
                    report.removed.extend(removed);
                }
                Err(err) => report
                    .failed
                    .push(Issue::error("write_failed", err.to_string())),
            }
        }
        report
    }
}

/// Resolve by id, else by path. On failure returns the reason and the id the
/// reference names, if any.
fn resolve<'s>(
    solution: &'s Solution,
    owner: &ProjectModel,
    reference: &Reference,
) -> Result<&'s crate::solution::ProjectEntry, (DanglingReason, Option<ProjectId>)> {
    let entry = reference
        .project_id
        .as_ref()
        .and_then(|id| solution.find(id))
        .or_else(|| solution.find_by_path(&paths::resolve(owner.folder(), &reference.include)));
    match entry {
        None => Err((DanglingReason::UnknownProject, reference.project_id.clone())),
        Some(entry) if !solution.absolute_path(entry).is_file() => {
            Err((DanglingReason::TargetMissingOnDisk, Some(entry.id.clone())))
        }
        Some(entry) => Ok(entry),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::{DanglingReason, OrphanReason};
    use crate::config::Config;
    use crate::consistency::ConsistencyScanner;
    use crate::engine::Engine;
    use crate::project::{ProjectModel, ReferenceKind};
    use crate::scanner::FolderScanner;
    use crate::solution::Solution;
    use crate::test_support::Sandbox;

    const GHOST: &str = "    <ProjectReference Include=\"..\\Ghost\\Ghost.csproj\">\n      <Project>{C0C1C2C3-9999-4C4C-9D9D-000000000009}</Project>\n      <Name>Ghost</Name>\n    </ProjectReference>\n";

    fn add_ghost_reference(sandbox: &Sandbox) {
        let app = sandbox.app_project();
        let text = fs::read_to_string(&app).expect("read app");
        let anchor = "    <Reference Include=\"System\" />\n";
        assert!(text.contains(anchor));
        fs::write(&app, text.replace(anchor, &format!("{anchor}{GHOST}"))).expect("write app");
    }

    #[test]
    fn clean_fixture_reports_only_unreferenced_entry() {
        let sandbox = Sandbox::new();
        let config = Config::default();
        let solution = Solution::load(&sandbox.solution).expect("load");
        let report = ConsistencyScanner::new(&config).scan_references(&solution);

        assert!(report.is_clean());
        assert!(report.dangling.is_empty());
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].name, "App");
        assert_eq!(report.orphans[0].reason, OrphanReason::Unreferenced);
    }

    #[test]
    fn dangling_reference_is_reported_then_removed_alone() {
        let sandbox = Sandbox::new();
        add_ghost_reference(&sandbox);
        let config = Config::default();
        let scanner = ConsistencyScanner::new(&config);
        let solution = Solution::load(&sandbox.solution).expect("load");

        let report = scanner.scan_references(&solution);
        assert_eq!(report.dangling.len(), 1);
        assert_eq!(report.dangling[0].reference, "Ghost");
        assert_eq!(report.dangling[0].reason, DanglingReason::UnknownProject);
        assert!(!report.is_clean());

        let before = ProjectModel::load(&sandbox.app_project())
            .expect("load app")
            .references();
        let cleanup = scanner.cleanup_references(&solution);
        assert!(!cleanup.has_failures());
        assert_eq!(cleanup.removed.len(), 1);

        let after = ProjectModel::load(&sandbox.app_project())
            .expect("reload app")
            .references();
        let expected = before
            .into_iter()
            .filter(|r| r.kind != ReferenceKind::Project)
            .map(|r| (r.kind, r.name, r.include, r.hint_path))
            .collect::<Vec<_>>();
        let actual = after
            .into_iter()
            .map(|r| (r.kind, r.name, r.include, r.hint_path))
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
        assert!(scanner.scan_references(&solution).dangling.is_empty());
    }

    #[test]
    fn missing_project_file_is_an_orphan_and_mappings_are_checked() {
        let sandbox = Sandbox::new();
        let text = fs::read_to_string(&sandbox.solution).expect("read sln");
        let trimmed = text
            .lines()
            .filter(|line| !line.contains("000000000001}.Release|Any CPU"))
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&sandbox.solution, format!("{trimmed}\n")).expect("write sln");

        let config = Config::default();
        let solution = Solution::load(&sandbox.solution).expect("load");
        let report = ConsistencyScanner::new(&config).scan_references(&solution);
        assert_eq!(report.missing_mappings.len(), 1);
        assert_eq!(report.missing_mappings[0].solution_config, "Release|Any CPU");

        fs::remove_file(sandbox.app_project()).expect("remove app");
        let report = ConsistencyScanner::new(&config).scan_references(&solution);
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].reason, OrphanReason::MissingOnDisk);
        assert!(!report.is_clean());
    }

    #[test]
    fn stale_mapping_is_reported_but_not_a_failure() {
        let sandbox = Sandbox::new();
        let text = fs::read_to_string(&sandbox.solution).expect("read sln");
        let stale =
            "\t\t{C0C0C0C0-0000-0000-0000-000000000099}.Debug|Any CPU.ActiveCfg = Debug|Any CPU";
        let anchor = "\tEndGlobalSection\n\tGlobalSection(SolutionProperties)";
        assert!(text.contains(anchor));
        fs::write(&sandbox.solution, text.replace(anchor, &format!("{stale}\n{anchor}")))
            .expect("write sln");

        let config = Config::default();
        let solution = Solution::load(&sandbox.solution).expect("load");
        let report = ConsistencyScanner::new(&config).scan_references(&solution);
        assert!(report.is_clean());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, "stale_configuration");
        assert!(report.warnings[0].message.contains("000000000099"));
    }

    #[test]
    fn cleanup_keeps_valid_reference_sharing_the_dangling_name() {
        let sandbox = Sandbox::new();
        let config = Config::default();
        let scan = FolderScanner::new(&sandbox.mixin, &config.scan)
            .scan()
            .expect("scan");
        let solution = Solution::load(&sandbox.solution).expect("load");
        let report = Engine::new(config.clone())
            .to_project(solution, &scan)
            .expect("to-project");
        assert_eq!(report.converted.len(), 1);

        let app = sandbox.app_project();
        let text = fs::read_to_string(&app).expect("read app");
        let anchor = "      <Name>Foo</Name>\n    </ProjectReference>\n";
        assert!(text.contains(anchor));
        let ghost = "    <ProjectReference Include=\"..\\Ghost\\Foo.csproj\" />\n";
        fs::write(&app, text.replace(anchor, &format!("{anchor}{ghost}"))).expect("write app");

        let scanner = ConsistencyScanner::new(&config);
        let solution = Solution::load(&sandbox.solution).expect("reload");
        let dangling = scanner.scan_references(&solution).dangling;
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].include, r"..\Ghost\Foo.csproj");

        let cleanup = scanner.cleanup_references(&solution);
        assert!(!cleanup.has_failures());
        assert_eq!(cleanup.removed.len(), 1);

        let left = ProjectModel::load(&app).expect("reload app").project_references();
        let includes = left.iter().map(|r| r.include.as_str()).collect::<Vec<_>>();
        assert_eq!(includes, [r"..\..\..\mixin\Foo\Foo.csproj"]);
        assert!(scanner.scan_references(&solution).dangling.is_empty());
    }
}
