use tracing::{debug, info};
use xml_doc_core::write_fragment;

use super::cache::{CachedPackage, ReversalCache};
use super::matching::{find_matches, Match};
use super::workspace::Workspace;
use super::{ConversionError, ConversionItem, ConversionReport, Outcome, PlannedConversion};
use crate::paths;
use crate::project::{ProjectError, Reference, ReferenceKind};
use crate::scanner::ScanOutcome;
use crate::solution::{Guid, ProjectEntry, ProjectId, ProjectTypeId};

pub(super) fn run(
    workspace: &mut Workspace,
    scan: &ScanOutcome,
    cache: &mut ReversalCache,
    report: &mut ConversionReport,
) {
    let matches = find_matches(workspace, scan);
    debug!(matches = matches.len(), "to-project matches");
    for m in matches {
        let item = |detail: String| ConversionItem {
            project: m.owner_name.clone(),
            reference: m.reference.name.clone(),
            detail,
        };
        match convert(workspace, scan, cache, &m) {
            Ok(Outcome::Converted { detail, registered }) => {
                if registered {
                    report.registered.push(m.candidate.name.clone());
                }
                report.converted.push(item(detail));
            }
            Ok(Outcome::Unconverted(reason)) => report.unconverted.push(item(reason)),
            Err(err) => report.fail(&m.owner_name, &m.reference.name, &err),
        }
    }
}

pub(super) fn plan(workspace: &Workspace, scan: &ScanOutcome) -> Vec<PlannedConversion> {
    let graph = workspace.graph(Some(scan));
    find_matches(workspace, scan)
        .into_iter()
        .map(|m| {
            let owner_path = workspace
                .projects
                .iter()
                .find(|p| p.id == m.owner)
                .map(|p| p.model.path().to_path_buf())
                .unwrap_or_default();
            let blocked = if already_references(workspace, &m) {
                Some("already a project reference".to_string())
            } else if graph.would_cycle(&owner_path, &m.candidate.path) {
                Some("would create a reference cycle".to_string())
            } else {
                None
            };
            PlannedConversion {
                project: m.owner_name,
                reference: m.reference.name,
                version: Some(m.package.version).filter(|v| !v.is_empty()),
                target: workspace.solution.relative_manifest_path(&m.candidate.path),
                blocked,
            }
        })
        .collect()
}

fn already_references(workspace: &Workspace, m: &Match) -> bool {
    let Some(owner) = workspace.projects.iter().find(|p| p.id == m.owner) else {
        return false;
    };
    owner
        .model
        .project_references()
        .iter()
        .any(|r| paths::same_path(&workspace.target_path(owner, r), &m.candidate.path))
}

fn convert(
    workspace: &mut Workspace,
    scan: &ScanOutcome,
    cache: &mut ReversalCache,
    m: &Match,
) -> Result<Outcome, ConversionError> {
    let Some(idx) = workspace.projects.iter().position(|p| p.id == m.owner) else {
        return Ok(Outcome::Unconverted("project is not loaded".to_string()));
    };
    if already_references(workspace, m) {
        return Ok(Outcome::Unconverted(format!(
            "already references {} as a project",
            m.candidate.name
        )));
    }

    let owner_path = workspace.projects[idx].model.path().to_path_buf();
    if workspace
        .graph(Some(scan))
        .would_cycle(&owner_path, &m.candidate.path)
    {
        return Err(ConversionError::CycleDetected {
            owner: m.owner_name.clone(),
            target: m.candidate.name.clone(),
        });
    }

    let existing = workspace
        .solution
        .find_by_path(&m.candidate.path)
        .map(|entry| entry.id.clone());
    let (target_id, new_entry) = match existing {
        Some(id) => (id, None),
        None => {
            let entry = planned_entry(workspace, m);
            (entry.id.clone(), Some(entry))
        }
    };

    let owner = &mut workspace.projects[idx];
    let original = owner
        .model
        .reference_node(&m.reference)
        .cloned()
        .unwrap_or_else(|| m.reference.to_element());
    let element = write_fragment(&original).map_err(|source| ProjectError::Write {
        path: owner.model.path().to_path_buf(),
        source,
    })?;
    let include = paths::to_manifest(&paths::relative_to(owner.model.folder(), &m.candidate.path));
    let replacement = Reference::project(&m.candidate.name, include, target_id);
    owner.model.replace_reference(&m.reference, &replacement)?;

    let registered = new_entry.is_some();
    if let Some(entry) = new_entry {
        if let Err(err) = workspace.solution.add_project(entry, &m.owner) {
            workspace.projects[idx]
                .model
                .replace_reference_with(&replacement, &m.reference, original)?;
            return Err(err.into());
        }
    }

    let owner = &mut workspace.projects[idx];
    let removed = match m.reference.kind {
        ReferenceKind::Assembly => owner.packages.remove_package(&m.package.name),
        _ => None,
    };
    let package = removed.unwrap_or_else(|| m.package.clone());
    cache.insert(CachedPackage {
        owner: owner.id.to_string(),
        name: package.name.clone(),
        kind: m.reference.kind,
        version: package.version.clone(),
        target_framework: package.target_framework.clone(),
        include: m.reference.include.clone(),
        hint_path: m.reference.hint_path.clone(),
        private: m.reference.private.clone(),
        element: Some(element),
    });

    info!(
        project = %m.owner_name,
        package = %package.name,
        target = %m.candidate.path.display(),
        registered,
        "converted package reference to project reference"
    );
    let mut detail = format!(
        "{} {} -> {}",
        m.reference.kind,
        package.version,
        workspace.solution.relative_manifest_path(&m.candidate.path)
    );
    if registered {
        detail.push_str(" (registered)");
    }
    Ok(Outcome::Converted { detail, registered })
}

/// Solution entry for a candidate that is not registered yet. The project's
/// own `ProjectGuid` is kept unless another entry already uses it.
fn planned_entry(workspace: &Workspace, m: &Match) -> ProjectEntry {
    let id: ProjectId = m
        .candidate
        .project_id
        .clone()
        .filter(|id| workspace.solution.find(id).is_none())
        .unwrap_or_else(Guid::new_random);
    ProjectEntry::new(
        id,
        m.candidate.name.clone(),
        workspace.solution.relative_manifest_path(&m.candidate.path),
        ProjectTypeId::for_project_file(m.candidate.extension(), m.candidate.sdk_style),
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use crate::config::Config;
    use crate::engine::Engine;
    use crate::packages::PackageManifest;
    use crate::project::{ProjectModel, ReferenceKind};
    use crate::scanner::FolderScanner;
    use crate::solution::{Guid, Solution};
    use crate::storage::TEMP_SUFFIX;
    use crate::test_support::Sandbox;

    const APP2_ID: &str = "{A0B1C2D3-1111-4A4A-9B9B-000000000003}";

    fn foo_id() -> Guid {
        Guid::parse("{B0B1C2D3-2222-4B4B-9C9C-000000000002}").expect("guid")
    }

    fn run(sandbox: &Sandbox, engine: &mut Engine) -> crate::engine::ConversionReport {
        let config = Config::default();
        let scan = FolderScanner::new(&sandbox.mixin, &config.scan)
            .scan()
            .expect("scan");
        let solution = Solution::load(&sandbox.solution).expect("load solution");
        engine.to_project(solution, &scan).expect("to-project")
    }

    #[test]
    fn swaps_matched_package_for_project_reference() {
        let sandbox = Sandbox::new();
        let mut engine = Engine::new(Config::default());
        let report = run(&sandbox, &mut engine);

        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.converted[0].reference, "Foo");
        assert_eq!(report.registered, vec!["Foo".to_string()]);
        assert!(report.solution_written);

        let project = ProjectModel::load(&sandbox.app_project()).expect("reload project");
        assert!(project.find_reference(ReferenceKind::Assembly, "Foo").is_none());
        let foo = project
            .find_reference(ReferenceKind::Project, "Foo")
            .expect("project reference");
        assert_eq!(foo.include, r"..\..\..\mixin\Foo\Foo.csproj");
        assert_eq!(foo.project_id, Some(foo_id()));
        assert!(project
            .find_reference(ReferenceKind::Assembly, "Newtonsoft.Json")
            .is_some());

        let packages = PackageManifest::load(&sandbox.app_packages()).expect("reload packages");
        assert!(packages.find("Foo").is_none());
        assert!(packages.find("Newtonsoft.Json").is_some());

        let solution = Solution::load(&sandbox.solution).expect("reload solution");
        let entry = solution.find(&foo_id()).expect("registered");
        assert_eq!(entry.relative_path, r"..\mixin\Foo\Foo.csproj");
        assert_eq!(entry.mapped_configs(), vec!["Debug|Any CPU", "Release|Any CPU"]);

        let cache = engine.cache();
        assert_eq!(cache.len(), 1);
        assert!(sandbox.solution.with_extension("sln.refswitch.toml").is_file());
    }

    #[test]
    fn second_run_changes_nothing() {
        let sandbox = Sandbox::new();
        run(&sandbox, &mut Engine::new(Config::default()));
        let before = sandbox.snapshot();

        let report = run(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.converted.is_empty());
        assert!(report.failed.is_empty());
        assert!(!report.solution_written);
        assert_eq!(sandbox.snapshot(), before);
    }

    #[test]
    fn cycle_is_reported_and_nothing_is_written() {
        let sandbox = Sandbox::new();
        let foo = sandbox.mixin.join("Foo").join("Foo.csproj");
        let text = fs::read_to_string(&foo).expect("read foo");
        let with_back_edge = text.replace(
            "  <ItemGroup>\n    <Compile Include=\"Greeter.cs\" />",
            "  <ItemGroup>\n    <ProjectReference Include=\"..\\..\\legacy-solution\\src\\App\\App.csproj\" />\n  </ItemGroup>\n  <ItemGroup>\n    <Compile Include=\"Greeter.cs\" />",
        );
        assert_ne!(text, with_back_edge);
        fs::write(&foo, with_back_edge).expect("write foo");
        let before = sandbox.snapshot();

        let report = run(&sandbox, &mut Engine::new(Config::default()));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "cycle_detected");
        assert!(report.converted.is_empty());
        assert_eq!(sandbox.snapshot(), before);
    }

    #[test]
    fn registration_keeps_candidate_guid_unless_taken() {
        let sandbox = Sandbox::new();
        let foo = sandbox.mixin.join("Foo").join("Foo.csproj");
        let text = fs::read_to_string(&foo).expect("read foo");
        // The solution folder already uses this id.
        let clashing = text.replace(
            "{B0B1C2D3-2222-4B4B-9C9C-000000000002}",
            "{A0B1C2D3-1111-4A4A-9B9B-0000000000F0}",
        );
        fs::write(&foo, clashing).expect("write foo");

        let report = run(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.failed.is_empty(), "{:?}", report.failed);

        let solution = Solution::load(&sandbox.solution).expect("reload");
        let entry = solution
            .find_by_path(&foo)
            .expect("registered by path");
        assert_ne!(entry.id.as_str(), "{A0B1C2D3-1111-4A4A-9B9B-0000000000F0}");
    }

    #[test]
    fn second_owner_reuses_the_entry_the_first_registered() {
        let sandbox = Sandbox::new();
        let app2 = sandbox.add_app_copy("App2", APP2_ID);
        let mut engine = Engine::new(Config::default());
        let report = run(&sandbox, &mut engine);

        assert!(report.failed.is_empty(), "{:?}", report.failed);
        let owners = report
            .converted
            .iter()
            .map(|item| item.project.as_str())
            .collect::<Vec<_>>();
        assert_eq!(owners, ["App", "App2"]);
        assert_eq!(report.registered, vec!["Foo".to_string()]);
        assert!(report.converted[0].detail.ends_with("(registered)"));
        assert!(!report.converted[1].detail.ends_with("(registered)"));

        let solution = Solution::load(&sandbox.solution).expect("reload solution");
        let foo_entries = solution
            .entries()
            .iter()
            .filter(|entry| entry.name == "Foo")
            .count();
        assert_eq!(foo_entries, 1);
        for path in [sandbox.app_project(), app2] {
            let project = ProjectModel::load(&path).expect("reload project");
            let foo = project
                .find_reference(ReferenceKind::Project, "Foo")
                .expect("project reference");
            assert_eq!(foo.project_id, Some(foo_id()));
        }
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn unwritten_project_keeps_cache_of_the_written_one() {
        let sandbox = Sandbox::new();
        let app2 = sandbox.add_app_copy("App2", APP2_ID);
        let original = sandbox.snapshot();
        let app2_before = fs::read(&app2).expect("read app2");
        let app2_packages = app2.with_file_name("packages.config");
        let app2_packages_before = fs::read(&app2_packages).expect("read app2 packages");
        let blocker = app2.with_file_name(format!("App2.csproj{TEMP_SUFFIX}"));
        fs::create_dir(&blocker).expect("block app2 write");

        let report = run(&sandbox, &mut Engine::new(Config::default()));
        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.converted[0].project, "App");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].project, "App2");
        assert_eq!(report.failed[0].reference, "Foo");
        assert!(report.registered.is_empty());
        assert!(!report.solution_written);
        assert!(report
            .warnings
            .iter()
            .any(|issue| issue.code == "solution_not_written"));

        assert_eq!(fs::read(&app2).expect("reread app2"), app2_before);
        assert_eq!(
            fs::read(&app2_packages).expect("reread app2 packages"),
            app2_packages_before
        );
        let cache_file = sandbox.solution.with_extension("sln.refswitch.toml");
        let cached = fs::read_to_string(&cache_file).expect("cache written");
        assert!(cached.contains("000000000001"));
        assert!(!cached.contains("000000000003"));

        fs::remove_dir(&blocker).expect("unblock");
        let scan = FolderScanner::new(&sandbox.mixin, &Config::default().scan)
            .scan()
            .expect("scan");
        let solution = Solution::load(&sandbox.solution).expect("load");
        let report = Engine::new(Config::default())
            .to_package(solution, &scan)
            .expect("to-package");
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 1);
        assert_eq!(sandbox.snapshot(), original);
    }
}
