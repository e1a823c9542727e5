use tracing::{debug, info, warn};
use xml_doc_core::{parse_fragment, XmlNode};

use super::cache::{CachedPackage, ReversalCache};
use super::workspace::Workspace;
use super::{ConversionError, ConversionItem, ConversionReport, Outcome, PlannedConversion};
use crate::packages::{PackageEntry, PACKAGES_CONFIG};
use crate::paths;
use crate::project::{Reference, ReferenceKind};
use crate::scanner::{CandidateProject, ScanOutcome};
use crate::solution::ProjectId;

/// Where a restored package's version came from.
#[derive(Debug, Clone)]
struct ResolvedPackage {
    version: String,
    target_framework: Option<String>,
    cached: Option<CachedPackage>,
}

/// A project reference whose target was found by the scan.
struct Reversible {
    owner: usize,
    reference: Reference,
    /// Solution entry of the target, when it is registered.
    target: Option<ProjectId>,
    candidate: CandidateProject,
}

pub(super) fn run(
    workspace: &mut Workspace,
    scan: &ScanOutcome,
    cache: &mut ReversalCache,
    packages_folder: &str,
    report: &mut ConversionReport,
) {
    let reversible = find_reversible(workspace, scan);
    debug!(references = reversible.len(), "to-package candidates");

    let mut touched: Vec<ProjectId> = Vec::new();
    for item in reversible {
        let owner_name = workspace.projects[item.owner].name.clone();
        let record = |detail: String| ConversionItem {
            project: owner_name.clone(),
            reference: item.reference.name.clone(),
            detail,
        };
        match revert(workspace, cache, packages_folder, &item) {
            Ok(Outcome::Converted { detail, .. }) => {
                if let Some(id) = &item.target {
                    if !touched.contains(id) {
                        touched.push(id.clone());
                    }
                }
                report.converted.push(record(detail));
            }
            Ok(Outcome::Unconverted(reason)) => report.unconverted.push(record(reason)),
            Err(err) => report.fail(&owner_name, &item.reference.name, &err),
        }
    }

    for id in touched {
        let holders = workspace.holders_of(&id);
        if !holders.is_empty() {
            debug!(project = %id, holders = holders.len(), "still referenced; keeping registration");
            continue;
        }
        match workspace.solution.remove_project(&id, &holders) {
            Ok(entry) => {
                info!(project = %entry.name, "removed project from solution");
                report.unregistered.push(entry.name);
            }
            Err(err) => report.fail("-", id.as_str(), &err.into()),
        }
    }
}

pub(super) fn plan(
    workspace: &Workspace,
    scan: &ScanOutcome,
    cache: &ReversalCache,
) -> Vec<PlannedConversion> {
    find_reversible(workspace, scan)
        .into_iter()
        .map(|item| {
            let name = &item.candidate.output_name;
            let resolved = resolve_version(workspace, item.owner, name, cache);
            PlannedConversion {
                project: workspace.projects[item.owner].name.clone(),
                reference: item.reference.name.clone(),
                version: resolved.as_ref().map(|r| r.version.clone()),
                target: name.clone(),
                blocked: resolved
                    .is_none()
                    .then(|| "no package version found".to_string()),
            }
        })
        .collect()
}

/// Project references, in registration then document order, whose target
/// the scan found: by the target's path, else by the registered name as
/// output name.
fn find_reversible(workspace: &Workspace, scan: &ScanOutcome) -> Vec<Reversible> {
    let mut out = Vec::new();
    for (owner, project) in workspace.projects.iter().enumerate() {
        for reference in project.model.project_references() {
            let target = workspace.target_entry(project, &reference);
            let target_path = workspace.target_path(project, &reference);
            let Some(candidate) = scan.find_by_path(&target_path).or_else(|| {
                target.and_then(|entry| scan.find_by_output_name(&entry.name))
            }) else {
                continue;
            };
            out.push(Reversible {
                owner,
                reference,
                target: target.map(|entry| entry.id.clone()),
                candidate: candidate.clone(),
            });
        }
    }
    out
}

/// Cached entry first, then the owner's own manifest, then any other
/// project's manifest or package reference in registration order.
fn resolve_version(
    workspace: &Workspace,
    owner: usize,
    name: &str,
    cache: &ReversalCache,
) -> Option<ResolvedPackage> {
    if let Some(cached) = cache.get(&workspace.projects[owner].id, name) {
        return Some(ResolvedPackage {
            version: cached.version.clone(),
            target_framework: cached.target_framework.clone(),
            cached: Some(cached.clone()),
        });
    }
    let own = &workspace.projects[owner];
    own.packages
        .find(name)
        .map(|p| (p.version, p.target_framework))
        .or_else(|| {
            workspace
                .projects
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != owner)
                .find_map(|(_, project)| {
                    project
                        .packages
                        .find(name)
                        .map(|p| (p.version, p.target_framework))
                        .or_else(|| {
                            project
                                .model
                                .find_reference(ReferenceKind::Package, name)
                                .and_then(|r| r.version)
                                .map(|v| (v, None))
                        })
                })
        })
        .map(|(version, target_framework)| ResolvedPackage {
            version,
            target_framework,
            cached: None,
        })
}

fn revert(
    workspace: &mut Workspace,
    cache: &mut ReversalCache,
    packages_folder: &str,
    item: &Reversible,
) -> Result<Outcome, ConversionError> {
    let name = item.candidate.output_name.clone();
    let owner = &workspace.projects[item.owner];
    if owner.model.find_reference(ReferenceKind::Assembly, &name).is_some()
        || owner.model.find_reference(ReferenceKind::Package, &name).is_some()
    {
        return Ok(Outcome::Unconverted(format!(
            "already has a package reference to {name}"
        )));
    }

    let resolved = resolve_version(workspace, item.owner, &name, cache).ok_or_else(|| {
        ConversionError::UnresolvedPackageVersion {
            owner: owner.name.clone(),
            package: name.clone(),
        }
    })?;
    let (replacement, node) =
        restored_reference(workspace, item, &name, &resolved, packages_folder);

    let owner = &mut workspace.projects[item.owner];
    let original = owner
        .model
        .reference_node(&item.reference)
        .cloned()
        .unwrap_or_else(|| item.reference.to_element());
    owner
        .model
        .replace_reference_with(&item.reference, &replacement, node)?;

    if replacement.kind == ReferenceKind::Assembly && owner.packages.find(&name).is_none() {
        let entry = PackageEntry::new(
            name.clone(),
            resolved.version.clone(),
            resolved
                .target_framework
                .clone()
                .or_else(|| owner.model.target_framework()),
        );
        if let Err(err) = owner.packages.add_package(&entry) {
            owner
                .model
                .replace_reference_with(&replacement, &item.reference, original)?;
            return Err(err.into());
        }
        if !owner.packages.exists() {
            owner.model.ensure_item("None", PACKAGES_CONFIG);
        }
    }
    let id = owner.id.clone();
    let restored_from_cache = cache.remove(&id, &name).is_some();

    info!(
        project = %owner.name,
        package = %name,
        version = %resolved.version,
        restored_from_cache,
        "converted project reference to package reference"
    );
    Ok(Outcome::Converted {
        detail: format!(
            "{} -> {} {}",
            item.reference.include, replacement.kind, resolved.version
        ),
        registered: false,
    })
}

/// The reference a project reference turns back into, with the element to
/// write: the cached original element when there is one, else a reference
/// rebuilt from the cached fields, else a `PackageReference` for SDK-style
/// owners and an assembly reference into the restore folder for the rest.
fn restored_reference(
    workspace: &Workspace,
    item: &Reversible,
    name: &str,
    resolved: &ResolvedPackage,
    packages_folder: &str,
) -> (Reference, XmlNode) {
    if let Some(cached) = &resolved.cached {
        if let Some(restored) = cached.element.as_deref().and_then(cached_element) {
            return restored;
        }
        let reference = match cached.kind {
            ReferenceKind::Package => {
                Reference::package(cached.name.clone(), Some(cached.version.clone()))
            }
            _ => Reference::assembly(
                cached.include.clone(),
                cached.hint_path.clone(),
                cached.private.clone(),
            ),
        };
        let node = reference.to_element();
        return (reference, node);
    }

    let owner = &workspace.projects[item.owner];
    let reference = if owner.model.is_sdk_style() {
        Reference::package(name, Some(resolved.version.clone()))
    } else {
        let tfm = owner
            .model
            .target_framework()
            .or_else(|| resolved.target_framework.clone())
            .or_else(|| item.candidate.target_framework.clone());
        let hint = tfm.map(|tfm| {
            let dll = workspace
                .solution
                .folder()
                .join(packages_folder)
                .join(format!("{name}.{}", resolved.version))
                .join("lib")
                .join(tfm)
                .join(format!("{name}.dll"));
            paths::to_manifest(&paths::relative_to(owner.model.folder(), &dll))
        });
        Reference::assembly(name, hint, Some("True".to_string()))
    };
    let node = reference.to_element();
    (reference, node)
}

fn cached_element(xml: &str) -> Option<(Reference, XmlNode)> {
    let node = match parse_fragment(xml) {
        Ok(node) => node,
        Err(err) => {
            warn!(error = %err, "cached element is not valid XML; rebuilding reference");
            return None;
        }
    };
    let Some(reference) = Reference::from_element(&node) else {
        warn!(tag = %node.tag, "cached element is not a reference; rebuilding reference");
        return None;
    };
    Some((reference, node))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use crate::config::Config;
    use crate::engine::{ConversionReport, Engine};
    use crate::packages::PackageManifest;
    use crate::project::{ProjectModel, ReferenceKind};
    use crate::scanner::{FolderScanner, ScanOutcome};
    use crate::solution::{Guid, Solution};
    use crate::test_support::Sandbox;

    const APP2_ID: &str = "{A0B1C2D3-1111-4A4A-9B9B-000000000003}";

    fn scan(sandbox: &Sandbox, config: &Config) -> ScanOutcome {
        FolderScanner::new(&sandbox.mixin, &config.scan)
            .scan()
            .expect("scan")
    }

    fn to_project(sandbox: &Sandbox, engine: &mut Engine) -> ConversionReport {
        let scan = scan(sandbox, &Config::default());
        let solution = Solution::load(&sandbox.solution).expect("load");
        engine.to_project(solution, &scan).expect("to-project")
    }

    fn to_package(sandbox: &Sandbox, engine: &mut Engine) -> ConversionReport {
        let scan = scan(sandbox, &Config::default());
        let solution = Solution::load(&sandbox.solution).expect("load");
        engine.to_package(solution, &scan).expect("to-package")
    }

    #[test]
    fn round_trip_restores_every_byte() {
        let sandbox = Sandbox::new();
        let original = sandbox.snapshot();

        let mut engine = Engine::new(Config::default());
        to_project(&sandbox, &mut engine);
        assert_ne!(sandbox.snapshot(), original);

        let report = to_package(&sandbox, &mut engine);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.unregistered, vec!["Foo".to_string()]);
        assert!(engine.cache().is_empty());
        assert_eq!(sandbox.snapshot(), original);
    }

    #[test]
    fn round_trip_survives_a_fresh_process() {
        let sandbox = Sandbox::new();
        let original = sandbox.snapshot();

        to_project(&sandbox, &mut Engine::new(Config::default()));
        to_package(&sandbox, &mut Engine::new(Config::default()));
        assert_eq!(sandbox.snapshot(), original);
    }

    #[test]
    fn without_cache_falls_back_to_other_manifests() {
        let sandbox = Sandbox::new();
        let mut config = Config::default();
        config.cache.persist = false;

        to_project(&sandbox, &mut Engine::new(config.clone()));
        let report = to_package(&sandbox, &mut Engine::new(config));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "unresolved_package_version");
        assert!(report.unregistered.is_empty());

        let project = ProjectModel::load(&sandbox.app_project()).expect("reload");
        assert!(project.find_reference(ReferenceKind::Project, "Foo").is_some());
    }

    #[test]
    fn uncached_reference_gets_a_restore_folder_hint_path() {
        let sandbox = Sandbox::new();
        let app = sandbox.app_project();
        let text = fs::read_to_string(&app).expect("read app");
        let foo_assembly = "    <Reference Include=\"Foo, Version=1.2.3.0, Culture=neutral, processorArchitecture=MSIL\">\n      <HintPath>..\\..\\packages\\Foo.1.2.3\\lib\\net461\\Foo.dll</HintPath>\n      <Private>True</Private>\n    </Reference>\n";
        let foo_project = "    <ProjectReference Include=\"..\\..\\..\\mixin\\Foo\\Foo.csproj\">\n      <Project>{B0B1C2D3-2222-4B4B-9C9C-000000000002}</Project>\n      <Name>Foo</Name>\n    </ProjectReference>\n";
        assert!(text.contains(foo_assembly));
        fs::write(&app, text.replace(foo_assembly, foo_project)).expect("write app");

        let report = to_package(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 1);
        assert!(report.unregistered.is_empty());

        let project = ProjectModel::load(&app).expect("reload");
        assert!(project.find_reference(ReferenceKind::Project, "Foo").is_none());
        let restored = project
            .find_reference(ReferenceKind::Assembly, "Foo")
            .expect("restored");
        assert_eq!(restored.include, "Foo");
        assert_eq!(
            restored.hint_path.as_deref(),
            Some(r"..\..\packages\Foo.1.2.3\lib\net461\Foo.dll")
        );
        assert_eq!(restored.private.as_deref(), Some("True"));
        let packages = PackageManifest::load(&sandbox.app_packages()).expect("packages");
        assert_eq!(packages.packages().len(), 2);
    }

    #[test]
    fn round_trip_keeps_metadata_outside_the_cached_fields() {
        let sandbox = Sandbox::new();
        let app = sandbox.app_project();
        let text = fs::read_to_string(&app).expect("read app");
        let hint = "      <HintPath>..\\..\\packages\\Foo.1.2.3\\lib\\net461\\Foo.dll</HintPath>\n";
        assert!(text.contains(hint));
        fs::write(
            &app,
            text.replace(hint, &format!("      <SpecificVersion>False</SpecificVersion>\n{hint}")),
        )
        .expect("write app");
        let original = sandbox.snapshot();

        to_project(&sandbox, &mut Engine::new(Config::default()));
        let cache_file = sandbox.solution.with_extension("sln.refswitch.toml");
        let cached = fs::read_to_string(&cache_file).expect("read cache");
        assert!(cached.contains("<SpecificVersion>False</SpecificVersion>"));

        let report = to_package(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(sandbox.snapshot(), original);
        assert!(!cache_file.exists());
    }

    #[test]
    fn cache_without_element_is_rebuilt_from_fields() {
        let sandbox = Sandbox::new();
        let original = sandbox.snapshot();

        to_project(&sandbox, &mut Engine::new(Config::default()));
        let cache_file = sandbox.solution.with_extension("sln.refswitch.toml");
        let cached = fs::read_to_string(&cache_file).expect("read cache");
        let trimmed = cached
            .lines()
            .filter(|line| !line.starts_with("element"))
            .map(|line| format!("{line}\n"))
            .collect::<String>();
        assert_ne!(trimmed, cached);
        fs::write(&cache_file, trimmed).expect("write cache");

        let report = to_package(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(sandbox.snapshot(), original);
    }

    #[test]
    fn two_owners_round_trip_and_unregister_once() {
        let sandbox = Sandbox::new();
        sandbox.add_app_copy("App2", APP2_ID);
        let original = sandbox.snapshot();

        let mut engine = Engine::new(Config::default());
        let forward = to_project(&sandbox, &mut engine);
        assert_eq!(forward.converted.len(), 2);

        let report = to_package(&sandbox, &mut engine);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.unregistered, vec!["Foo".to_string()]);
        assert_eq!(sandbox.snapshot(), original);
    }

    #[test]
    fn registration_stays_while_another_owner_still_holds_it() {
        let sandbox = Sandbox::new();
        let app2 = sandbox.add_app_copy("App2", APP2_ID);
        to_project(&sandbox, &mut Engine::new(Config::default()));

        let text = fs::read_to_string(&app2).expect("read app2");
        let anchor = "    <Reference Include=\"System\" />\n";
        assert!(text.contains(anchor));
        fs::write(
            &app2,
            text.replace(anchor, &format!("{anchor}    <Reference Include=\"Foo\" />\n")),
        )
        .expect("write app2");

        let report = to_package(&sandbox, &mut Engine::new(Config::default()));
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.converted.len(), 1);
        assert_eq!(report.converted[0].project, "App");
        assert_eq!(report.unconverted.len(), 1);
        assert_eq!(report.unconverted[0].project, "App2");
        assert!(report.unregistered.is_empty());

        let foo_id = Guid::parse("{B0B1C2D3-2222-4B4B-9C9C-000000000002}").expect("guid");
        let solution = Solution::load(&sandbox.solution).expect("reload");
        assert!(solution.find(&foo_id).is_some());
        let app2 = ProjectModel::load(&app2).expect("reload app2");
        assert!(app2.find_reference(ReferenceKind::Project, "Foo").is_some());
    }
}
