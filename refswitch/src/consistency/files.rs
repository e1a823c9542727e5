use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::ConsistencyScanner;
use crate::config::{Config, CONFIG_FILE_NAME};
use crate::issues::Issue;
use crate::paths;
use crate::project::{IncludedFiles, ProjectModel};
use crate::solution::Solution;
use crate::storage;

/// A file under a project folder that no item declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanFile {
    pub project: String,
    pub path: PathBuf,
    /// Path relative to the project folder, manifest style.
    pub relative: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProject {
    pub project: String,
    pub reason: String,
}

/// Result of a file scan. Only [`ConsistencyScanner::scan_files`] builds one,
/// so [`ConsistencyScanner::clean_files`] never deletes unexamined paths.
#[derive(Debug, Serialize)]
pub struct FileScanReport {
    pub solution: PathBuf,
    pub files: Vec<OrphanFile>,
    pub skipped: Vec<SkippedProject>,
    pub warnings: Vec<Issue>,
    #[serde(skip)]
    _scanned: (),
}

#[derive(Debug, Default, Serialize)]
pub struct CleanFilesReport {
    pub solution: PathBuf,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<Issue>,
}

impl CleanFilesReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

struct LoadedFolder {
    name: String,
    path: PathBuf,
    folder: PathBuf,
    included: IncludedFiles,
    default_items: bool,
}

impl ConsistencyScanner<'_> {
    /// Files on disk under each project folder that its project does not
    /// declare. Subfolders holding their own project file belong to that
    /// project and are not descended into.
    pub fn scan_files(&self, solution: &Solution) -> FileScanReport {
        let mut report = FileScanReport {
            solution: solution.path().to_path_buf(),
            files: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            _scanned: (),
        };

        let mut projects = Vec::new();
        for entry in solution.compilable() {
            let path = solution.absolute_path(entry);
            if !path.is_file() {
                report.skipped.push(SkippedProject {
                    project: entry.name.clone(),
                    reason: "project file missing".to_string(),
                });
                continue;
            }
            match ProjectModel::load(&path) {
                Ok(model) => projects.push(LoadedFolder {
                    name: entry.name.clone(),
                    folder: model.folder().to_path_buf(),
                    included: model.included_files(),
                    default_items: model.uses_default_items(),
                    path,
                }),
                Err(err) => {
                    warn!(project = %entry.name, error = %err, "skipping unreadable project");
                    report
                        .warnings
                        .push(Issue::warning("unreadable_project", err.to_string()));
                }
            }
        }

        for project in &projects {
            if project.default_items {
                debug!(project = %project.name, "default items; skipping file scan");
                report.skipped.push(SkippedProject {
                    project: project.name.clone(),
                    reason: "SDK-style project includes files implicitly".to_string(),
                });
                continue;
            }
            let siblings = projects
                .iter()
                .filter(|other| paths::same_path(&other.folder, &project.folder))
                .collect::<Vec<_>>();

            let walker = WalkDir::new(&project.folder)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !self.skips_dir(e));
            for item in walker {
                let item = match item {
                    Ok(item) => item,
                    Err(err) => {
                        report
                            .warnings
                            .push(Issue::warning("unreadable_path", err.to_string()));
                        continue;
                    }
                };
                if !item.file_type().is_file() || self.skips_file(item.path(), &project.path) {
                    continue;
                }
                if siblings.iter().any(|p| p.included.contains(item.path())) {
                    continue;
                }
                let relative = paths::relative_to(&project.folder, item.path());
                report.files.push(OrphanFile {
                    project: project.name.clone(),
                    path: item.path().to_path_buf(),
                    relative: paths::to_manifest(&relative),
                });
            }
        }
        debug!(files = report.files.len(), "file scan finished");
        report
    }

    /// Delete exactly the files of `report`.
    pub fn clean_files(&self, report: &FileScanReport) -> CleanFilesReport {
        let mut out = CleanFilesReport {
            solution: report.solution.clone(),
            ..CleanFilesReport::default()
        };
        for file in &report.files {
            match storage::delete(&file.path) {
                Ok(()) => {
                    info!(path = %file.path.display(), "deleted undeclared file");
                    out.deleted.push(file.path.clone());
                }
                Err(err) => out
                    .failed
                    .push(Issue::error("delete_failed", err.to_string())),
            }
        }
        out
    }

    fn skips_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.config
            .files
            .exclude_dirs
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&name))
            || holds_project(self.config, entry.path())
    }

    fn skips_file(&self, path: &Path, project_file: &Path) -> bool {
        if paths::same_path(path, project_file) {
            return true;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let excluded_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                ext.eq_ignore_ascii_case("sln")
                    || self
                        .config
                        .files
                        .exclude_extensions
                        .iter()
                        .any(|x| x.eq_ignore_ascii_case(ext))
            });
        excluded_ext
            || name == CONFIG_FILE_NAME
            || name.ends_with(".refswitch.toml")
            || name.ends_with(storage::TEMP_SUFFIX)
    }
}

fn holds_project(config: &Config, dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.path().is_file() && config.is_project_file(&e.path()))
        })
        .unwrap_or(false)
}
