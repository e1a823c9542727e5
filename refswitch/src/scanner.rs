//! Discovery of candidate projects under a folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::issues::Issue;
use crate::paths;
use crate::project::{ProjectModel, Reference};
use crate::solution::ProjectId;

/// A project found on disk that could replace a package reference.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateProject {
    /// File stem of the project file.
    pub name: String,
    pub path: PathBuf,
    /// Declared assembly name; the matching key.
    pub output_name: String,
    pub project_id: Option<ProjectId>,
    pub sdk_style: bool,
    pub target_framework: Option<String>,
    /// Project references the candidate itself declares.
    #[serde(skip)]
    pub project_references: Vec<Reference>,
}

impl CandidateProject {
    fn from_model(model: &ProjectModel) -> Self {
        let path = model.path().to_path_buf();
        Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output_name: model.output_name(),
            project_id: model.project_guid(),
            sdk_style: model.is_sdk_style(),
            target_framework: model.target_framework(),
            project_references: model.project_references(),
            path,
        }
    }

    /// Extension of the project file, e.g. `csproj`.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("csproj")
    }

    /// Absolute paths of the projects this candidate references.
    pub fn referenced_paths(&self) -> Vec<PathBuf> {
        let folder = self.path.parent().unwrap_or(Path::new(""));
        self.project_references
            .iter()
            .map(|r| paths::resolve(folder, &r.include))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Result of one scan: unique candidates plus recoverable problems.
#[derive(Debug, Default, Serialize)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub candidates: Vec<CandidateProject>,
    pub warnings: Vec<Issue>,
}

impl ScanOutcome {
    pub fn find_by_output_name(&self, name: &str) -> Option<&CandidateProject> {
        self.candidates
            .iter()
            .find(|c| c.output_name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&CandidateProject> {
        self.candidates
            .iter()
            .find(|c| paths::same_path(&c.path, path))
    }
}

pub struct FolderScanner<'a> {
    root: PathBuf,
    config: &'a ScanConfig,
}

impl<'a> FolderScanner<'a> {
    pub fn new(root: &Path, config: &'a ScanConfig) -> Self {
        Self {
            root: paths::absolutize(root).unwrap_or_else(|_| paths::normalize(root)),
            config,
        }
    }

    /// Walk the root in sorted order. The first project with a given output
    /// name wins; later ones are reported as ambiguous and skipped.
    pub fn scan(&self) -> Result<ScanOutcome, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut outcome = ScanOutcome {
            root: self.root.clone(),
            ..ScanOutcome::default()
        };
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable path during scan");
                    outcome
                        .warnings
                        .push(Issue::warning("unreadable_path", err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.config.is_project_file(entry.path()) {
                continue;
            }

            let model = match ProjectModel::load(entry.path()) {
                Ok(model) => model,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable candidate");
                    outcome
                        .warnings
                        .push(Issue::warning("unreadable_candidate", err.to_string()));
                    continue;
                }
            };
            let candidate = CandidateProject::from_model(&model);
            let key = candidate.output_name.to_ascii_lowercase();
            if let Some(first) = seen.get(&key) {
                warn!(
                    output_name = %candidate.output_name,
                    kept = %first.display(),
                    skipped = %candidate.path.display(),
                    "ambiguous candidate"
                );
                outcome.warnings.push(Issue::warning(
                    "ambiguous_candidate",
                    format!(
                        "output name '{}' is declared by {} and {}; keeping the first",
                        candidate.output_name,
                        first.display(),
                        candidate.path.display()
                    ),
                ));
                continue;
            }
            debug!(output_name = %candidate.output_name, path = %candidate.path.display(), "found candidate");
            seen.insert(key, candidate.path.clone());
            outcome.candidates.push(candidate);
        }

        Ok(outcome)
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && self
                .config
                .exclude_dirs
                .iter()
                .any(|dir| entry.file_name().to_string_lossy().eq_ignore_ascii_case(dir))
    }
}
