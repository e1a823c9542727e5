//! Solution manifest (`.sln`) model.
//!
//! A solution registers projects with `Project(...)`/`EndProject` blocks and
//! records per-configuration build mappings and folder nesting in `Global`
//! sections. This module models exactly those three parts:
//!
//! - project registration blocks become [`ProjectEntry`] values
//! - `GlobalSection(ProjectConfigurationPlatforms)` becomes each entry's
//!   [`ConfigMapping`] list
//! - `GlobalSection(NestedProjects)` becomes each entry's `parent_id`
//!
//! Every other line (header, `ProjectSection`s, `SolutionProperties`,
//! extensibility globals, unknown sections) is kept verbatim and written back
//! byte-for-byte. Entries are stored flat; the folder tree is built on demand
//! by [`Solution::projects_with_parents`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::paths;
use crate::storage::{self, StorageError};

mod ids;
mod parser;
mod tree;
mod writer;

pub use ids::{Guid, ProjectId, ProjectTypeId};
pub use tree::{ProjectNode, ProjectTree};

/// One `(solution config, item) → value` mapping line, e.g.
/// `Debug|Any CPU` + `Build.0` → `Debug|Any CPU`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigMapping {
    pub solution_config: String,
    pub item: String,
    pub value: String,
}

/// A project's registration record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectEntry {
    pub id: ProjectId,
    pub name: String,
    /// Path relative to the solution folder, as written in the manifest.
    pub relative_path: String,
    pub type_id: ProjectTypeId,
    pub parent_id: Option<ProjectId>,
    pub configurations: Vec<ConfigMapping>,
    /// Verbatim lines between the `Project(...)` line and `EndProject`.
    #[serde(skip)]
    body: Vec<String>,
}

impl ProjectEntry {
    /// A new entry with no configuration mapping, nesting or body.
    pub fn new(
        id: ProjectId,
        name: impl Into<String>,
        relative_path: impl Into<String>,
        type_id: ProjectTypeId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            relative_path: relative_path.into(),
            type_id,
            parent_id: None,
            configurations: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn is_compilable(&self) -> bool {
        self.type_id.is_compilable()
    }

    /// Distinct solution configurations this entry maps, in mapping order.
    pub fn mapped_configs(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for mapping in &self.configurations {
            if !out.contains(&mapping.solution_config.as_str()) {
                out.push(&mapping.solution_config);
            }
        }
        out
    }
}

/// Errors raised by solution loading and editing.
#[derive(Debug, Error)]
pub enum SolutionError {
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("project {0} is already registered in the solution")]
    DuplicateProject(ProjectId),
    #[error("project {0} is not registered in the solution")]
    UnknownProject(ProjectId),
    #[error("project {id} is still referenced by {}", holders.join(", "))]
    ReferencedEntryInUse { id: ProjectId, holders: Vec<String> },
}

/// Top-level manifest layout. Project blocks and the two regenerated global
/// sections are placeholders; everything else is raw text.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Raw(String),
    Project(ProjectId),
    Global {
        open: String,
        parts: Vec<GlobalPart>,
        close: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum GlobalPart {
    Raw(Vec<String>),
    ProjectConfigurations { header: String, footer: String },
    NestedProjects { header: String, footer: String },
}

/// Position of a line inside a regenerated section: either the first line
/// that belonged to a project, or a line kept as written.
#[derive(Debug, Clone, PartialEq)]
enum LayoutLine {
    Project(ProjectId),
    Verbatim(String),
}

const SECTION_INDENT: &str = "\t\t";

/// An in-memory solution manifest.
#[derive(Debug, Clone)]
pub struct Solution {
    path: PathBuf,
    folder: PathBuf,
    entries: Vec<ProjectEntry>,
    solution_configs: Vec<String>,
    segments: Vec<Segment>,
    config_layout: Vec<LayoutLine>,
    config_indent: String,
    nesting_layout: Vec<LayoutLine>,
    nesting_indent: String,
    bom: bool,
    crlf: bool,
    final_newline: bool,
    dirty: bool,
}

impl Solution {
    /// Load and parse a solution file. Relative project paths resolve against
    /// the file's folder.
    pub fn load(path: &Path) -> Result<Self, SolutionError> {
        let absolute = paths::absolutize(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = storage::read(&absolute)?;
        let text = String::from_utf8_lossy(&bytes);
        let solution = Self::parse(&text, &absolute)?;
        debug!(
            path = %absolute.display(),
            projects = solution.entries.len(),
            "loaded solution"
        );
        Ok(solution)
    }

    /// Parse solution text. `path` locates the file for relative resolution
    /// and error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, SolutionError> {
        parser::parse(text, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder containing the solution; base for all manifest-relative paths.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[ProjectEntry] {
        &self.entries
    }

    /// Compilable entries in registration order.
    pub fn compilable(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.entries.iter().filter(|e| e.is_compilable())
    }

    /// Declared solution configurations (`Debug|Any CPU`, ...).
    pub fn solution_configs(&self) -> &[String] {
        &self.solution_configs
    }

    pub fn find(&self, id: &ProjectId) -> Option<&ProjectEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Entry whose resolved path equals `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&ProjectEntry> {
        self.entries
            .iter()
            .find(|e| paths::same_path(&self.absolute_path(e), path))
    }

    /// Absolute path of an entry's project file.
    pub fn absolute_path(&self, entry: &ProjectEntry) -> PathBuf {
        paths::resolve(&self.folder, &entry.relative_path)
    }

    /// Path relative to the solution folder, rendered with `\` separators.
    pub fn relative_manifest_path(&self, path: &Path) -> String {
        paths::to_manifest(&paths::relative_to(&self.folder, path))
    }

    /// Kind name for a type id.
    pub fn type_name(&self, type_id: &ProjectTypeId) -> &'static str {
        type_id.name()
    }

    /// Configuration lines naming unregistered projects, kept as written.
    pub fn stale_config_lines(&self) -> impl Iterator<Item = &str> {
        self.config_layout.iter().filter_map(|line| match line {
            LayoutLine::Verbatim(text) => Some(text.as_str()),
            LayoutLine::Project(_) => None,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Register `entry` and derive its configuration mapping from
    /// `copy_config_from`: the same `(solution config, item)` keys and values.
    /// Declared solution configurations the sibling does not map get the
    /// default `ActiveCfg` and `Build.0` actions.
    pub fn add_project(
        &mut self,
        mut entry: ProjectEntry,
        copy_config_from: &ProjectId,
    ) -> Result<&ProjectEntry, SolutionError> {
        if self.find(&entry.id).is_some() {
            return Err(SolutionError::DuplicateProject(entry.id));
        }
        let sibling = self
            .find(copy_config_from)
            .ok_or_else(|| SolutionError::UnknownProject(copy_config_from.clone()))?;

        let mut configurations = sibling.configurations.clone();
        let mapped = sibling
            .mapped_configs()
            .into_iter()
            .map(str::to_string)
            .collect::<HashSet<_>>();
        for config in &self.solution_configs {
            if mapped.contains(config) {
                continue;
            }
            for item in ["ActiveCfg", "Build.0"] {
                configurations.push(ConfigMapping {
                    solution_config: config.clone(),
                    item: item.to_string(),
                    value: config.clone(),
                });
            }
        }
        entry.configurations = configurations;

        let id = entry.id.clone();
        let insert_at = self
            .segments
            .iter()
            .rposition(|s| matches!(s, Segment::Project(_)))
            .map(|idx| idx + 1)
            .or_else(|| {
                self.segments
                    .iter()
                    .position(|s| matches!(s, Segment::Global { .. }))
            })
            .unwrap_or(self.segments.len());
        self.segments.insert(insert_at, Segment::Project(id.clone()));
        self.entries.push(entry);
        self.ensure_global_parts();
        self.dirty = true;
        debug!(project = %id, "registered project");

        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// Remove an entry with its configuration mapping and nesting. `holders`
    /// lists entries that still hold a project reference to it; any holder
    /// rejects the removal.
    pub fn remove_project(
        &mut self,
        id: &ProjectId,
        holders: &[ProjectId],
    ) -> Result<ProjectEntry, SolutionError> {
        let idx = self
            .entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| SolutionError::UnknownProject(id.clone()))?;
        if !holders.is_empty() {
            return Err(SolutionError::ReferencedEntryInUse {
                id: id.clone(),
                holders: holders
                    .iter()
                    .map(|h| {
                        self.find(h)
                            .map(|e| e.name.clone())
                            .unwrap_or_else(|| h.to_string())
                    })
                    .collect(),
            });
        }

        let removed = self.entries.remove(idx);
        self.segments
            .retain(|s| !matches!(s, Segment::Project(pid) if pid == id));
        self.config_layout
            .retain(|line| !matches!(line, LayoutLine::Project(pid) if pid == id));
        self.nesting_layout
            .retain(|line| !matches!(line, LayoutLine::Project(pid) if pid == id));
        self.dirty = true;
        debug!(project = %id, "removed project");
        Ok(removed)
    }

    /// Build the parent/child tree from `parent_id`. Unknown parents and
    /// nesting cycles are reported as warnings and attached at the root.
    pub fn projects_with_parents(&self) -> ProjectTree<'_> {
        tree::build(&self.entries)
    }

    /// Full manifest text without BOM. Unchanged solutions reproduce their
    /// input exactly.
    pub fn serialize(&self) -> String {
        writer::serialize(self)
    }

    /// Serialized bytes including the BOM when the input had one.
    pub fn to_bytes(&self) -> Vec<u8> {
        let text = self.serialize();
        let mut bytes = Vec::with_capacity(text.len() + 3);
        if self.bom {
            bytes.extend_from_slice(b"\xEF\xBB\xBF");
        }
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    /// Atomically write the manifest back to its file.
    pub fn save(&mut self) -> Result<(), SolutionError> {
        storage::write_atomic(&self.path, &self.to_bytes())?;
        self.dirty = false;
        Ok(())
    }

    /// Make sure the global sections the entries need exist.
    fn ensure_global_parts(&mut self) {
        let needs_nesting = self.entries.iter().any(|e| e.parent_id.is_some());
        let global = self.segments.iter_mut().find_map(|s| match s {
            Segment::Global { parts, .. } => Some(parts),
            _ => None,
        });
        let Some(parts) = global else {
            let mut parts = vec![project_configurations_part()];
            if needs_nesting {
                parts.push(nested_projects_part());
            }
            self.segments.push(Segment::Global {
                open: "Global".to_string(),
                parts,
                close: "EndGlobal".to_string(),
            });
            return;
        };
        if !parts
            .iter()
            .any(|p| matches!(p, GlobalPart::ProjectConfigurations { .. }))
        {
            let after_solution_configs = parts
                .iter()
                .position(|p| match p {
                    GlobalPart::Raw(lines) => lines
                        .first()
                        .is_some_and(|l| l.contains("SolutionConfigurationPlatforms")),
                    _ => false,
                })
                .map(|idx| idx + 1)
                .unwrap_or(0);
            parts.insert(after_solution_configs, project_configurations_part());
        }
        if needs_nesting
            && !parts
                .iter()
                .any(|p| matches!(p, GlobalPart::NestedProjects { .. }))
        {
            parts.push(nested_projects_part());
        }
    }
}

fn project_configurations_part() -> GlobalPart {
    GlobalPart::ProjectConfigurations {
        header: "\tGlobalSection(ProjectConfigurationPlatforms) = postSolution".to_string(),
        footer: "\tEndGlobalSection".to_string(),
    }
}

fn nested_projects_part() -> GlobalPart {
    GlobalPart::NestedProjects {
        header: "\tGlobalSection(NestedProjects) = preSolution".to_string(),
        footer: "\tEndGlobalSection".to_string(),
    }
}
