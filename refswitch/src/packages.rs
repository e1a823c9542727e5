//! `packages.config` model.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use xml_doc_core::{parse, write, LineEnding, ParseError, WriteError, XmlDocument, XmlNode};

use crate::storage::{self, StorageError};

/// File name of the per-project package manifest.
pub const PACKAGES_CONFIG: &str = "packages.config";

/// One `<package>` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    /// Attributes other than `id`, `version` and `targetFramework`.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

impl PackageEntry {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        target_framework: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            target_framework,
            extra: IndexMap::new(),
        }
    }

    fn from_node(node: &XmlNode) -> Option<Self> {
        let mut entry = Self::new(
            node.attribute("id")?,
            node.attribute("version").unwrap_or_default(),
            node.attribute("targetFramework").map(str::to_string),
        );
        entry.extra = node
            .attributes
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "id" | "version" | "targetFramework"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(entry)
    }

    fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new("package")
            .with_attribute("id", &self.name)
            .with_attribute("version", &self.version);
        if let Some(tfm) = &self.target_framework {
            node = node.with_attribute("targetFramework", tfm);
        }
        for (key, value) in &self.extra {
            node = node.with_attribute(key, value);
        }
        node
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
    #[error("failed to serialize {path}: {source}")]
    Write { path: PathBuf, source: WriteError },
    #[error("{path}: package '{name}' is already listed")]
    DuplicatePackage { path: PathBuf, name: String },
}

/// A project's package manifest, possibly not yet on disk.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    doc: XmlDocument,
    exists: bool,
    dirty: bool,
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let bytes = storage::read(path)?;
        let doc = parse(&bytes).map_err(|source| PackageError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded package manifest");
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            exists: true,
            dirty: false,
        })
    }

    /// Load the manifest, or start an empty one in memory when the file does
    /// not exist.
    pub fn load_or_empty(path: &Path) -> Result<Self, PackageError> {
        if path.is_file() {
            return Self::load(path);
        }
        // NuGet writes CRLF without a trailing newline.
        let mut doc = XmlDocument::new(XmlNode::new("packages"));
        doc.line_ending = LineEnding::CrLf;
        doc.final_newline = false;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            exists: false,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the manifest was read from disk.
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn packages(&self) -> Vec<PackageEntry> {
        self.doc
            .root
            .get_children("package")
            .into_iter()
            .filter_map(PackageEntry::from_node)
            .collect()
    }

    /// Package by id, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<PackageEntry> {
        self.packages()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Remove a package. Absent names are a no-op returning `None`.
    pub fn remove_package(&mut self, name: &str) -> Option<PackageEntry> {
        let idx = self.doc.root.children.iter().position(|node| {
            node.tag == "package"
                && node
                    .attribute("id")
                    .is_some_and(|id| id.eq_ignore_ascii_case(name))
        })?;
        let node = self.doc.root.children.remove(idx);
        self.dirty = true;
        debug!(path = %self.path.display(), package = name, "removed package");
        PackageEntry::from_node(&node)
    }

    pub fn add_package(&mut self, entry: &PackageEntry) -> Result<(), PackageError> {
        if self.find(&entry.name).is_some() {
            return Err(PackageError::DuplicatePackage {
                path: self.path.clone(),
                name: entry.name.clone(),
            });
        }
        // NuGet keeps the list sorted by id.
        let name = entry.name.to_ascii_lowercase();
        let at = self
            .doc
            .root
            .children
            .iter()
            .position(|node| {
                node.tag == "package"
                    && node
                        .attribute("id")
                        .is_some_and(|id| id.to_ascii_lowercase() > name)
            })
            .unwrap_or(self.doc.root.children.len());
        self.doc.root.children.insert(at, entry.to_node());
        self.dirty = true;
        debug!(path = %self.path.display(), package = %entry.name, version = %entry.version, "added package");
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        write(&self.doc).map_err(|source| PackageError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically write the manifest, creating it if needed.
    pub fn save(&mut self) -> Result<(), PackageError> {
        let bytes = self.to_bytes()?;
        storage::write_atomic(&self.path, &bytes)?;
        self.exists = true;
        self.dirty = false;
        Ok(())
    }
}
