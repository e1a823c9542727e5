//! MSBuild project file model.
//!
//! Wraps an [`XmlDocument`] and exposes the three reference kinds a project
//! can declare (`Reference`, `ProjectReference`, `PackageReference`) plus its
//! file items. Edits are structural: a replaced reference keeps its slot in
//! the same `ItemGroup`, so conditional groups and comments survive.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use xml_doc_core::{parse, write, ParseError, WriteError, XmlDocument, XmlNode};

use crate::paths;
use crate::solution::{Guid, ProjectId};
use crate::storage::{self, StorageError};

/// Item types that declare files belonging to the project.
pub const FILE_ITEM_TYPES: &[&str] = &[
    "Compile",
    "Content",
    "None",
    "EmbeddedResource",
    "Page",
    "Resource",
    "ApplicationDefinition",
    "AdditionalFiles",
    "TypeScriptCompile",
    "EntityDeploy",
    "SplashScreen",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Assembly,
    Project,
    Package,
}

impl ReferenceKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Assembly => "Reference",
            Self::Project => "ProjectReference",
            Self::Package => "PackageReference",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Reference" => Some(Self::Assembly),
            "ProjectReference" => Some(Self::Project),
            "PackageReference" => Some(Self::Package),
            _ => None,
        }
    }
}

impl Display for ReferenceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Assembly => "assembly",
            Self::Project => "project",
            Self::Package => "package",
        };
        f.write_str(name)
    }
}

/// Where a reference sits: child indices from the root down to its
/// `ItemGroup`, the item's index within that group, and the condition that
/// guards the group, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceLocation {
    pub group_path: Vec<usize>,
    pub index: usize,
    pub condition: Option<String>,
}

/// A dependency declaration inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: String,
    /// The `Include` attribute as written.
    pub include: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip)]
    pub location: ReferenceLocation,
}

impl Reference {
    /// An assembly reference. The name is the simple name in front of any
    /// `, Version=...` qualifiers of `include`.
    pub fn assembly(include: impl Into<String>, hint_path: Option<String>, private: Option<String>) -> Self {
        let include = include.into();
        Self {
            kind: ReferenceKind::Assembly,
            name: assembly_name(&include),
            include,
            hint_path,
            private,
            project_id: None,
            version: None,
            location: ReferenceLocation::default(),
        }
    }

    /// A project-to-project reference; `include` is relative to the owning
    /// project's folder.
    pub fn project(name: impl Into<String>, include: impl Into<String>, id: ProjectId) -> Self {
        Self {
            kind: ReferenceKind::Project,
            name: name.into(),
            include: include.into(),
            hint_path: None,
            private: None,
            project_id: Some(id),
            version: None,
            location: ReferenceLocation::default(),
        }
    }

    pub fn package(name: impl Into<String>, version: Option<String>) -> Self {
        let name = name.into();
        Self {
            kind: ReferenceKind::Package,
            include: name.clone(),
            name,
            hint_path: None,
            private: None,
            project_id: None,
            version,
            location: ReferenceLocation::default(),
        }
    }

    /// Read a reference element that is not part of a document.
    pub fn from_element(node: &XmlNode) -> Option<Self> {
        Self::from_node(node, ReferenceLocation::default())
    }

    /// Same `(kind, name)` identity, ignoring ASCII case.
    pub fn same_identity(&self, kind: ReferenceKind, name: &str) -> bool {
        self.kind == kind && self.name.eq_ignore_ascii_case(name)
    }

    fn from_node(node: &XmlNode, location: ReferenceLocation) -> Option<Self> {
        let kind = ReferenceKind::from_tag(&node.tag)?;
        let include = node.attribute("Include")?.trim().to_string();
        let child_text = |tag: &str| {
            node.get_text(&[tag])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };

        let mut reference = match kind {
            ReferenceKind::Assembly => {
                Self::assembly(include, child_text("HintPath"), child_text("Private"))
            }
            ReferenceKind::Project => {
                let name = child_text("Name").unwrap_or_else(|| file_stem(&include));
                Self {
                    kind,
                    name,
                    include,
                    hint_path: None,
                    private: None,
                    project_id: child_text("Project").and_then(|id| Guid::parse(&id)),
                    version: None,
                    location: ReferenceLocation::default(),
                }
            }
            ReferenceKind::Package => Self::package(
                include,
                node.attribute("Version")
                    .map(str::to_string)
                    .or_else(|| child_text("Version")),
            ),
        };
        reference.location = location;
        Some(reference)
    }

    /// The element this reference is written as.
    pub fn to_element(&self) -> XmlNode {
        let mut node = XmlNode::new(self.kind.tag()).with_attribute("Include", &self.include);
        match self.kind {
            ReferenceKind::Assembly => {
                if let Some(hint) = &self.hint_path {
                    node = node.with_child(XmlNode::new("HintPath").with_text(hint));
                }
                if let Some(private) = &self.private {
                    node = node.with_child(XmlNode::new("Private").with_text(private));
                }
            }
            ReferenceKind::Project => {
                if let Some(id) = &self.project_id {
                    node = node.with_child(XmlNode::new("Project").with_text(id.as_str()));
                }
                node = node.with_child(XmlNode::new("Name").with_text(&self.name));
            }
            ReferenceKind::Package => {
                if let Some(version) = &self.version {
                    node = node.with_attribute("Version", version);
                }
            }
        }
        node
    }
}

/// A declared file item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceItem {
    pub item_type: String,
    pub include: String,
    /// Absolute path (or absolute pattern) resolved against the project folder.
    pub path: PathBuf,
    pub is_pattern: bool,
}

/// Errors raised by project loading and editing.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
    #[error("failed to serialize {path}: {source}")]
    Write { path: PathBuf, source: WriteError },
    #[error("{path}: a {kind} reference named '{name}' already exists")]
    DuplicateReference {
        path: PathBuf,
        kind: ReferenceKind,
        name: String,
    },
    #[error("{path}: no {kind} reference named '{name}'")]
    ReferenceNotFound {
        path: PathBuf,
        kind: ReferenceKind,
        name: String,
    },
}

/// One loaded project file.
#[derive(Debug, Clone)]
pub struct ProjectModel {
    path: PathBuf,
    folder: PathBuf,
    doc: XmlDocument,
    dirty: bool,
}

impl ProjectModel {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let bytes = storage::read(path)?;
        let doc = parse(&bytes).map_err(|source| ProjectError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded project");
        Ok(Self::from_document(path, doc))
    }

    pub fn from_document(path: &Path, doc: XmlDocument) -> Self {
        Self {
            path: path.to_path_buf(),
            folder: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            doc,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All references in document order.
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        for (group_path, group, condition) in item_groups(&self.doc.root) {
            for (index, item) in group.children.iter().enumerate() {
                let location = ReferenceLocation {
                    group_path: group_path.clone(),
                    index,
                    condition: condition.clone(),
                };
                if let Some(reference) = Reference::from_node(item, location) {
                    out.push(reference);
                }
            }
        }
        out
    }

    pub fn find_reference(&self, kind: ReferenceKind, name: &str) -> Option<Reference> {
        self.references()
            .into_iter()
            .find(|r| r.same_identity(kind, name))
    }

    /// Targets of all project references.
    pub fn project_references(&self) -> Vec<Reference> {
        self.references()
            .into_iter()
            .filter(|r| r.kind == ReferenceKind::Project)
            .collect()
    }

    /// Swap `old` for `new` in place. Nothing changes if `old` is missing or
    /// another reference already has `new`'s identity.
    pub fn replace_reference(&mut self, old: &Reference, new: &Reference) -> Result<(), ProjectError> {
        self.replace_reference_with(old, new, new.to_element())
    }

    /// Like [`replace_reference`](Self::replace_reference), but the slot
    /// receives `node` as is, so metadata `new` does not model survives.
    pub fn replace_reference_with(
        &mut self,
        old: &Reference,
        new: &Reference,
        mut node: XmlNode,
    ) -> Result<(), ProjectError> {
        let target = self.locate(old).ok_or_else(|| self.not_found(old))?;
        if self
            .references()
            .iter()
            .any(|r| r.location != target.location && r.same_identity(new.kind, &new.name))
        {
            return Err(self.duplicate(new));
        }

        let location = target.location;
        let Some(slot) = node_at_mut(&mut self.doc.root, &location.group_path)
            .and_then(|group| group.children.get_mut(location.index))
        else {
            return Err(self.not_found(old));
        };
        node.leading_comments = std::mem::take(&mut slot.leading_comments);
        *slot = node;
        self.dirty = true;
        debug!(
            project = %self.path.display(),
            from = %format!("{} {}", old.kind, old.name),
            to = %format!("{} {}", new.kind, new.name),
            "replaced reference"
        );
        Ok(())
    }

    /// The element behind a reference, as it stands in the document.
    pub fn reference_node(&self, reference: &Reference) -> Option<&XmlNode> {
        let target = self.locate(reference)?;
        node_at(&self.doc.root, &target.location.group_path)?
            .children
            .get(target.location.index)
    }

    /// Remove a reference. An `ItemGroup` left empty is removed with it.
    pub fn remove_reference(&mut self, reference: &Reference) -> Result<Reference, ProjectError> {
        let target = self
            .locate(reference)
            .ok_or_else(|| self.not_found(reference))?;
        let location = &target.location;
        let Some(group) = node_at_mut(&mut self.doc.root, &location.group_path) else {
            return Err(self.not_found(reference));
        };
        let removed = group.children.remove(location.index);
        if group.children.is_empty() && removed.leading_comments.is_empty() {
            remove_node_at(&mut self.doc.root, &location.group_path);
        }
        self.dirty = true;
        debug!(project = %self.path.display(), kind = %target.kind, name = %target.name, "removed reference");
        Ok(target)
    }

    /// The current reference `wanted` stands for. One read from this document
    /// must still sit at its recorded location with the same kind, name and
    /// include; one built by hand matches the first such reference anywhere.
    fn locate(&self, wanted: &Reference) -> Option<Reference> {
        let same = |r: &Reference| {
            r.same_identity(wanted.kind, &wanted.name)
                && r.include.eq_ignore_ascii_case(&wanted.include)
        };
        let by_hand = wanted.location.group_path.is_empty();
        self.references()
            .into_iter()
            .find(|r| same(r) && (by_hand || r.location == wanted.location))
    }

    /// Declared file items, in document order. Semicolon lists are split.
    pub fn source_files(&self) -> Vec<SourceItem> {
        let mut out = Vec::new();
        for (_, group, _) in item_groups(&self.doc.root) {
            for item in &group.children {
                if !FILE_ITEM_TYPES.contains(&item.tag.as_str()) {
                    continue;
                }
                let Some(include) = item.attribute("Include") else {
                    continue;
                };
                for part in include.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                    out.push(SourceItem {
                        item_type: item.tag.clone(),
                        include: part.to_string(),
                        path: paths::resolve(&self.folder, part),
                        is_pattern: part.contains(['*', '?']),
                    });
                }
            }
        }
        out
    }

    /// Matcher over all declared file items.
    pub fn included_files(&self) -> IncludedFiles {
        IncludedFiles::new(&self.source_files())
    }

    /// Whether `path` is declared by an item, literally or by wildcard.
    pub fn is_file_included(&self, path: &Path) -> bool {
        self.included_files().contains(path)
    }

    /// First non-empty value of a top-level property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.doc
            .root
            .get_children("PropertyGroup")
            .into_iter()
            .filter_map(|group| group.get_text(&[name]))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Declared assembly name, falling back to the file stem.
    pub fn output_name(&self) -> String {
        self.property("AssemblyName")
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(&self.path.to_string_lossy()))
    }

    pub fn project_guid(&self) -> Option<ProjectId> {
        self.property("ProjectGuid").and_then(Guid::parse)
    }

    /// SDK-style projects declare an `Sdk` on the root, an `<Sdk>` element or
    /// an SDK import.
    pub fn is_sdk_style(&self) -> bool {
        let root = &self.doc.root;
        root.attribute("Sdk").is_some()
            || root.get_child("Sdk").is_some()
            || root
                .get_children("Import")
                .iter()
                .any(|import| import.attribute("Sdk").is_some())
    }

    /// SDK-style projects glob their files implicitly unless told not to.
    pub fn uses_default_items(&self) -> bool {
        let disabled = |name: &str| {
            self.property(name)
                .is_some_and(|v| v.eq_ignore_ascii_case("false"))
        };
        self.is_sdk_style() && !disabled("EnableDefaultItems") && !disabled("EnableDefaultCompileItems")
    }

    /// Target framework moniker: `v4.6.1` becomes `net461`; SDK-style
    /// projects use `TargetFramework` or the first of `TargetFrameworks`.
    pub fn target_framework(&self) -> Option<String> {
        if let Some(version) = self.property("TargetFrameworkVersion") {
            let digits = version.trim_start_matches(['v', 'V']).replace('.', "");
            return Some(format!("net{digits}"));
        }
        if let Some(tfm) = self.property("TargetFramework") {
            return Some(tfm.to_string());
        }
        self.property("TargetFrameworks")
            .and_then(|list| list.split(';').map(str::trim).find(|t| !t.is_empty()))
            .map(str::to_string)
    }

    /// Declare a file item unless an item of that type already includes it.
    /// Returns whether the document changed.
    pub fn ensure_item(&mut self, item_type: &str, include: &str) -> bool {
        let present = item_groups(&self.doc.root).into_iter().any(|(_, group, _)| {
            group.children.iter().any(|item| {
                item.tag == item_type
                    && item
                        .attribute("Include")
                        .is_some_and(|i| i.trim().eq_ignore_ascii_case(include))
            })
        });
        if present {
            return false;
        }
        insert_item(
            &mut self.doc.root,
            item_type,
            XmlNode::new(item_type).with_attribute("Include", include),
        );
        self.dirty = true;
        true
    }

    /// Serialized document bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProjectError> {
        write(&self.doc).map_err(|source| ProjectError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically write the project back.
    pub fn save(&mut self) -> Result<(), ProjectError> {
        let bytes = self.to_bytes()?;
        storage::write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        Ok(())
    }

    fn not_found(&self, reference: &Reference) -> ProjectError {
        ProjectError::ReferenceNotFound {
            path: self.path.clone(),
            kind: reference.kind,
            name: reference.name.clone(),
        }
    }

    fn duplicate(&self, reference: &Reference) -> ProjectError {
        ProjectError::DuplicateReference {
            path: self.path.clone(),
            kind: reference.kind,
            name: reference.name.clone(),
        }
    }
}

/// Compiled matcher for a project's declared files.
#[derive(Debug)]
pub struct IncludedFiles {
    exact: HashSet<String>,
    patterns: GlobSet,
}

impl IncludedFiles {
    fn new(items: &[SourceItem]) -> Self {
        let mut exact = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        for item in items {
            if !item.is_pattern {
                exact.insert(path_key(&item.path));
                continue;
            }
            let pattern = item.path.to_string_lossy().replace('\\', "/");
            match GlobBuilder::new(&pattern)
                .literal_separator(true)
                .case_insensitive(true)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => warn!(pattern = %item.include, error = %err, "ignoring invalid item pattern"),
            }
        }
        let patterns = builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "ignoring item patterns");
            GlobSet::empty()
        });
        Self { exact, patterns }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.exact.contains(&path_key(path)) || self.patterns.is_match(paths::normalize(path))
    }
}

fn path_key(path: &Path) -> String {
    paths::normalize(path)
        .to_string_lossy()
        .to_ascii_lowercase()
}

/// `ItemGroup`s at the top level and inside `Choose`/`When`/`Otherwise`,
/// with their child-index path and guarding condition.
fn item_groups(root: &XmlNode) -> Vec<(Vec<usize>, &XmlNode, Option<String>)> {
    let mut out = Vec::new();
    collect_item_groups(root, &mut Vec::new(), None, &mut out);
    out
}

fn collect_item_groups<'a>(
    node: &'a XmlNode,
    path: &mut Vec<usize>,
    inherited: Option<&str>,
    out: &mut Vec<(Vec<usize>, &'a XmlNode, Option<String>)>,
) {
    for (idx, child) in node.children.iter().enumerate() {
        path.push(idx);
        match child.tag.as_str() {
            "ItemGroup" => {
                let condition = child.attribute("Condition").or(inherited);
                out.push((path.clone(), child, condition.map(str::to_string)));
            }
            "Choose" => collect_item_groups(child, path, inherited, out),
            "When" | "Otherwise" => {
                let condition = child.attribute("Condition").or(inherited);
                collect_item_groups(child, path, condition, out);
            }
            _ => {}
        }
        path.pop();
    }
}

fn node_at<'a>(root: &'a XmlNode, path: &[usize]) -> Option<&'a XmlNode> {
    let mut current = root;
    for idx in path {
        current = current.children.get(*idx)?;
    }
    Some(current)
}

fn node_at_mut<'a>(root: &'a mut XmlNode, path: &[usize]) -> Option<&'a mut XmlNode> {
    let mut current = root;
    for idx in path {
        current = current.children.get_mut(*idx)?;
    }
    Some(current)
}

fn remove_node_at(root: &mut XmlNode, path: &[usize]) {
    let Some((last, parent_path)) = path.split_last() else {
        return;
    };
    if let Some(parent) = node_at_mut(root, parent_path) {
        if *last < parent.children.len() {
            parent.children.remove(*last);
        }
    }
}

/// Append `node` to the first unconditional top-level `ItemGroup` holding
/// `tag` items, else to a new `ItemGroup` after the last one.
fn insert_item(root: &mut XmlNode, tag: &str, node: XmlNode) {
    let existing = root.children.iter().position(|child| {
        child.tag == "ItemGroup"
            && child.attribute("Condition").is_none()
            && child.children.iter().any(|item| item.tag == tag)
    });
    if let Some(idx) = existing {
        root.children[idx].children.push(node);
        return;
    }
    let group = XmlNode::new("ItemGroup").with_child(node);
    let after_last_group = root
        .children
        .iter()
        .rposition(|child| child.tag == "ItemGroup")
        .map(|idx| idx + 1);
    match after_last_group {
        Some(idx) => root.children.insert(idx, group),
        None => {
            let before_imports = root
                .children
                .iter()
                .position(|child| child.tag == "Import" && child.attribute("Sdk").is_none())
                .unwrap_or(root.children.len());
            root.children.insert(before_imports, group);
        }
    }
}

fn assembly_name(include: &str) -> String {
    include
        .split(',')
        .next()
        .unwrap_or(include)
        .trim()
        .to_string()
}

fn file_stem(manifest_path: &str) -> String {
    paths::to_native(manifest_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest_path.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use super::{ProjectError, ProjectModel, Reference, ReferenceKind};
    use crate::solution::Guid;

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("fixtures/legacy-solution/src/App/App.csproj")
    }

    fn foo_project_reference() -> Reference {
        Reference::project(
            "Foo",
            r"..\..\..\mixin\Foo\Foo.csproj",
            Guid::parse("{B0B1C2D3-2222-4B4B-9C9C-000000000002}").expect("guid"),
        )
    }

    #[test]
    fn reads_references_and_properties() {
        let project = ProjectModel::load(&fixture()).expect("load");
        let names = project
            .references()
            .iter()
            .map(|r| format!("{}:{}", r.kind, r.name))
            .collect::<Vec<_>>();
        assert_eq!(names, ["assembly:System", "assembly:Foo", "assembly:Newtonsoft.Json"]);

        let foo = project
            .find_reference(ReferenceKind::Assembly, "foo")
            .expect("foo");
        assert_eq!(
            foo.hint_path.as_deref(),
            Some(r"..\..\packages\Foo.1.2.3\lib\net461\Foo.dll")
        );
        assert_eq!(foo.private.as_deref(), Some("True"));
        assert_eq!(foo.location.index, 1);

        assert_eq!(project.output_name(), "App");
        assert_eq!(project.target_framework().as_deref(), Some("net461"));
        assert!(!project.is_sdk_style());
        assert_eq!(
            project.project_guid().map(|g| g.to_string()).as_deref(),
            Some("{A0B1C2D3-1111-4A4A-9B9B-000000000001}")
        );
    }

    #[test]
    fn replace_keeps_position_and_round_trips_back() {
        let original = std::fs::read(fixture()).expect("read");
        let mut project = ProjectModel::load(&fixture()).expect("load");
        let foo = project
            .find_reference(ReferenceKind::Assembly, "Foo")
            .expect("foo");

        project
            .replace_reference(&foo, &foo_project_reference())
            .expect("replace");
        let swapped = project
            .find_reference(ReferenceKind::Project, "Foo")
            .expect("project ref");
        assert_eq!(swapped.location, foo.location);
        assert!(project.is_dirty());

        project
            .replace_reference(&swapped, &foo)
            .expect("replace back");
        assert_eq!(
            String::from_utf8_lossy(&project.to_bytes().expect("bytes")),
            String::from_utf8_lossy(&original)
        );
    }

    #[test]
    fn replace_rejects_duplicate_identity_without_changes() {
        let mut project = ProjectModel::load(&fixture()).expect("load");
        let foo = project
            .find_reference(ReferenceKind::Assembly, "Foo")
            .expect("foo");
        let clash = Reference::assembly("Newtonsoft.Json", None, None);

        let err = project.replace_reference(&foo, &clash).expect_err("duplicate");
        assert!(matches!(err, ProjectError::DuplicateReference { .. }));
        assert!(!project.is_dirty());
    }

    #[test]
    fn missing_reference_is_reported() {
        let mut project = ProjectModel::load(&fixture()).expect("load");
        let ghost = Reference::assembly("Ghost", None, None);
        let err = project.remove_reference(&ghost).expect_err("missing");
        assert!(matches!(err, ProjectError::ReferenceNotFound { .. }));
    }

    #[test]
    fn removing_last_item_drops_empty_group() {
        let xml = b"<Project>\n  <ItemGroup>\n    <Compile Include=\"Program.cs\" />\n  </ItemGroup>\n  <ItemGroup>\n    <ProjectReference Include=\"..\\Foo\\Foo.csproj\" />\n  </ItemGroup>\n</Project>\n";
        let doc = xml_doc_core::parse(xml).expect("parse");
        let mut project = ProjectModel::from_document(Path::new("/work/App/App.csproj"), doc);
        let foo = project
            .find_reference(ReferenceKind::Project, "Foo")
            .expect("foo");

        project.remove_reference(&foo).expect("remove");
        assert_eq!(
            String::from_utf8_lossy(&project.to_bytes().expect("bytes")),
            "<Project>\n  <ItemGroup>\n    <Compile Include=\"Program.cs\" />\n  </ItemGroup>\n</Project>\n"
        );
    }

    #[test]
    fn same_named_references_are_told_apart_by_location() {
        let xml = br#"<Project>
  <ItemGroup>
    <ProjectReference Include="..\..\..\mixin\Foo\Foo.csproj" />
    <ProjectReference Include="..\Ghost\Foo.csproj" />
  </ItemGroup>
</Project>
"#;
        let doc = xml_doc_core::parse(xml).expect("parse");
        let mut project = ProjectModel::from_document(Path::new("/work/App/App.csproj"), doc);
        let refs = project.project_references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, refs[1].name);

        let mut moved = refs[1].clone();
        moved.location.index = 0;
        let err = project.remove_reference(&moved).expect_err("wrong slot");
        assert!(matches!(err, ProjectError::ReferenceNotFound { .. }));

        let removed = project.remove_reference(&refs[1]).expect("remove ghost");
        assert_eq!(removed.include, r"..\Ghost\Foo.csproj");
        let left = project.project_references();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].include, r"..\..\..\mixin\Foo\Foo.csproj");
    }

    #[test]
    fn restoring_a_node_keeps_metadata_the_model_does_not_read() {
        let xml = b"<Project>\n  <ItemGroup>\n    <!-- pinned -->\n    <Reference Include=\"Foo\">\n      <SpecificVersion>False</SpecificVersion>\n    </Reference>\n  </ItemGroup>\n</Project>\n";
        let doc = xml_doc_core::parse(xml).expect("parse");
        let mut project = ProjectModel::from_document(Path::new("/work/App/App.csproj"), doc);
        let foo = project
            .find_reference(ReferenceKind::Assembly, "Foo")
            .expect("foo");
        let original = project.reference_node(&foo).expect("node").clone();
        assert_eq!(original.leading_comments, vec![" pinned ".to_string()]);

        project
            .replace_reference(&foo, &foo_project_reference())
            .expect("swap");
        let swapped = project
            .find_reference(ReferenceKind::Project, "Foo")
            .expect("swapped");
        project
            .replace_reference_with(&swapped, &foo, original)
            .expect("restore");
        assert_eq!(
            String::from_utf8_lossy(&project.to_bytes().expect("bytes")),
            String::from_utf8_lossy(xml)
        );
    }

    #[test]
    fn file_items_match_literally_and_by_wildcard() {
        let mut project = ProjectModel::load(&fixture()).expect("load");
        let folder = project.folder().to_path_buf();
        assert!(project.is_file_included(&folder.join("Program.cs")));
        assert!(project.is_file_included(&folder.join("properties/assemblyinfo.cs")));
        assert!(!project.is_file_included(&folder.join("Extra.cs")));

        assert!(project.ensure_item("Compile", r"Generated\**\*.cs"));
        assert!(!project.ensure_item("Compile", r"generated\**\*.cs"));
        assert!(project.is_file_included(&folder.join("Generated/Deep/Model.cs")));
        assert!(!project.is_file_included(Path::new("/elsewhere/Generated/Model.cs")));
    }

    #[test]
    fn reads_conditional_groups_and_sdk_projects() {
        let xml = br#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks>net6.0;net48</TargetFrameworks>
  </PropertyGroup>
  <ItemGroup Condition="'$(TargetFramework)' == 'net48'">
    <PackageReference Include="Bar" Version="2.0.0" />
  </ItemGroup>
</Project>
"#;
        let doc = xml_doc_core::parse(xml).expect("parse");
        let project = ProjectModel::from_document(Path::new("/work/Lib/Lib.csproj"), doc);
        assert!(project.is_sdk_style());
        assert!(project.uses_default_items());
        assert_eq!(project.output_name(), "Lib");
        assert_eq!(project.target_framework().as_deref(), Some("net6.0"));

        let bar = project
            .find_reference(ReferenceKind::Package, "bar")
            .expect("bar");
        assert_eq!(bar.version.as_deref(), Some("2.0.0"));
        assert_eq!(
            bar.location.condition.as_deref(),
            Some("'$(TargetFramework)' == 'net48'")
        );
    }
}
