//! Read-only views of a solution: folder hierarchy or projects grouped by
//! type.

use std::path::PathBuf;

use serde::Serialize;

use crate::issues::Issue;
use crate::solution::{ProjectNode, Solution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InspectView {
    #[default]
    Hierarchy,
    ByType,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectNode {
    pub name: String,
    pub type_name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InspectNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectProject {
    pub name: String,
    pub path: String,
    /// Solution configurations the project has a mapping for.
    pub configurations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeGroup {
    pub type_name: String,
    pub projects: Vec<InspectProject>,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub solution: PathBuf,
    pub view: InspectView,
    pub solution_configs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hierarchy: Vec<InspectNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub by_type: Vec<TypeGroup>,
    pub warnings: Vec<Issue>,
}

pub fn inspect(solution: &Solution, view: InspectView) -> InspectReport {
    let mut report = InspectReport {
        solution: solution.path().to_path_buf(),
        view,
        solution_configs: solution.solution_configs().to_vec(),
        hierarchy: Vec::new(),
        by_type: Vec::new(),
        warnings: Vec::new(),
    };
    match view {
        InspectView::Hierarchy => {
            let tree = solution.projects_with_parents();
            report.hierarchy = tree.roots.iter().map(|n| node(solution, n)).collect();
            report.warnings = tree
                .warnings
                .into_iter()
                .map(|w| Issue::warning("orphan_parent", w))
                .collect();
        }
        InspectView::ByType => {
            for entry in solution.entries() {
                let type_name = solution.type_name(&entry.type_id).to_string();
                let project = InspectProject {
                    name: entry.name.clone(),
                    path: entry.relative_path.clone(),
                    configurations: entry
                        .mapped_configs()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                };
                match report
                    .by_type
                    .iter_mut()
                    .find(|g| g.type_name == type_name)
                {
                    Some(group) => group.projects.push(project),
                    None => report.by_type.push(TypeGroup {
                        type_name,
                        projects: vec![project],
                    }),
                }
            }
        }
    }
    report
}

fn node(solution: &Solution, n: &ProjectNode<'_>) -> InspectNode {
    InspectNode {
        name: n.entry.name.clone(),
        type_name: solution.type_name(&n.entry.type_id).to_string(),
        path: n.entry.relative_path.clone(),
        children: n.children.iter().map(|c| node(solution, c)).collect(),
    }
}
