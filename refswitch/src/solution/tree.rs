use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{ProjectEntry, ProjectId};

/// Solution entries arranged by their folder nesting.
#[derive(Debug, Serialize)]
pub struct ProjectTree<'a> {
    pub roots: Vec<ProjectNode<'a>>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectNode<'a> {
    pub entry: &'a ProjectEntry,
    pub children: Vec<ProjectNode<'a>>,
}

pub(super) fn build(entries: &[ProjectEntry]) -> ProjectTree<'_> {
    let known = entries.iter().map(|e| &e.id).collect::<HashSet<_>>();
    let parent_of = entries
        .iter()
        .filter_map(|e| e.parent_id.as_ref().map(|p| (&e.id, p)))
        .collect::<HashMap<_, _>>();

    let mut warnings = Vec::new();
    let mut effective: HashMap<&ProjectId, &ProjectId> = HashMap::new();
    for entry in entries {
        let Some(parent) = &entry.parent_id else {
            continue;
        };
        if !known.contains(parent) {
            warnings.push(format!(
                "project '{}' names unknown parent {parent}; shown at the root",
                entry.name
            ));
        } else if in_cycle(&entry.id, &parent_of, entries.len()) {
            warnings.push(format!(
                "project '{}' is part of a nesting cycle; shown at the root",
                entry.name
            ));
        } else {
            effective.insert(&entry.id, parent);
        }
    }

    let roots = entries
        .iter()
        .filter(|e| !effective.contains_key(&e.id))
        .map(|e| node(e, entries, &effective))
        .collect();
    ProjectTree { roots, warnings }
}

fn node<'a>(
    entry: &'a ProjectEntry,
    entries: &'a [ProjectEntry],
    effective: &HashMap<&ProjectId, &ProjectId>,
) -> ProjectNode<'a> {
    let children = entries
        .iter()
        .filter(|e| effective.get(&e.id).is_some_and(|p| **p == entry.id))
        .map(|e| node(e, entries, effective))
        .collect();
    ProjectNode { entry, children }
}

/// Whether following parents from `start` leads back to `start`.
fn in_cycle<'a>(
    start: &'a ProjectId,
    parent_of: &HashMap<&'a ProjectId, &'a ProjectId>,
    limit: usize,
) -> bool {
    let mut current = start;
    for _ in 0..limit {
        match parent_of.get(current) {
            Some(parent) if *parent == start => return true,
            Some(parent) => current = *parent,
            None => return false,
        }
    }
    false
}
