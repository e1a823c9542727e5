//! Project-reference graph keyed by project file path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Default, Clone)]
pub struct ReferenceGraph {
    nodes: BTreeMap<String, PathBuf>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` references `to`.
    pub fn add_edge(&mut self, from: &Path, to: &Path) {
        let from = self.node(from);
        let to = self.node(to);
        self.edges.entry(from).or_default().insert(to);
    }

    /// Whether `to` is reachable from `from` along one or more edges.
    pub fn reaches(&self, from: &Path, to: &Path) -> bool {
        let target = key(to);
        let mut stack = vec![key(from)];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            let Some(next) = self.edges.get(&current) else {
                continue;
            };
            for node in next {
                if *node == target {
                    return true;
                }
                if visited.insert(node.clone()) {
                    stack.push(node.clone());
                }
            }
        }
        false
    }

    /// Whether adding `from → to` would close a cycle.
    pub fn would_cycle(&self, from: &Path, to: &Path) -> bool {
        key(from) == key(to) || self.reaches(to, from)
    }

    /// One path per cycle found by a depth-first walk, each starting and
    /// ending at the same project.
    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit(
            graph: &ReferenceGraph,
            node: &str,
            marks: &mut BTreeMap<String, Mark>,
            stack: &mut Vec<String>,
            out: &mut Vec<Vec<PathBuf>>,
        ) {
            marks.insert(node.to_string(), Mark::Active);
            stack.push(node.to_string());
            if let Some(next) = graph.edges.get(node) {
                for child in next {
                    match marks.get(child) {
                        Some(Mark::Active) => {
                            let start = stack.iter().position(|n| n == child).unwrap_or(0);
                            let mut cycle = stack[start..]
                                .iter()
                                .map(|n| graph.path_of(n))
                                .collect::<Vec<_>>();
                            cycle.push(graph.path_of(child));
                            out.push(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => visit(graph, child, marks, stack, out),
                    }
                }
            }
            stack.pop();
            marks.insert(node.to_string(), Mark::Done);
        }

        let mut marks = BTreeMap::new();
        let mut out = Vec::new();
        for node in self.nodes.keys() {
            if !marks.contains_key(node) {
                visit(self, node, &mut marks, &mut Vec::new(), &mut out);
            }
        }
        out
    }

    fn node(&mut self, path: &Path) -> String {
        let k = key(path);
        self.nodes
            .entry(k.clone())
            .or_insert_with(|| paths::normalize(path));
        k
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.nodes
            .get(key)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(key))
    }
}

fn key(path: &Path) -> String {
    paths::normalize(path)
        .to_string_lossy()
        .to_ascii_lowercase()
}
