//! Dependency graph and load-order computation.
//!
//! Each plug-in with a satisfied dependency verdict becomes a node; each
//! declared dependency adds an edge from the dependency to the dependant.
//! The topological sort is a depth-first post-order traversal with
//! three-color marking; the first back edge aborts with [`CycleError`].
//!
//! The sort consumes the graph: marks are not reset afterwards.

/// The dependency graph contains a cycle; no load order exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the dependency graph contains a cycle")]
pub struct CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unmarked,
    Temporary,
    Permanent,
}

#[derive(Debug)]
struct Node {
    name: String,
    // Edge: parent --> this (parent = dependency)
    parents: Vec<usize>,
    mark: Mark,
}

/// Directed graph over plug-in names, edges pointing from dependency to
/// dependant.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self, name: impl Into<String>) -> usize {
        self.nodes.push(Node {
            name: name.into(),
            parents: Vec::new(),
            mark: Mark::Unmarked,
        });
        self.nodes.len() - 1
    }

    /// Record that `parent` must be ordered before `child`.
    ///
    /// Both indices must have been returned by [`add_node`](Self::add_node).
    pub fn add_edge(&mut self, parent: usize, child: usize) {
        self.nodes[child].parents.push(parent);
    }

    /// Produce a legal load order: every dependency of a node precedes it.
    ///
    /// Nodes are visited in insertion order; ties among independent nodes
    /// are resolved only up to that order.
    pub fn topological_sort(mut self) -> Result<Vec<String>, CycleError> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for index in 0..self.nodes.len() {
            if self.nodes[index].mark == Mark::Unmarked {
                Self::visit(&mut self.nodes, index, &mut order)?;
            }
        }
        Ok(order)
    }

    fn visit(nodes: &mut [Node], index: usize, order: &mut Vec<String>) -> Result<(), CycleError> {
        match nodes[index].mark {
            Mark::Permanent => return Ok(()),
            // A temporary mark on the path below us is a back edge.
            Mark::Temporary => return Err(CycleError),
            Mark::Unmarked => {}
        }

        nodes[index].mark = Mark::Temporary;
        let parents = nodes[index].parents.clone();
        for parent in parents {
            Self::visit(nodes, parent, order)?;
        }
        nodes[index].mark = Mark::Permanent;
        order.push(nodes[index].name.clone());
        Ok(())
    }
}
