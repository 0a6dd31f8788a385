//! Update Scheduler
//!
//! The scheduler owns the dependency graph and decides which nodes a write
//! reaches, and in which order they must be processed.
//!
//! # Algorithm
//!
//! 1. Start from the written source's direct dependents
//! 2. Walk dependents breadth-first, visiting each node once
//! 3. Sort the visited set topologically (Kahn's algorithm), so a memo is
//!    always invalidated before an effect that reads it runs

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{Node, NodeId, NodeKind};

/// The update scheduler manages the dependency graph.
#[derive(Debug)]
pub struct UpdateScheduler {
    nodes: HashMap<NodeId, Node>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph, together with every edge touching it.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.remove(&node_id) {
            for dep_id in node.dependencies() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }

            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Add a dependency edge: `dependent` reads `dependency`.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if !self.nodes.contains_key(&dependency) || !self.nodes.contains_key(&dependent) {
            return;
        }
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Remove every incoming edge of `observer`.
    pub fn clear_dependencies(&mut self, observer: NodeId) {
        let previous = match self.nodes.get_mut(&observer) {
            Some(node) => node.take_dependencies(),
            None => return,
        };
        for dep_id in previous {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(observer);
            }
        }
    }

    /// Replace the incoming edges of `observer` with `dependencies`.
    pub fn set_dependencies<I>(&mut self, observer: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.clear_dependencies(observer);
        for dependency in dependencies {
            if dependency != observer {
                self.add_edge(dependency, observer);
            }
        }
    }

    /// Collect every node reachable from `source`, in topological order.
    pub fn affected_by(&self, source_id: NodeId) -> Vec<NodeId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            queue.extend(source.dependents().iter().copied());
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&node_id) {
                to_process.push(node_id);
                if node.kind() == NodeKind::Derived {
                    queue.extend(node.dependents().iter().copied());
                }
            }
        }

        self.topological_sort(to_process)
    }

    /// Returns nodes in order such that dependencies come before dependents.
    ///
    /// Nodes caught in a cycle are appended in ID order at the end.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        let mut ordered = nodes;
        ordered.sort();

        for &node_id in &ordered {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(*d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                let mut next: Vec<NodeId> = node.dependents().iter().copied().collect();
                next.sort();
                for dependent_id in next {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        if *degree == 0 {
                            continue;
                        }
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        if result.len() < ordered.len() {
            let placed: HashSet<_> = result.iter().copied().collect();
            result.extend(ordered.into_iter().filter(|id| !placed.contains(id)));
        }

        result
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}
