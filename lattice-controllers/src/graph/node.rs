//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A cell. Only ever has dependents.
    Source,

    /// A memo. Reads other nodes and can be read.
    Derived,

    /// An effect. Reads other nodes, never read itself.
    Effect,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,

    /// Nodes this node read during its last run.
    dependencies: HashSet<NodeId>,

    /// Nodes that read this node during their last run.
    dependents: HashSet<NodeId>,
}

impl Node {
    /// Create a node of the given kind under an existing ID.
    pub fn with_id(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            dependencies: HashSet::new(),
            dependents: HashSet::new(),
        }
    }

    /// Create a new node with a fresh ID.
    pub fn new(kind: NodeKind) -> Self {
        Self::with_id(NodeId::new(), kind)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Add a dependency (a node that this node reads from).
    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.remove(&node_id);
    }

    pub fn dependencies(&self) -> &HashSet<NodeId> {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.remove(&node_id);
    }

    pub fn dependents(&self) -> &HashSet<NodeId> {
        &self.dependents
    }

    /// Take all dependencies, leaving the set empty.
    pub fn take_dependencies(&mut self) -> HashSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }
}
