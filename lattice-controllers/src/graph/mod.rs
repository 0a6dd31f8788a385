//! Dependency Graph
//!
//! The graph records which reactive computations read which cells, so a
//! write can find everything it affects.
//!
//! # Overview
//!
//! - Nodes are cells (sources), memos (derived) or effects
//! - An edge from A to B means B read A during its last run
//!
//! Observers rebuild their incoming edges after every run, so the graph
//! only ever holds the dependencies of the most recent execution.
//! Propagation walks dependents breadth-first and returns them in
//! topological order, dependencies before dependents.

mod node;
mod scheduler;

pub use node::{Node, NodeId, NodeKind};
pub use scheduler::UpdateScheduler;
