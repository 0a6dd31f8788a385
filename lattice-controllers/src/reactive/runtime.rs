//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, memos, and
//! effects. It owns the dependency graph and runs updates when cells change.
//!
//! # How It Works
//!
//! 1. Every cell, memo and effect owns a node in the graph.
//!
//! 2. A memo or effect collects its reads while it runs and commits them as
//!    its incoming edges when it finishes.
//!
//! 3. When a cell changes, the runtime:
//!    a. Collects every node reachable from the cell
//!    b. Marks the memos among them dirty (they recompute on next read)
//!    c. Runs the effects among them, in topological order, before returning
//!
//! # Thread Safety
//!
//! The graph and the registry are process-global, so handles can be shared
//! across threads and a write on any thread reaches every dependent. The
//! tracking stack and the update-depth counter are thread-local: a
//! computation's reads are attributed on the thread that runs it, and
//! effects run synchronously on the writing thread. No global lock is held
//! while user code runs.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::{ReactivityConfig, DEFAULT_MAX_UPDATE_DEPTH};
use crate::graph::{Node, NodeId, NodeKind, UpdateScheduler};

use super::context::ReactiveContext;

/// A computation that the runtime can invalidate or re-run.
pub trait Reactive: Send + Sync {
    /// The graph node owned by this computation.
    fn node_id(&self) -> NodeId;

    /// Invalidate a cached value (memos only).
    fn mark_dirty(&self);

    /// Re-run the computation (effects only).
    fn run(&self);

    /// Effects are eager, memos are lazy.
    fn is_eager(&self) -> bool;
}

/// Ownership of a graph node.
///
/// Dropping this handle removes the node and its registration.
#[derive(Debug)]
pub struct ReactiveHandle {
    node_id: NodeId,
}

impl ReactiveHandle {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::remove(self.node_id);
    }
}

// Weak references, so registration never keeps a computation alive.
static REGISTRY: OnceLock<RwLock<HashMap<NodeId, Weak<dyn Reactive>>>> = OnceLock::new();
static GRAPH: OnceLock<Mutex<UpdateScheduler>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<NodeId, Weak<dyn Reactive>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn graph() -> &'static Mutex<UpdateScheduler> {
    GRAPH.get_or_init(|| Mutex::new(UpdateScheduler::new()))
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_UPDATE_DEPTH) };
}

/// Counts nested propagations on this thread for the lifetime of one
/// `notify_change`.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        let depth = DEPTH.with(Cell::get);
        let max = MAX_DEPTH.with(Cell::get);
        if depth >= max {
            tracing::error!(depth, max, "reactive update depth exceeded");
            panic!(
                "reactive update depth exceeded {max}: an effect keeps writing to a cell it depends on"
            );
        }
        DEPTH.with(|d| d.set(depth + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let _ = DEPTH.try_with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Facade over the reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Apply runtime settings for the current thread.
    pub fn configure(config: &ReactivityConfig) {
        MAX_DEPTH.with(|max| max.set(config.max_update_depth.max(1)));
    }

    /// The current thread's propagation depth limit.
    pub fn max_update_depth() -> usize {
        MAX_DEPTH.with(Cell::get)
    }

    /// Create a graph node and hand back its ownership handle.
    pub fn create_node(kind: NodeKind) -> ReactiveHandle {
        let node_id = graph().lock().add_node(Node::new(kind));
        ReactiveHandle { node_id }
    }

    /// Register the computation behind a memo or effect node.
    pub fn register(node_id: NodeId, reactive: Weak<dyn Reactive>) {
        registry().write().insert(node_id, reactive);
    }

    fn remove(node_id: NodeId) {
        // Neither lock is held while a reactive value can be dropped, so
        // removal always completes.
        let registered = registry().write().remove(&node_id);
        graph().lock().remove_node(node_id);
        tracing::trace!(node = node_id.raw(), registered = registered.is_some(), "removed node");
    }

    /// Whether `node` is still part of the graph.
    pub fn contains(node: NodeId) -> bool {
        graph().lock().get_node(node).is_some()
    }

    /// Record a read of `node` by whatever computation is running.
    pub fn track_read(node: NodeId) {
        ReactiveContext::track_dependency(node);
    }

    /// Replace the dependencies of `observer` with the reads of its last run.
    pub fn commit_dependencies<I>(observer: NodeId, dependencies: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        graph().lock().set_dependencies(observer, dependencies);
    }

    /// Drop every dependency of `observer`, so no write reaches it anymore.
    pub fn clear_dependencies(observer: NodeId) {
        graph().lock().clear_dependencies(observer);
    }

    /// Propagate a change of `source` to everything that read it.
    ///
    /// Returns once every affected effect has run.
    pub fn notify_change(source: NodeId) {
        let affected = graph().lock().affected_by(source);
        if affected.is_empty() {
            return;
        }

        let _depth = DepthGuard::enter();

        let reactives: Vec<Arc<dyn Reactive>> = {
            let registry = registry().read();
            affected
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        // Invalidate every memo first, so effects never read a stale cache.
        for reactive in reactives.iter().filter(|r| !r.is_eager()) {
            reactive.mark_dirty();
        }

        for reactive in reactives.iter().filter(|r| r.is_eager()) {
            reactive.run();
        }
    }

    /// Number of nodes reading `node`.
    pub fn dependent_count(node: NodeId) -> usize {
        graph()
            .lock()
            .get_node(node)
            .map(|n| n.dependents().len())
            .unwrap_or(0)
    }

    /// Number of nodes read by `node` on its last run.
    pub fn dependency_count(node: NodeId) -> usize {
        graph()
            .lock()
            .get_node(node)
            .map(|n| n.dependencies().len())
            .unwrap_or(0)
    }

    /// Number of live nodes in the process.
    pub fn node_count() -> usize {
        graph().lock().node_count()
    }

    /// Check if a read right now would be tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_tracking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct MockReactive {
        handle: ReactiveHandle,
        dirty: AtomicBool,
        runs: AtomicI32,
        eager: bool,
    }

    impl MockReactive {
        fn new(eager: bool) -> Arc<Self> {
            let kind = if eager { NodeKind::Effect } else { NodeKind::Derived };
            let mock = Arc::new(Self {
                handle: Runtime::create_node(kind),
                dirty: AtomicBool::new(false),
                runs: AtomicI32::new(0),
                eager,
            });
            let weak: Weak<MockReactive> = Arc::downgrade(&mock);
            Runtime::register(mock.node_id(), weak);
            mock
        }
    }

    impl Reactive for MockReactive {
        fn node_id(&self) -> NodeId {
            self.handle.node_id()
        }

        fn mark_dirty(&self) {
            self.dirty.store(true, Ordering::SeqCst);
        }

        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn is_eager(&self) -> bool {
            self.eager
        }
    }

    #[test]
    fn dropping_the_handle_removes_the_node() {
        let handle = Runtime::create_node(NodeKind::Source);
        let node = handle.node_id();
        assert!(Runtime::contains(node));
        drop(handle);
        assert!(!Runtime::contains(node));
    }

    #[test]
    fn handles_dropped_during_propagation_are_removed() {
        let source = Runtime::create_node(NodeKind::Source);
        let transient = Arc::new(Mutex::new(Some(Runtime::create_node(NodeKind::Source))));
        let node = transient.lock().as_ref().map(ReactiveHandle::node_id);

        struct Dropper {
            handle: ReactiveHandle,
            slot: Arc<Mutex<Option<ReactiveHandle>>>,
        }

        impl Reactive for Dropper {
            fn node_id(&self) -> NodeId {
                self.handle.node_id()
            }

            fn mark_dirty(&self) {}

            fn run(&self) {
                drop(self.slot.lock().take());
            }

            fn is_eager(&self) -> bool {
                true
            }
        }

        let dropper = Arc::new(Dropper {
            handle: Runtime::create_node(NodeKind::Effect),
            slot: transient.clone(),
        });
        let weak: Weak<Dropper> = Arc::downgrade(&dropper);
        Runtime::register(dropper.node_id(), weak);
        Runtime::commit_dependencies(dropper.node_id(), [source.node_id()]);

        Runtime::notify_change(source.node_id());

        let node = node.unwrap();
        assert!(transient.lock().is_none());
        assert!(!Runtime::contains(node));
    }

    #[test]
    fn writes_from_another_thread_reach_dependents() {
        let source = Arc::new(Runtime::create_node(NodeKind::Source));
        let effect = MockReactive::new(true);
        Runtime::commit_dependencies(effect.node_id(), [source.node_id()]);

        let writer = source.clone();
        std::thread::spawn(move || Runtime::notify_change(writer.node_id()))
            .join()
            .unwrap();

        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_marks_memos_and_runs_effects() {
        let source = Runtime::create_node(NodeKind::Source);
        let memo = MockReactive::new(false);
        let effect = MockReactive::new(true);

        Runtime::commit_dependencies(memo.node_id(), [source.node_id()]);
        Runtime::commit_dependencies(effect.node_id(), [source.node_id()]);
        assert_eq!(Runtime::dependent_count(source.node_id()), 2);

        Runtime::notify_change(source.node_id());

        assert!(memo.dirty.load(Ordering::SeqCst));
        assert_eq!(memo.runs.load(Ordering::SeqCst), 0);
        assert!(!effect.dirty.load(Ordering::SeqCst));
        assert_eq!(effect.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleared_dependencies_stop_notifications() {
        let source = Runtime::create_node(NodeKind::Source);
        let effect = MockReactive::new(true);

        Runtime::commit_dependencies(effect.node_id(), [source.node_id()]);
        Runtime::clear_dependencies(effect.node_id());
        Runtime::notify_change(source.node_id());

        assert_eq!(effect.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn configure_sets_the_depth_limit() {
        Runtime::configure(&ReactivityConfig {
            max_update_depth: 7,
            ..ReactivityConfig::default()
        });
        assert_eq!(Runtime::max_update_depth(), 7);
        Runtime::configure(&ReactivityConfig::default());
        assert_eq!(Runtime::max_update_depth(), DEFAULT_MAX_UPDATE_DEPTH);
    }
}
