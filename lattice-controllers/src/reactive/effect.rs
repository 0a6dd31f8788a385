//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the runtime re-runs the effect
//!    synchronously, inside the write that caused the change.
//!
//! 3. Every run replaces the effect's dependencies with the reads of that
//!    run, so branches not taken stop triggering it.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager.
//!
//! # Lifetime
//!
//! The runtime only holds a weak reference. An effect keeps running while a
//! handle to it (or an [`EffectScope`](super::EffectScope) that adopted it)
//! is alive and it has not been disposed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::graph::{NodeId, NodeKind};

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scope::Disposable;

struct EffectInner {
    handle: ReactiveHandle,
    run: Box<dyn Fn() + Send + Sync>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let node = self.handle.node_id();
        let ctx = ReactiveContext::enter(node);
        (self.run)();
        let dependencies = ctx.take_dependencies();
        drop(ctx);

        // The run may have disposed us; do not re-attach in that case.
        if !self.disposed.load(Ordering::SeqCst) {
            Runtime::commit_dependencies(node, dependencies);
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.handle.node_id()
    }

    fn mark_dirty(&self) {}

    fn run(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use lattice_controllers::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(AtomicI32::new(-1));
///
/// let _effect = Effect::new({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.store(count.get(), Ordering::SeqCst)
/// });
///
/// count.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
#[must_use = "an effect stops running once every handle to it is dropped"]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    ///
    /// It has no dependencies until its first [`execute`](Self::execute).
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            handle: Runtime::create_node(NodeKind::Effect),
            run: Box::new(run),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let weak: Weak<EffectInner> = Arc::downgrade(&inner);
        Runtime::register(inner.handle.node_id(), weak);
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.handle.node_id()
    }

    /// Run the effect function now, re-tracking its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect. It will not run again.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            Runtime::clear_dependencies(self.id());
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of cells and memos read on the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.id())
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Disposable for Effect {
    fn dispose(&self) {
        Effect::dispose(self);
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
