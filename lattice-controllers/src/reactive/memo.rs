//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependency changed, it returns the cache.
//!
//! 3. When a dependency changes, the runtime marks the memo dirty. Nothing
//!    is recomputed at that point.
//!
//! 4. On next access, a dirty memo recomputes and re-tracks its reads.
//!
//! Effects and memos that read a memo depend on it like on any cell: a
//! change below the memo reaches them through it.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::graph::{NodeId, NodeKind};

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::scope::Disposable;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed, or the memo never ran.
    Dirty,
}

struct MemoInner<T> {
    handle: ReactiveHandle,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: RwLock<MemoState>,
    disposed: AtomicBool,
    compute_count: AtomicUsize,
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.handle.node_id()
    }

    fn mark_dirty(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            *self.state.write() = MemoState::Dirty;
        }
    }

    fn run(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// A disposed memo stops tracking and keeps returning its last value.
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo. The computation runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            handle: Runtime::create_node(NodeKind::Derived),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Dirty),
            disposed: AtomicBool::new(false),
            compute_count: AtomicUsize::new(0),
        });
        let weak: Weak<MemoInner<T>> = Arc::downgrade(&inner);
        Runtime::register(inner.handle.node_id(), weak);
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.handle.node_id()
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        Runtime::track_read(self.id());

        let cached = match *self.inner.state.read() {
            MemoState::Clean => self.inner.value.read().clone(),
            MemoState::Dirty if self.is_disposed() => self.inner.value.read().clone(),
            MemoState::Dirty => None,
        };

        match cached {
            Some(value) => value,
            None => self.recompute(),
        }
    }

    fn recompute(&self) -> T {
        let node = self.id();
        let ctx = ReactiveContext::enter(node);
        let value = (self.inner.compute)();
        let dependencies = ctx.take_dependencies();
        drop(ctx);

        if !self.is_disposed() {
            Runtime::commit_dependencies(node, dependencies);
        }

        *self.inner.value.write() = Some(value.clone());
        *self.inner.state.write() = MemoState::Clean;
        self.inner.compute_count.fetch_add(1, Ordering::SeqCst);

        value
    }

    /// Force a recomputation on next access.
    pub fn mark_dirty(&self) {
        self.inner.mark_dirty();
    }

    /// Stop tracking. The cached value is kept.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            Runtime::clear_dependencies(self.id());
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// Number of times the computation ran.
    pub fn compute_count(&self) -> usize {
        self.inner.compute_count.load(Ordering::SeqCst)
    }

    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of computations that read this memo on their last run.
    pub fn dependent_count(&self) -> usize {
        Runtime::dependent_count(self.id())
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Disposable for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn dispose(&self) {
        Memo::dispose(self);
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
