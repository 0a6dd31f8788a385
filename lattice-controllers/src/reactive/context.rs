//! Reactive Context
//!
//! The reactive context tracks which computation is currently running, so a
//! cell read can be attributed to it.
//!
//! # Implementation
//!
//! A thread-local stack holds one entry per running computation. Running a
//! memo or effect pushes an entry, reads append to the top entry, and the
//! computation collects its reads before the guard pops the entry. Nested
//! computations (an effect reading a memo that recomputes) therefore keep
//! their reads apart.
//!
//! An entry without an observer marks an untracked section: reads inside it
//! are not recorded by anyone.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::graph::NodeId;

/// Reads collected during one run.
pub type Dependencies = SmallVec<[NodeId; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
struct ContextEntry {
    /// `None` for an untracked section.
    observer: Option<NodeId>,
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    observer: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given observer.
    pub fn enter(observer: NodeId) -> Self {
        Self::push(Some(observer))
    }

    /// Enter a section in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(observer: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer,
                dependencies: Dependencies::new(),
            });
        });
        Self { observer }
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        Self::current_observer().is_some()
    }

    /// The observer that a read right now would be attributed to.
    pub fn current_observer() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.observer))
    }

    /// Record a read of `node` by the current observer, if any.
    pub fn track_dependency(node: NodeId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.observer.is_some() && !entry.dependencies.contains(&node) {
                    entry.dependencies.push(node);
                }
            }
        });
    }

    /// Take the reads collected so far by this context.
    pub fn take_dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.observer, self.observer,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer, entry.observer
                );
            }
        });
    }
}

/// Run `f` without recording any of its reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_observer() {
        let id = NodeId::new();

        assert!(!ReactiveContext::is_tracking());
        {
            let _ctx = ReactiveContext::enter(id);
            assert_eq!(ReactiveContext::current_observer(), Some(id));
        }
        assert!(ReactiveContext::current_observer().is_none());
    }

    #[test]
    fn reads_are_deduplicated() {
        let id = NodeId::new();
        let (a, b) = (NodeId::new(), NodeId::new());
        let ctx = ReactiveContext::enter(id);

        ReactiveContext::track_dependency(a);
        ReactiveContext::track_dependency(b);
        ReactiveContext::track_dependency(a);

        assert_eq!(ctx.take_dependencies().as_slice(), &[a, b]);
    }

    #[test]
    fn nested_contexts_keep_reads_apart() {
        let (outer_id, inner_id) = (NodeId::new(), NodeId::new());
        let (a, b) = (NodeId::new(), NodeId::new());

        let outer = ReactiveContext::enter(outer_id);
        ReactiveContext::track_dependency(a);
        {
            let inner = ReactiveContext::enter(inner_id);
            ReactiveContext::track_dependency(b);
            assert_eq!(inner.take_dependencies().as_slice(), &[b]);
        }
        assert_eq!(outer.take_dependencies().as_slice(), &[a]);
    }

    #[test]
    fn untracked_sections_record_nothing() {
        let id = NodeId::new();
        let a = NodeId::new();
        let ctx = ReactiveContext::enter(id);

        untrack(|| {
            assert!(!ReactiveContext::is_tracking());
            ReactiveContext::track_dependency(a);
        });

        assert!(ctx.take_dependencies().is_empty());
        assert_eq!(ReactiveContext::current_observer(), Some(id));
    }
}
