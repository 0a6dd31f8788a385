//! Signal Implementation
//!
//! A Signal is the fundamental reactive cell. It holds a value and knows
//! which computations read it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is recorded against that computation.
//!
//! 2. When a signal's value changes, the runtime invalidates dependent memos
//!    and re-runs dependent effects before the write returns.
//!
//! 3. [`Signal::set`] compares with the current value and does nothing on
//!    an equal write. [`ShallowRef`] is the identity-replacement variant:
//!    every assignment counts as a change, whatever the contents.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::{NodeId, NodeKind};

use super::runtime::{ReactiveHandle, Runtime};

struct SignalInner<T> {
    handle: ReactiveHandle,
    value: RwLock<T>,
}

/// A reactive cell holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use lattice_controllers::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                handle: Runtime::create_node(NodeKind::Source),
                value: RwLock::new(value),
            }),
        }
    }

    /// The graph node of this signal.
    pub fn id(&self) -> NodeId {
        self.inner.handle.node_id()
    }

    /// Get the current value, recording the read.
    pub fn get(&self) -> T {
        Runtime::track_read(self.id());
        self.inner.value.read().clone()
    }

    /// Borrow the current value, recording the read.
    ///
    /// `f` must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track_read(self.id());
        f(&self.inner.value.read())
    }

    /// Get the current value without recording the read.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Store `value` and notify dependents unconditionally.
    ///
    /// Returns the previous value.
    pub fn replace(&self, value: T) -> T {
        let previous = std::mem::replace(&mut *self.inner.value.write(), value);
        Runtime::notify_change(self.id());
        previous
    }

    /// Notify dependents without changing the value.
    pub fn trigger(&self) {
        Runtime::notify_change(self.id());
    }

    /// Number of computations that read this signal on their last run.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dependent_count(self.id())
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Set a new value and notify dependents if it differs from the current
    /// one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }
        Runtime::notify_change(self.id());
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.read());
        self.set(next)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A single cell whose assignment, not its contents, is the unit of change.
///
/// Writing always notifies, even when the new value equals the old. Holders
/// replace the value wholesale instead of mutating it in place.
pub struct ShallowRef<T>
where
    T: Clone + Send + Sync + 'static,
{
    cell: Signal<T>,
}

impl<T> ShallowRef<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            cell: Signal::new(value),
        }
    }

    pub fn id(&self) -> NodeId {
        self.cell.id()
    }

    /// Read the current value, recording the read.
    pub fn value(&self) -> T {
        self.cell.get()
    }

    /// Borrow the current value, recording the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    pub fn value_untracked(&self) -> T {
        self.cell.get_untracked()
    }

    /// Replace the value and notify dependents.
    pub fn set_value(&self, value: T) -> T {
        self.cell.replace(value)
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.subscriber_count()
    }
}

impl<T> Clone for ShallowRef<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Debug for ShallowRef<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShallowRef").field(&self.cell).finish()
    }
}
