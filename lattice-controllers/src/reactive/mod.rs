//! Reactive Primitives
//!
//! This module implements the reactive engine the controller layer is built
//! on: cells, memos, effects and the scopes that group them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] holds mutable state. Reading it inside a memo or effect
//! records a dependency; writing a different value notifies dependents.
//! [`ShallowRef`] notifies on every assignment and [`ReactiveMap`] keeps one
//! signal per key.
//!
//! ## Memos
//!
//! A [`Memo`] is a derived value that caches its result and recomputes on
//! the first read after a dependency changed.
//!
//! ## Effects
//!
//! An [`Effect`] runs immediately and again, synchronously, whenever a cell
//! or memo it read during its last run changes.
//!
//! ## Scopes
//!
//! An [`EffectScope`] owns effects and memos so they can be stopped together.
//!
//! # Implementation Notes
//!
//! A thread-local tracking stack attributes reads to the running
//! computation, and a process-wide dependency graph (see
//! [`crate::graph`]) routes writes to their dependents.

mod context;
mod effect;
mod memo;
mod runtime;
mod scope;
mod signal;
mod store;

pub use context::{untrack, Dependencies, ReactiveContext};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use scope::{Disposable, EffectScope, ScopeId};
pub use signal::{ShallowRef, Signal};
pub use store::ReactiveMap;
