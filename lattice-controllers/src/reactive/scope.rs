//! Tracking scopes.
//!
//! An [`EffectScope`] owns the effects and memos registered through it and
//! tears them down together. A stopped scope stays stopped: later
//! registrations fail with [`ReactivityError::ScopeDisposed`] and leave
//! nothing running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ReactivityError, Result};

use super::effect::Effect;
use super::memo::Memo;

/// Something a scope can tear down.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// Identifier of a scope, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct ScopeInner {
    id: ScopeId,
    active: AtomicBool,
    members: Mutex<Vec<Box<dyn Disposable>>>,
}

/// A disposable grouping of effects and memos.
///
/// Clones share the same scope.
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<ScopeInner>,
}

impl EffectScope {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::next(),
                active: AtomicBool::new(true),
                members: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Create an effect owned by this scope. It runs immediately.
    pub fn effect<F>(&self, run: F) -> Result<Effect>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if !self.is_active() {
            return Err(ReactivityError::ScopeDisposed);
        }
        let effect = Effect::new(run);
        self.adopt(effect.clone())?;
        Ok(effect)
    }

    /// Create a memo owned by this scope.
    pub fn memo<T, F>(&self, compute: F) -> Result<Memo<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        if !self.is_active() {
            return Err(ReactivityError::ScopeDisposed);
        }
        let memo = Memo::new(compute);
        self.adopt(memo.clone())?;
        Ok(memo)
    }

    /// Hand ownership of `member` to this scope.
    ///
    /// If the scope was stopped in the meantime (for instance by the first
    /// run of the effect being adopted), `member` is disposed right away.
    pub fn adopt<D>(&self, member: D) -> Result<()>
    where
        D: Disposable + 'static,
    {
        let mut members = self.inner.members.lock();
        if !self.is_active() {
            drop(members);
            member.dispose();
            return Err(ReactivityError::ScopeDisposed);
        }
        members.push(Box::new(member));
        Ok(())
    }

    /// Dispose every member. Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let members = std::mem::take(&mut *self.inner.members.lock());
        tracing::trace!(scope = ?self.id(), members = members.len(), "stopping tracking scope");
        for member in &members {
            member.dispose();
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.inner.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScope")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("members", &self.len())
            .finish()
    }
}
