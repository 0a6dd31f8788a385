//! Reactive maps.
//!
//! A [`ReactiveMap`] is a keyed collection of [`Signal`]s. Each key is
//! tracked on its own, so reading `price` never subscribes to `quantity`.
//! The key set is tracked separately: adding or removing a key notifies
//! readers of `len`, `keys`, `contains_key` and of missing keys.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::signal::Signal;

struct MapInner<V>
where
    V: Clone + Send + Sync + PartialEq + 'static,
{
    cells: RwLock<IndexMap<String, Signal<V>>>,
    shape: Signal<u64>,
}

/// A string-keyed map whose entries are individually reactive.
///
/// Clones share the same map.
pub struct ReactiveMap<V>
where
    V: Clone + Send + Sync + PartialEq + 'static,
{
    inner: Arc<MapInner<V>>,
}

impl<V> ReactiveMap<V>
where
    V: Clone + Send + Sync + PartialEq + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MapInner {
                cells: RwLock::new(IndexMap::new()),
                shape: Signal::new(0),
            }),
        }
    }

    fn cell(&self, key: &str) -> Option<Signal<V>> {
        self.inner.cells.read().get(key).cloned()
    }

    fn bump_shape(&self) {
        self.inner.shape.update(|version| version.wrapping_add(1));
    }

    /// Read the value at `key`, recording the read.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.cell(key) {
            Some(cell) => Some(cell.get()),
            None => {
                self.inner.shape.get();
                None
            }
        }
    }

    pub fn get_untracked(&self, key: &str) -> Option<V> {
        self.cell(key).map(|cell| cell.get_untracked())
    }

    /// Write `value` at `key`. Returns whether anything changed.
    pub fn insert(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        if let Some(cell) = self.cell(&key) {
            return cell.set(value);
        }

        let mut cells = self.inner.cells.write();
        let existing = cells.get(&key).cloned();
        match existing {
            Some(cell) => {
                drop(cells);
                cell.set(value)
            }
            None => {
                cells.insert(key, Signal::new(value));
                drop(cells);
                self.bump_shape();
                true
            }
        }
    }

    /// Remove `key`, notifying readers of the key and of the key set.
    pub fn remove(&self, key: &str) -> Option<V> {
        let cell = self.inner.cells.write().shift_remove(key)?;
        let value = cell.get_untracked();
        cell.trigger();
        self.bump_shape();
        Some(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.shape.get();
        self.inner.cells.read().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.shape.get();
        self.inner.cells.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.shape.get();
        self.inner.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles point at the same map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<V> Default for ReactiveMap<V>
where
    V: Clone + Send + Sync + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for ReactiveMap<V>
where
    V: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for ReactiveMap<V>
where
    V: Clone + Send + Sync + PartialEq + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells = self.inner.cells.read();
        f.debug_map()
            .entries(cells.iter().map(|(k, v)| (k, v.get_untracked())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn watch<F>(read: F) -> (Effect, Arc<AtomicUsize>)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let effect = Effect::new(move || {
            read();
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (effect, runs)
    }

    #[test]
    fn keys_are_tracked_independently() {
        let map = ReactiveMap::new();
        map.insert("price", 5);
        map.insert("quantity", 1);

        let reader = map.clone();
        let (_effect, runs) = watch(move || {
            reader.get("price");
        });

        map.insert("quantity", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        map.insert("price", 6);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        map.insert("price", 6);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_key_reader_sees_insertion() {
        let map: ReactiveMap<i32> = ReactiveMap::new();
        let reader = map.clone();
        let (_effect, runs) = watch(move || {
            reader.get("later");
        });

        assert!(map.insert("later", 1));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(map.get_untracked("later"), Some(1));
    }

    #[test]
    fn remove_notifies_key_and_shape_readers() {
        let map = ReactiveMap::new();
        map.insert("a", 1);
        map.insert("b", 2);

        let reader = map.clone();
        let (_value_effect, value_runs) = watch(move || {
            reader.get("a");
        });
        let reader = map.clone();
        let (_len_effect, len_runs) = watch(move || {
            reader.len();
        });

        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(value_runs.load(Ordering::SeqCst), 2);
        assert_eq!(len_runs.load(Ordering::SeqCst), 2);
        assert_eq!(map.keys(), vec!["b".to_string()]);
        assert_eq!(map.remove("a"), None);
    }
}
