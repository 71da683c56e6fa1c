//! Versioned view-local cell
//!
//! Every displayed value a view owns lives in a [`ViewState`]. Each write
//! bumps the version. Fetches remember the version they started from and
//! apply their result with [`ViewState::set_if_version`], so a fetch never
//! overwrites a local mutation that began while it was in flight.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct Versioned<V> {
    value: V,
    version: u64,
}

/// Shared, versioned view value
///
/// Clones share the same cell. The lock is never held across an await.
#[derive(Debug)]
pub struct ViewState<V> {
    inner: Arc<Mutex<Versioned<V>>>,
}

impl<V> Clone for ViewState<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Default> Default for ViewState<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V> ViewState<V> {
    pub fn new(value: V) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Versioned { value, version: 0 })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Versioned<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn set(&self, value: V) {
        let mut guard = self.lock();
        guard.value = value;
        guard.version += 1;
    }

    /// Apply a fetched value only if nothing was written since `version`
    pub fn set_if_version(&self, version: u64, value: V) -> bool {
        let mut guard = self.lock();
        if guard.version != version {
            return false;
        }
        guard.value = value;
        guard.version += 1;
        true
    }

    /// Mutate in place; counts as a write
    pub fn update<F: FnOnce(&mut V)>(&self, f: F) {
        let mut guard = self.lock();
        f(&mut guard.value);
        guard.version += 1;
    }

    /// Read through a closure without cloning
    pub fn with<R, F: FnOnce(&V) -> R>(&self, f: F) -> R {
        f(&self.lock().value)
    }
}

impl<V: Clone> ViewState<V> {
    pub fn get(&self) -> V {
        self.lock().value.clone()
    }

    /// Swap in a value computed from the current one; counts as a write
    ///
    /// Returns the old and the new value.
    pub fn replace_with<F: FnOnce(&V) -> V>(&self, f: F) -> (V, V) {
        let mut guard = self.lock();
        let next = f(&guard.value);
        let old = std::mem::replace(&mut guard.value, next.clone());
        guard.version += 1;
        (old, next)
    }

    /// Value and version read atomically
    pub fn snapshot(&self) -> (V, u64) {
        let guard = self.lock();
        (guard.value.clone(), guard.version)
    }
}
