//! Per-hook-point scratch storage.
//!
//! Hooks sometimes need to carry state between invocations, e.g. stashing a
//! forward activation so a backward hook can combine it with the gradient.
//! Each [`HookPoint`](crate::hook_point::HookPoint) owns one [`HookContext`];
//! it is cleared independently of the hook bindings.

use core::any::Any;
use core::fmt;

use hashbrown::HashMap;

/// String-keyed, type-erased scratch map.
#[derive(Default)]
pub struct HookContext {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl HookContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Returns the entry under `key` if it exists and has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key)?.downcast_mut::<T>()
    }

    /// Removes and returns the entry under `key` if it has type `T`.
    ///
    /// An entry of a different type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.entries.get(key)?.is::<T>() {
            return None;
        }
        self.entries
            .remove(key)
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns `true` if an entry exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
