//! Activation caches and the options for filling them.
//!
//! An [`ActivationCache`] maps hook point names to captured values. Gradient
//! captures are stored under the name with [`GRAD_SUFFIX`] appended. The cache
//! is a shared handle: the caching hooks installed on the model and the caller
//! both hold clones of it, so values written during a pass are visible to the
//! caller as soon as the pass returns.

use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::filter::NameFilter;
use crate::tensor::{Device, Tensor};

/// Suffix appended to a hook point's name for its gradient entry.
pub const GRAD_SUFFIX: &str = "_grad";

/// Returns the cache key for the gradient captured at `name`.
#[must_use]
pub fn grad_key(name: &str) -> String {
    format!("{name}{GRAD_SUFFIX}")
}

/// Shared, insertion-ordered map from hook point name to captured value.
///
/// Cloning yields another handle to the same storage.
#[derive(Clone, Default)]
pub struct ActivationCache {
    entries: Arc<Mutex<IndexMap<String, Tensor>>>,
}

impl ActivationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any earlier capture.
    ///
    /// A replaced key keeps its original position.
    pub fn insert(&self, key: impl Into<String>, value: Tensor) {
        self.entries.lock().insert(key.into(), value);
    }

    /// Returns the value captured under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Tensor> {
        self.entries.lock().get(key).cloned()
    }

    /// Returns the gradient captured at hook point `name`.
    #[must_use]
    pub fn grad(&self, name: &str) -> Option<Tensor> {
        self.get(&grad_key(name))
    }

    /// Returns `true` if `key` has a capture.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Returns all keys in capture order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns the entry under `key`.
    pub fn remove(&self, key: &str) -> Option<Tensor> {
        self.entries.lock().shift_remove(key)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Copies the current contents out.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Tensor> {
        self.entries.lock().clone()
    }

    /// Returns `true` if both handles share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for ActivationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_map()
            .entries(entries.iter().map(|(k, v)| (k, v.shape())))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CacheOptions
// ─────────────────────────────────────────────────────────────────────────────

/// What to capture and how, for
/// [`HookedRoot::add_caching_hooks`](crate::registry::HookedRoot::add_caching_hooks).
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Which hook points to capture. Defaults to all of them.
    pub names_filter: NameFilter,
    /// Also capture gradients under `name + "_grad"`.
    pub incl_bwd: bool,
    /// Where captured values are relocated. Falls back to the model config,
    /// then to the CPU.
    pub device: Option<Device>,
    /// Strip a leading batch axis of extent 1.
    pub remove_batch_dim: bool,
    /// Merge into this cache instead of creating a fresh one.
    pub cache: Option<ActivationCache>,
}

impl CacheOptions {
    /// Capture every forward activation into a fresh cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts capture to the hook points selected by `filter`.
    #[must_use]
    pub fn with_names_filter(mut self, filter: impl Into<NameFilter>) -> Self {
        self.names_filter = filter.into();
        self
    }

    /// Enables or disables gradient capture.
    #[must_use]
    pub fn with_backward(mut self, incl_bwd: bool) -> Self {
        self.incl_bwd = incl_bwd;
        self
    }

    /// Relocates captured values to `device`.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Enables or disables batch-axis stripping.
    #[must_use]
    pub fn with_remove_batch_dim(mut self, remove_batch_dim: bool) -> Self {
        self.remove_batch_dim = remove_batch_dim;
        self
    }

    /// Writes into an existing cache.
    #[must_use]
    pub fn with_cache(mut self, cache: ActivationCache) -> Self {
        self.cache = Some(cache);
        self
    }
}
