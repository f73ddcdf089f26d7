//! Hook bindings and the handles returned when they are registered.
//!
//! A [`HookHandle`] is the caller's lifecycle token for one binding. It
//! records the binding's direction and permanence and can remove exactly
//! that binding without touching its neighbours. Handles hold a weak
//! reference, so dropping the owning model invalidates them rather than
//! keeping hook points alive.

use core::fmt;
use std::sync::{Arc, Weak};

use super::direction::Direction;
use crate::hook_point::HookPoint;
use crate::tensor::Tensor;

/// A hook function.
///
/// Receives the value (or gradient) reaching the hook point and the hook
/// point itself, which exposes the point's name and scratch context. Returning
/// `Some` replaces the flowing value; `None` leaves it unchanged.
pub type HookFn = Arc<dyn Fn(&Tensor, &HookPoint) -> Option<Tensor> + Send + Sync>;

/// Wraps a closure as a [`HookFn`].
///
/// # Example
///
/// ```ignore
/// let zero = hook_fn(|act, _hook| Some(act.zeros_like()));
/// ```
pub fn hook_fn<F>(f: F) -> HookFn
where
    F: Fn(&Tensor, &HookPoint) -> Option<Tensor> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ─────────────────────────────────────────────────────────────────────────────
// HookId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a single binding.
///
/// Generated with nanoid; internally an `Arc<str>` so cloning is a reference
/// count bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookId(Arc<str>);

impl HookId {
    /// Creates a new unique ID.
    #[must_use]
    pub fn new() -> Self {
        Self(nanoid::nanoid!().into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookBinding
// ─────────────────────────────────────────────────────────────────────────────

/// Entry in a hook point's binding list.
#[derive(Clone)]
pub(crate) struct HookBinding {
    pub(crate) id: HookId,
    pub(crate) hook: HookFn,
    pub(crate) is_permanent: bool,
}

impl HookBinding {
    pub(crate) fn new(hook: HookFn, is_permanent: bool) -> Self {
        Self {
            id: HookId::new(),
            hook,
            is_permanent,
        }
    }

    /// Whether a removal pass with the given flag should drop this binding.
    pub(crate) fn is_removable(&self, including_permanent: bool) -> bool {
        including_permanent || !self.is_permanent
    }
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("id", &self.id)
            .field("is_permanent", &self.is_permanent)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle token for a registered hook.
///
/// Dropping a handle does **not** remove the hook; bindings live until they
/// are removed explicitly, by a scoped run, or by a reset.
#[derive(Clone)]
pub struct HookHandle {
    id: HookId,
    direction: Direction,
    is_permanent: bool,
    point: Weak<HookPoint>,
}

impl HookHandle {
    pub(crate) fn new(
        id: HookId,
        direction: Direction,
        is_permanent: bool,
        point: Weak<HookPoint>,
    ) -> Self {
        Self {
            id,
            direction,
            is_permanent,
            point,
        }
    }

    /// Returns the binding's ID.
    #[must_use]
    pub fn id(&self) -> &HookId {
        &self.id
    }

    /// Returns the direction the hook is bound in.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` if the binding survives non-forced resets.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.is_permanent
    }

    /// Returns the name of the hook point, once the registry has named it.
    #[must_use]
    pub fn hook_name(&self) -> Option<String> {
        self.point
            .upgrade()
            .and_then(|point| point.name().map(ToString::to_string))
    }

    /// Returns `true` while the binding is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.point
            .upgrade()
            .is_some_and(|point| point.has_binding(self.direction, &self.id))
    }

    /// Removes this binding, permanent or not.
    ///
    /// Returns `false` if it was already removed or the hook point is gone.
    pub fn remove(&self) -> bool {
        self.point
            .upgrade()
            .is_some_and(|point| point.remove_binding(self.direction, &self.id))
    }
}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHandle")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("is_permanent", &self.is_permanent)
            .field("hook_name", &self.hook_name())
            .finish()
    }
}
