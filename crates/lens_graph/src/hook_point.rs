//! Hook points: identity nodes that expose intermediate values.
//!
//! A [`HookPoint`] is placed by model code wherever an activation should be
//! observable. With nothing bound it is the identity function. Bound hooks run
//! inline, in registration order, and may replace the value that continues
//! downstream.
//!
//! Models hold their hook points as `Arc<HookPoint>` fields and report them
//! to the registry through [`Module::visit`](crate::module::Module::visit);
//! the registry names each point once during setup.
//!
//! # Example
//!
//! ```ignore
//! struct Mlp {
//!     hook_pre: Arc<HookPoint>,
//!     hook_post: Arc<HookPoint>,
//! }
//!
//! impl Mlp {
//!     fn forward(&self, x: Tensor) -> Tensor {
//!         let pre = self.hook_pre.forward(x.scale(2.0));
//!         self.hook_post.forward(pre.map(f32::tanh))
//!     }
//! }
//! ```

use core::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::context::HookContext;
use crate::error::{HookError, Result};
use crate::hooks::binding::{HookBinding, HookFn, HookHandle, HookId};
use crate::hooks::direction::Direction;
use crate::name::HookName;
use crate::tensor::Tensor;

/// Identity transform that runs bound hooks on the values passing through it.
pub struct HookPoint {
    /// Assigned once by the owning registry during setup.
    name: OnceLock<HookName>,
    forward_bindings: RwLock<Vec<HookBinding>>,
    backward_bindings: RwLock<Vec<HookBinding>>,
    context: Mutex<HookContext>,
}

impl Default for HookPoint {
    fn default() -> Self {
        Self {
            name: OnceLock::new(),
            forward_bindings: RwLock::new(Vec::new()),
            backward_bindings: RwLock::new(Vec::new()),
            context: Mutex::new(HookContext::new()),
        }
    }
}

impl HookPoint {
    /// Creates an unnamed hook point with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unnamed hook point ready to be stored in a model.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the name assigned at setup, if any.
    #[must_use]
    pub fn name(&self) -> Option<&HookName> {
        self.name.get()
    }

    /// Assigns the structured name. Names are write-once.
    pub(crate) fn assign_name(&self, name: HookName) -> Result<()> {
        if let Some(existing) = self.name.get() {
            if *existing == name {
                return Ok(());
            }
            return Err(HookError::AlreadyNamed {
                existing: existing.to_string(),
                requested: name.to_string(),
            });
        }
        self.name.set(name).map_err(|rejected| HookError::AlreadyNamed {
            existing: self.label().to_string(),
            requested: rejected.to_string(),
        })
    }

    /// Name for log output; `<unnamed>` before setup.
    fn label(&self) -> &str {
        self.name().map_or("<unnamed>", HookName::as_str)
    }

    /// Returns the layer index encoded in the name.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::MalformedName`] if the point is unnamed or its
    /// name does not follow `<prefix>.<layer>.<rest>`.
    pub fn layer(&self) -> Result<usize> {
        match self.name() {
            Some(name) => name.try_layer(),
            None => Err(HookError::MalformedName(self.label().to_string())),
        }
    }

    fn bindings(&self, direction: Direction) -> &RwLock<Vec<HookBinding>> {
        match direction {
            Direction::Backward => &self.backward_bindings,
            Direction::Forward | Direction::Both => &self.forward_bindings,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Passes a forward value through the bound forward hooks.
    ///
    /// Each hook sees the current value; a `Some` replacement becomes the
    /// value given to the next hook and, finally, the return value.
    #[must_use]
    pub fn forward(&self, value: Tensor) -> Tensor {
        self.run(Direction::Forward, value)
    }

    /// Passes a gradient through the bound backward hooks.
    #[must_use]
    pub fn backward(&self, grad: Tensor) -> Tensor {
        self.run(Direction::Backward, grad)
    }

    fn run(&self, direction: Direction, value: Tensor) -> Tensor {
        // Snapshot so hooks may add or remove bindings on this point without
        // deadlocking; such changes apply from the next invocation.
        let hooks: Vec<HookFn> = {
            let bindings = self.bindings(direction).read();
            if bindings.is_empty() {
                return value;
            }
            bindings.iter().map(|b| Arc::clone(&b.hook)).collect()
        };

        hooks
            .iter()
            .fold(value, |current, hook| hook(&current, self).unwrap_or(current))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding management
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a hook to the forward or backward list.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidDirection`] for [`Direction::Both`].
    pub fn add_hook(
        self: &Arc<Self>,
        hook: HookFn,
        direction: Direction,
        is_permanent: bool,
    ) -> Result<HookHandle> {
        let direction = direction.require_single()?;
        let binding = HookBinding::new(hook, is_permanent);
        let id = binding.id.clone();
        self.bindings(direction).write().push(binding);

        tracing::debug!(
            hook_point = self.label(),
            direction = %direction,
            is_permanent,
            "hook added"
        );

        Ok(HookHandle::new(id, direction, is_permanent, Arc::downgrade(self)))
    }

    /// Appends a hook that survives non-forced resets.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidDirection`] for [`Direction::Both`].
    pub fn add_perma_hook(self: &Arc<Self>, hook: HookFn, direction: Direction) -> Result<HookHandle> {
        self.add_hook(hook, direction, true)
    }

    /// Removes bindings in the selected direction(s).
    ///
    /// Permanent bindings are kept unless `including_permanent` is set.
    /// Returns the number of bindings removed.
    pub fn remove_hooks(&self, direction: Direction, including_permanent: bool) -> usize {
        let mut removed = 0;
        for single in [Direction::Forward, Direction::Backward] {
            let selected = match single {
                Direction::Forward => direction.includes_forward(),
                _ => direction.includes_backward(),
            };
            if !selected {
                continue;
            }
            let mut bindings = self.bindings(single).write();
            let before = bindings.len();
            bindings.retain(|b| !b.is_removable(including_permanent));
            removed += before - bindings.len();
        }

        if removed > 0 {
            tracing::debug!(
                hook_point = self.label(),
                direction = %direction,
                including_permanent,
                removed,
                "hooks removed"
            );
        }
        removed
    }

    /// Removes the binding with the given ID, permanent or not.
    pub(crate) fn remove_binding(&self, direction: Direction, id: &HookId) -> bool {
        let mut bindings = self.bindings(direction).write();
        let before = bindings.len();
        bindings.retain(|b| b.id != *id);
        before != bindings.len()
    }

    pub(crate) fn has_binding(&self, direction: Direction, id: &HookId) -> bool {
        self.bindings(direction).read().iter().any(|b| b.id == *id)
    }

    /// Returns the number of hooks bound in the selected direction(s).
    #[must_use]
    pub fn hook_count(&self, direction: Direction) -> usize {
        let mut count = 0;
        if direction.includes_forward() {
            count += self.forward_bindings.read().len();
        }
        if direction.includes_backward() {
            count += self.backward_bindings.read().len();
        }
        count
    }

    /// Returns the number of permanent hooks in the selected direction(s).
    #[must_use]
    pub fn permanent_hook_count(&self, direction: Direction) -> usize {
        let count = |list: &RwLock<Vec<HookBinding>>| {
            list.read().iter().filter(|b| b.is_permanent).count()
        };
        let mut total = 0;
        if direction.includes_forward() {
            total += count(&self.forward_bindings);
        }
        if direction.includes_backward() {
            total += count(&self.backward_bindings);
        }
        total
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Context
    // ─────────────────────────────────────────────────────────────────────────

    /// Locks and returns the scratch context.
    ///
    /// Do not hold the guard across a forward pass that re-enters this point.
    pub fn context(&self) -> MutexGuard<'_, HookContext> {
        self.context.lock()
    }

    /// Replaces the scratch context with a fresh, empty one.
    pub fn clear_context(&self) {
        let previous = core::mem::take(&mut *self.context.lock());
        drop(previous);
    }
}

impl fmt::Debug for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPoint")
            .field("name", &self.name().map(HookName::as_str))
            .field("forward_hooks", &self.forward_bindings.read().len())
            .field("backward_hooks", &self.backward_bindings.read().len())
            .finish_non_exhaustive()
    }
}
