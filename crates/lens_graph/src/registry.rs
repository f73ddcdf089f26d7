//! The hook registry and its owning root.
//!
//! [`HookedRoot`] wraps a [`HookedModel`] and owns every hook binding and
//! cache attached to it. It discovers and names the model's hook points once,
//! in [`setup`](HookedRoot::setup), and from then on resolves targets by name.
//!
//! # Hooks are persistent state
//!
//! Bindings stay on their hook points across passes until something removes
//! them. A hook added to debug one run keeps firing on every later run. Prefer
//! the scoped runners, [`run_with_hooks`](HookedRoot::run_with_hooks) and
//! [`run_with_cache`](HookedRoot::run_with_cache), which reset hooks on the
//! way out. When bindings must outlive a pass (backward hooks used by a later
//! backward pass), register them deliberately and call
//! [`reset_hooks`](HookedRoot::reset_hooks) when done.
//!
//! # Example
//!
//! ```ignore
//! let root = HookedRoot::build(model)?;
//!
//! // Capture the residual stream entering every block.
//! let cache = root.add_caching_hooks(
//!     CacheOptions::new().with_names_filter(NameFilter::predicate(|n| n.ends_with("hook_resid_pre"))),
//! )?;
//! let logits = root.forward(tokens)?;
//! root.reset_hooks(true, Direction::Both, false)?;
//! ```

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::{IndexMap, IndexSet};

use crate::cache::{ActivationCache, CacheOptions, grad_key};
use crate::config::HookedConfig;
use crate::error::{HookError, Result};
use crate::filter::NameFilter;
use crate::hook_point::HookPoint;
use crate::hooks::{Direction, HookFn, HookHandle, hook_fn};
use crate::module::{Discovery, HookedModel, ModuleVisitor};
use crate::tensor::{Device, Tensor};

// ─────────────────────────────────────────────────────────────────────────────
// HookIndex
// ─────────────────────────────────────────────────────────────────────────────

/// Name lookup built by setup.
#[derive(Debug, Default)]
struct HookIndex {
    /// Hook points by name, in discovery order.
    points: IndexMap<String, Arc<HookPoint>>,
    /// Every sub-module path, in discovery order.
    modules: IndexSet<String>,
}

impl HookIndex {
    /// Traverses `model` and validates that hook point names are unique.
    fn discover<M: HookedModel>(model: &M) -> Result<Self> {
        let mut found = Discovery::default();
        model.visit(&mut ModuleVisitor::new(&mut found));

        let mut points = IndexMap::with_capacity(found.hook_points.len());
        for (name, point) in &found.hook_points {
            let key = name.to_string();
            if points.contains_key(&key) {
                return Err(HookError::DuplicateName(key));
            }
            points.insert(key, Arc::clone(point));
        }

        // Names are only assigned once the whole tree is known to be valid.
        for (name, point) in found.hook_points {
            point.assign_name(name)?;
        }

        Ok(Self {
            points,
            modules: found.modules.into_iter().collect(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookedRoot
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of a model's hook points, bindings and caching state.
pub struct HookedRoot<M> {
    model: M,
    config: HookedConfig,
    index: Option<HookIndex>,
    is_caching: AtomicBool,
}

impl<M: HookedModel> HookedRoot<M> {
    /// Wraps `model` with the default configuration. Call
    /// [`setup`](Self::setup) before registering hooks.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self::with_config(model, HookedConfig::default())
    }

    /// Wraps `model` with an explicit configuration.
    #[must_use]
    pub fn with_config(model: M, config: HookedConfig) -> Self {
        Self {
            model,
            config,
            index: None,
            is_caching: AtomicBool::new(false),
        }
    }

    /// Wraps `model` and runs [`setup`](Self::setup).
    ///
    /// # Errors
    ///
    /// See [`setup`](Self::setup).
    pub fn build(model: M) -> Result<Self> {
        let mut root = Self::new(model);
        root.setup()?;
        Ok(root)
    }

    /// Discovers every hook point, assigns its structured name and builds the
    /// name index.
    ///
    /// Must run exactly once, after the model's structure is final.
    ///
    /// # Errors
    ///
    /// - [`HookError::AlreadyInitialized`] on a second call
    /// - [`HookError::DuplicateName`] if two hook points share a path
    /// - [`HookError::AlreadyNamed`] if one hook point is reachable from two
    ///   paths, or was already named by another root
    pub fn setup(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Err(HookError::AlreadyInitialized);
        }
        let index = HookIndex::discover(&self.model)?;
        tracing::debug!(
            hook_points = index.points.len(),
            modules = index.modules.len(),
            "hook registry set up"
        );
        self.index = Some(index);
        Ok(())
    }

    /// Returns `true` once [`setup`](Self::setup) has succeeded.
    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.index.is_some()
    }

    fn index(&self) -> Result<&HookIndex> {
        self.index.as_ref().ok_or(HookError::NotInitialized)
    }

    pub(crate) fn ensure_setup(&self) -> Result<()> {
        self.index().map(|_| ())
    }

    /// Returns the wrapped model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &HookedConfig {
        &self.config
    }

    /// Returns `true` while caching hooks installed by
    /// [`add_caching_hooks`](Self::add_caching_hooks) may still be attached.
    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.is_caching.load(Ordering::Relaxed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Looks up a hook point by exact name.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup, [`HookError::UnknownNode`]
    /// if no hook point has that name.
    pub fn hook_point(&self, name: &str) -> Result<&Arc<HookPoint>> {
        let index = self.index()?;
        index.points.get(name).ok_or_else(|| {
            if index.modules.contains(name) {
                tracing::debug!(name, "target names a module, not a hook point");
            }
            HookError::UnknownNode(name.to_string())
        })
    }

    /// Returns every hook point in discovery order.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn hook_points(&self) -> Result<impl Iterator<Item = &Arc<HookPoint>>> {
        Ok(self.index()?.points.values())
    }

    /// Returns every hook point name in discovery order.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn hook_names(&self) -> Result<impl Iterator<Item = &str>> {
        Ok(self.index()?.points.keys().map(String::as_str))
    }

    /// Returns every sub-module path in discovery order.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn module_names(&self) -> Result<impl Iterator<Item = &str>> {
        Ok(self.index()?.modules.iter().map(String::as_str))
    }

    /// Resolves a filter to hook points.
    ///
    /// Exact filters must name an existing hook point; sets and predicates
    /// may match nothing.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup, [`HookError::UnknownNode`]
    /// for an unknown exact name.
    pub fn resolve(&self, filter: &NameFilter) -> Result<Vec<&Arc<HookPoint>>> {
        if let Some(name) = filter.as_exact() {
            return Ok(vec![self.hook_point(name)?]);
        }
        self.matching(filter)
    }

    /// Hook points whose names pass `filter`. Unlike [`resolve`](Self::resolve),
    /// an unknown exact name selects nothing.
    fn matching(&self, filter: &NameFilter) -> Result<Vec<&Arc<HookPoint>>> {
        Ok(self
            .index()?
            .points
            .iter()
            .filter(|(name, _)| filter.matches(name))
            .map(|(_, point)| point)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Binds `hook` on every hook point selected by `target`.
    ///
    /// The model's [`check_hook`](HookedModel::check_hook) is consulted for
    /// every target before anything is bound, so a veto leaves no partial
    /// registration behind.
    ///
    /// # Errors
    ///
    /// - [`HookError::NotInitialized`] before setup
    /// - [`HookError::InvalidDirection`] for [`Direction::Both`]
    /// - [`HookError::UnknownNode`] for an unknown exact name
    /// - whatever `check_hook` returns
    pub fn add_hook(
        &self,
        target: impl Into<NameFilter>,
        hook: HookFn,
        direction: Direction,
        is_permanent: bool,
    ) -> Result<Vec<HookHandle>> {
        self.bind(&target.into(), &hook, direction, is_permanent)
    }

    /// [`add_hook`](Self::add_hook) with `is_permanent` set.
    ///
    /// # Errors
    ///
    /// See [`add_hook`](Self::add_hook).
    pub fn add_perma_hook(
        &self,
        target: impl Into<NameFilter>,
        hook: HookFn,
        direction: Direction,
    ) -> Result<Vec<HookHandle>> {
        self.bind(&target.into(), &hook, direction, true)
    }

    fn bind(
        &self,
        target: &NameFilter,
        hook: &HookFn,
        direction: Direction,
        is_permanent: bool,
    ) -> Result<Vec<HookHandle>> {
        let points = self.resolve(target)?;
        self.bind_points(points, hook, direction, is_permanent)
    }

    fn bind_points(
        &self,
        points: Vec<&Arc<HookPoint>>,
        hook: &HookFn,
        direction: Direction,
        is_permanent: bool,
    ) -> Result<Vec<HookHandle>> {
        let direction = direction.require_single()?;

        for point in &points {
            if let Some(name) = point.name() {
                self.model.check_hook(name, direction)?;
            }
        }

        points
            .into_iter()
            .map(|point| point.add_hook(Arc::clone(hook), direction, is_permanent))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Removes hooks from every hook point. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn remove_all_hook_fns(&self, direction: Direction, including_permanent: bool) -> Result<usize> {
        Ok(self
            .hook_points()?
            .map(|point| point.remove_hooks(direction, including_permanent))
            .sum())
    }

    /// Clears the scratch context of every hook point.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn clear_contexts(&self) -> Result<()> {
        self.hook_points()?.for_each(|point| point.clear_context());
        Ok(())
    }

    /// Detaches instrumentation: optionally clears contexts, removes hooks in
    /// `direction`, and resets the caching flag.
    ///
    /// Idempotent. Permanent hooks survive unless `including_permanent`.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn reset_hooks(
        &self,
        clear_contexts: bool,
        direction: Direction,
        including_permanent: bool,
    ) -> Result<()> {
        if clear_contexts {
            self.clear_contexts()?;
        }
        let removed = self.remove_all_hook_fns(direction, including_permanent)?;
        self.is_caching.store(false, Ordering::Relaxed);
        tracing::debug!(
            removed,
            clear_contexts,
            direction = %direction,
            including_permanent,
            "hooks reset"
        );
        Ok(())
    }

    /// Counts bindings across all hook points.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup.
    pub fn hook_count(&self, direction: Direction) -> Result<usize> {
        Ok(self
            .hook_points()?
            .map(|point| point.hook_count(direction))
            .sum())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Caching
    // ─────────────────────────────────────────────────────────────────────────

    /// Installs hooks that copy activations (and optionally gradients) into a
    /// cache. Does not run the model.
    ///
    /// Each captured value is detached, relocated to the resolved device and,
    /// with `remove_batch_dim`, stripped of a leading axis of extent 1.
    /// Activations are stored under the hook point's name, gradients under
    /// the name plus `"_grad"`. The filter is a plain matcher here: an exact
    /// name that no hook point carries caches nothing.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`] before setup or a `check_hook` veto.
    pub fn add_caching_hooks(&self, options: CacheOptions) -> Result<ActivationCache> {
        let CacheOptions {
            names_filter,
            incl_bwd,
            device,
            remove_batch_dim,
            cache,
        } = options;

        let device = self.config.resolve_device(device);
        let cache = cache.unwrap_or_default();

        let points = self.matching(&names_filter)?;

        let save = caching_hook(cache.clone(), device, remove_batch_dim, str::to_owned);
        let forward = self.bind_points(points.clone(), &save, Direction::Forward, false)?;

        if incl_bwd {
            let save_grad = caching_hook(cache.clone(), device, remove_batch_dim, grad_key);
            if let Err(err) = self.bind_points(points, &save_grad, Direction::Backward, false) {
                for handle in &forward {
                    handle.remove();
                }
                return Err(err);
            }
        }

        self.is_caching.store(true, Ordering::Relaxed);
        let count = forward.len();

        tracing::debug!(
            hook_points = count,
            incl_bwd,
            device = %device,
            remove_batch_dim,
            "caching hooks installed"
        );
        Ok(cache)
    }

    /// Caches every activation into `cache`.
    ///
    /// # Errors
    ///
    /// See [`add_caching_hooks`](Self::add_caching_hooks).
    #[deprecated(note = "use add_caching_hooks or run_with_cache")]
    pub fn cache_all(
        &self,
        cache: ActivationCache,
        incl_bwd: bool,
        device: Option<Device>,
        remove_batch_dim: bool,
    ) -> Result<ActivationCache> {
        tracing::warn!("cache_all is deprecated, use add_caching_hooks or run_with_cache");
        self.add_caching_hooks(CacheOptions {
            names_filter: NameFilter::All,
            incl_bwd,
            device,
            remove_batch_dim,
            cache: Some(cache),
        })
    }

    /// Caches the activations selected by `names` into `cache`.
    ///
    /// # Errors
    ///
    /// See [`add_caching_hooks`](Self::add_caching_hooks).
    #[deprecated(note = "use add_caching_hooks or run_with_cache")]
    pub fn cache_some(
        &self,
        cache: ActivationCache,
        names: impl Into<NameFilter>,
        incl_bwd: bool,
        device: Option<Device>,
        remove_batch_dim: bool,
    ) -> Result<ActivationCache> {
        tracing::warn!("cache_some is deprecated, use add_caching_hooks or run_with_cache");
        self.add_caching_hooks(CacheOptions {
            names_filter: names.into(),
            incl_bwd,
            device,
            remove_batch_dim,
            cache: Some(cache),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one forward pass with whatever hooks are currently bound.
    ///
    /// # Errors
    ///
    /// Propagates the model's error.
    pub fn forward(&self, input: M::Input) -> Result<M::Output> {
        self.model.forward(input)
    }

    /// Runs the model's backward pass from `output`.
    ///
    /// # Errors
    ///
    /// Propagates the model's error, including
    /// [`HookError::BackwardUnsupported`].
    pub fn backward(&self, output: &M::Output) -> Result<()> {
        self.model.backward(output)
    }
}

/// Builds a hook that stores a prepared copy of the flowing value in `cache`.
fn caching_hook(
    cache: ActivationCache,
    device: Device,
    remove_batch_dim: bool,
    key: fn(&str) -> String,
) -> HookFn {
    hook_fn(move |value: &Tensor, hook: &HookPoint| {
        if let Some(name) = hook.name() {
            let mut stored = value.detach().to_device(device);
            if remove_batch_dim {
                stored = stored.remove_batch_dim();
            }
            cache.insert(key(name.as_str()), stored);
        }
        None
    })
}

impl<M> fmt::Debug for HookedRoot<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedRoot")
            .field("config", &self.config)
            .field(
                "hook_points",
                &self.index.as_ref().map(|index| index.points.len()),
            )
            .field("is_caching", &self.is_caching.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
