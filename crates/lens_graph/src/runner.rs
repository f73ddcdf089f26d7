//! Scoped execution: hooks that live for exactly one pass.
//!
//! [`HookedRoot::run_with_hooks`] and [`HookedRoot::run_with_cache`] register
//! their hooks, run the model, and reset on the way out. The reset is done by
//! a guard's `Drop`, so it also happens when the pass returns an error or
//! panics.

use core::fmt;

use crate::cache::{ActivationCache, CacheOptions};
use crate::error::Result;
use crate::filter::NameFilter;
use crate::hooks::{Direction, HookFn};
use crate::module::HookedModel;
use crate::registry::HookedRoot;

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Hooks and cleanup policy for [`HookedRoot::run_with_hooks`].
///
/// # Example
///
/// ```ignore
/// let opts = RunOptions::new()
///     .with_fwd_hook("blocks.0.hook_resid_pre", hook_fn(|x, _| Some(x.zeros_like())))
///     .with_clear_contexts(true);
/// let out = root.run_with_hooks(input, opts)?;
/// ```
#[derive(Clone)]
pub struct RunOptions {
    /// Forward hooks, bound in order.
    pub fwd_hooks: Vec<(NameFilter, HookFn)>,
    /// Backward hooks, bound in order. Only useful with
    /// `reset_hooks_end = false`, since the pass itself is forward-only.
    pub bwd_hooks: Vec<(NameFilter, HookFn)>,
    /// Remove non-permanent hooks when the run ends. Defaults to `true`.
    pub reset_hooks_end: bool,
    /// Also clear hook contexts when resetting.
    pub clear_contexts: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fwd_hooks: Vec::new(),
            bwd_hooks: Vec::new(),
            reset_hooks_end: true,
            clear_contexts: false,
        }
    }
}

impl RunOptions {
    /// No hooks, reset at the end.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a forward hook.
    #[must_use]
    pub fn with_fwd_hook(mut self, target: impl Into<NameFilter>, hook: HookFn) -> Self {
        self.fwd_hooks.push((target.into(), hook));
        self
    }

    /// Adds a backward hook.
    #[must_use]
    pub fn with_bwd_hook(mut self, target: impl Into<NameFilter>, hook: HookFn) -> Self {
        self.bwd_hooks.push((target.into(), hook));
        self
    }

    /// Sets whether hooks are reset when the run ends.
    #[must_use]
    pub fn with_reset_hooks_end(mut self, reset_hooks_end: bool) -> Self {
        self.reset_hooks_end = reset_hooks_end;
        self
    }

    /// Sets whether contexts are cleared with the reset.
    #[must_use]
    pub fn with_clear_contexts(mut self, clear_contexts: bool) -> Self {
        self.clear_contexts = clear_contexts;
        self
    }

    /// Returns `true` if the run will discard backward hooks before any
    /// backward pass can use them.
    #[must_use]
    pub fn clears_backward_hooks(&self) -> bool {
        self.reset_hooks_end && !self.bwd_hooks.is_empty()
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field(
                "fwd_hooks",
                &self.fwd_hooks.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            )
            .field(
                "bwd_hooks",
                &self.bwd_hooks.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            )
            .field("reset_hooks_end", &self.reset_hooks_end)
            .field("clear_contexts", &self.clear_contexts)
            .finish()
    }
}

/// Capture and cleanup policy for [`HookedRoot::run_with_cache`].
#[derive(Debug, Clone)]
pub struct CacheRunOptions {
    /// What to capture.
    pub cache: CacheOptions,
    /// Reset all non-permanent hooks when the run ends. Defaults to `true`.
    pub reset_hooks_end: bool,
    /// Also clear hook contexts when resetting.
    pub clear_contexts: bool,
}

impl Default for CacheRunOptions {
    fn default() -> Self {
        Self {
            cache: CacheOptions::default(),
            reset_hooks_end: true,
            clear_contexts: false,
        }
    }
}

impl CacheRunOptions {
    /// Capture every forward activation, reset at the end.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the capture options.
    #[must_use]
    pub fn with_cache_options(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    /// Sets whether hooks are reset when the run ends.
    #[must_use]
    pub fn with_reset_hooks_end(mut self, reset_hooks_end: bool) -> Self {
        self.reset_hooks_end = reset_hooks_end;
        self
    }

    /// Sets whether contexts are cleared with the reset.
    #[must_use]
    pub fn with_clear_contexts(mut self, clear_contexts: bool) -> Self {
        self.clear_contexts = clear_contexts;
        self
    }
}

impl From<CacheOptions> for CacheRunOptions {
    fn from(cache: CacheOptions) -> Self {
        Self::new().with_cache_options(cache)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Warnings
// ─────────────────────────────────────────────────────────────────────────────

/// Backward hooks passed to a scoped run were removed before a backward pass
/// could use them.
///
/// Logged at `warn` level, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackwardHooksCleared {
    /// Number of backward hook entries that were supplied.
    pub count: usize,
}

impl fmt::Display for BackwardHooksCleared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} backward hook(s) were removed at the end of the run; \
             pass reset_hooks_end = false and reset manually after backward",
            self.count
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResetGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Resets the root's non-permanent hooks when dropped.
struct ResetGuard<'a, M: HookedModel> {
    root: &'a HookedRoot<M>,
    enabled: bool,
    clear_contexts: bool,
    warning: Option<BackwardHooksCleared>,
}

impl<M: HookedModel> Drop for ResetGuard<'_, M> {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self
            .root
            .reset_hooks(self.clear_contexts, Direction::Both, false)
        {
            tracing::warn!(error = %err, "failed to reset hooks after scoped run");
        }
        if let Some(warning) = self.warning {
            tracing::warn!(count = warning.count, "{warning}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scoped runs
// ─────────────────────────────────────────────────────────────────────────────

impl<M: HookedModel> HookedRoot<M> {
    /// Binds the given hooks, runs one forward pass, and resets.
    ///
    /// With `reset_hooks_end`, every non-permanent hook is removed when the
    /// run ends, whether the pass succeeded, failed or panicked. Hooks bound
    /// before a registration error are removed too.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`](crate::error::HookError::NotInitialized)
    /// before setup, registration errors (see [`add_hook`](Self::add_hook))
    /// and the model's own errors.
    pub fn run_with_hooks(&self, input: M::Input, options: RunOptions) -> Result<M::Output> {
        self.ensure_setup()?;

        let _span = tracing::debug_span!(
            "run_with_hooks",
            fwd_hooks = options.fwd_hooks.len(),
            bwd_hooks = options.bwd_hooks.len()
        )
        .entered();

        let warning = options.clears_backward_hooks().then(|| BackwardHooksCleared {
            count: options.bwd_hooks.len(),
        });
        let _guard = ResetGuard {
            root: self,
            enabled: options.reset_hooks_end,
            clear_contexts: options.clear_contexts,
            warning,
        };

        for (target, hook) in options.fwd_hooks {
            self.add_hook(target, hook, Direction::Forward, false)?;
        }
        for (target, hook) in options.bwd_hooks {
            self.add_hook(target, hook, Direction::Backward, false)?;
        }

        self.forward(input)
    }

    /// Caches activations (and gradients, with `incl_bwd`) over one pass.
    ///
    /// Runs the forward pass, then the backward pass from its output when
    /// gradients are requested. With `reset_hooks_end`, the reset at the end
    /// removes **every** non-permanent hook on the model, including ones
    /// bound before this call.
    ///
    /// # Errors
    ///
    /// [`HookError::NotInitialized`](crate::error::HookError::NotInitialized)
    /// before setup, then errors from
    /// [`add_caching_hooks`](Self::add_caching_hooks) and the passes.
    pub fn run_with_cache(
        &self,
        input: M::Input,
        options: impl Into<CacheRunOptions>,
    ) -> Result<(M::Output, ActivationCache)> {
        self.ensure_setup()?;

        let CacheRunOptions {
            cache: cache_options,
            reset_hooks_end,
            clear_contexts,
        } = options.into();
        let incl_bwd = cache_options.incl_bwd;

        let _span = tracing::debug_span!("run_with_cache", incl_bwd).entered();

        let _guard = ResetGuard {
            root: self,
            enabled: reset_hooks_end,
            clear_contexts,
            warning: None,
        };

        let cache = self.add_caching_hooks(cache_options)?;
        let output = self.forward(input)?;
        if incl_bwd {
            self.backward(&output)?;
        }

        Ok((output, cache))
    }
}
