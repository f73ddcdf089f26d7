//! Hook points and activation caching for instrumented models.
//!
//! `lens_graph` lets callers observe and rewrite the values flowing through a
//! model's forward and backward passes without changing the model's code.
//! Models place named [`HookPoint`]s at the values of interest; a
//! [`HookedRoot`] discovers and names them, binds callbacks to them, and
//! captures their values into an [`ActivationCache`].
//!
//! # Core Concepts
//!
//! - [`HookPoint`] - Identity pass-through that runs its bound hooks in order
//! - [`HookedModel`] - A model whose passes run through hook points
//! - [`HookedRoot`] - Owner of a model's hook registry and caching state
//! - [`NameFilter`] - Selects hook points by exact name, set or predicate
//! - [`ActivationCache`] - Name-keyed captures, gradients under `name_grad`
//!
//! # Example
//!
//! ```ignore
//! use lens_graph::prelude::*;
//!
//! let root = HookedRoot::build(model)?;
//!
//! // Ablate the first block's residual input for one pass.
//! let ablated = root.run_with_hooks(
//!     tokens.clone(),
//!     RunOptions::new().with_fwd_hook(
//!         "blocks.0.hook_resid_pre",
//!         hook_fn(|x, _| Some(x.zeros_like())),
//!     ),
//! )?;
//!
//! // Capture every activation and gradient of a clean pass.
//! let (out, cache) = root.run_with_cache(tokens, CacheOptions::new().with_backward(true))?;
//! let grad = cache.grad("blocks.0.hook_resid_pre");
//! ```

/// Activation caches and caching options.
pub mod cache;

/// Model-level configuration.
pub mod config;

/// Per-hook-point scratch storage.
pub mod context;

/// Error types.
pub mod error;

/// Name filters for selecting hook points.
pub mod filter;

/// The hook point primitive.
pub mod hook_point;

/// Hook callbacks, bindings, handles and directions.
pub mod hooks;

/// The model interface and structure traversal.
pub mod module;

/// Structured hook point names.
pub mod name;

/// The hook registry.
pub mod registry;

/// Scoped runs that reset their hooks.
pub mod runner;

/// Value type flowing through hook points.
pub mod tensor;

/// Reference model for tests and demos.
#[cfg(any(test, feature = "toy"))]
pub mod toy;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::cache::{ActivationCache, CacheOptions, GRAD_SUFFIX, grad_key};
    pub use crate::config::HookedConfig;
    pub use crate::context::HookContext;
    pub use crate::error::{HookError, Result};
    pub use crate::filter::{NameFilter, NamePredicate};
    pub use crate::hook_point::HookPoint;
    pub use crate::hooks::{Direction, HookFn, HookHandle, HookId, hook_fn};
    pub use crate::module::{HookedModel, Module, ModuleVisitor};
    pub use crate::name::HookName;
    pub use crate::registry::HookedRoot;
    pub use crate::runner::{BackwardHooksCleared, CacheRunOptions, RunOptions};
    pub use crate::tensor::{Device, Tensor};
}

// Re-export key types at crate root for convenience
pub use cache::ActivationCache;
pub use error::HookError;
pub use filter::NameFilter;
pub use hook_point::HookPoint;
pub use module::HookedModel;
pub use registry::HookedRoot;
