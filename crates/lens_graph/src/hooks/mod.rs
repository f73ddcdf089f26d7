//! Hook functions, directions and binding handles.
//!
//! Hooks are plain closures bound to a [`HookPoint`](crate::hook_point::HookPoint).
//! They run inline, in registration order, whenever a value (forward) or a
//! gradient (backward) passes through the point.
//!
//! # Design Principles
//!
//! - Hooks execute in registration order
//! - A hook may replace the flowing value by returning `Some`
//! - Bindings persist until removed; prefer the scoped runners on
//!   [`HookedRoot`](crate::registry::HookedRoot) over manual registration
//!
//! # Example
//!
//! ```ignore
//! use lens_graph::hooks::{Direction, hook_fn};
//!
//! // Zero-ablate every attention pattern, then run once.
//! let ablate = hook_fn(|act, _hook| Some(act.zeros_like()));
//! root.add_hook(NameFilter::predicate(|n| n.ends_with("hook_pattern")), ablate, Direction::Forward, false)?;
//! let out = root.forward(input)?;
//! root.reset_hooks(true, Direction::Both, false)?;
//! ```

pub mod binding;
pub mod direction;

pub use binding::{HookFn, HookHandle, HookId, hook_fn};
pub use direction::Direction;
