//! Shared test utilities for `lens_graph` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use lens_graph::hooks::{HookFn, hook_fn};
use lens_graph::registry::HookedRoot;
use lens_graph::tensor::Tensor;
use lens_graph::toy::ToyModel;
use std::sync::{Arc, Mutex};

// ═══════════════════════════════════════════════════════════════════════════════
// MODEL SETUP
// ═══════════════════════════════════════════════════════════════════════════════

/// A set-up root over a toy model with `n_layers` blocks.
pub fn toy_root(n_layers: usize) -> HookedRoot<ToyModel> {
    HookedRoot::build(ToyModel::new(n_layers)).expect("toy model setup")
}

/// A `[1, width]` batch of ones.
pub fn batch(width: usize) -> Tensor {
    Tensor::ones(&[1, width])
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDING HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared log of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A hook that records the hook point's name and leaves the value alone.
pub fn record_names(log: &CallLog) -> HookFn {
    let log = log.clone();
    hook_fn(move |_, hook| {
        log.push(hook.name().map(ToString::to_string).unwrap_or_default());
        None
    })
}

/// A hook that records `tag` and leaves the value alone.
pub fn record_tag(log: &CallLog, tag: &str) -> HookFn {
    let log = log.clone();
    let tag = tag.to_string();
    hook_fn(move |_, _| {
        log.push(tag.clone());
        None
    })
}

/// A hook that adds `offset` to every element.
pub fn add(offset: f32) -> HookFn {
    hook_fn(move |x, _| Some(x.add_scalar(offset)))
}

/// A hook that replaces the value with zeros.
pub fn zero() -> HookFn {
    hook_fn(|x, _| Some(x.zeros_like()))
}

/// A hook that panics when invoked.
pub fn panicking() -> HookFn {
    hook_fn(|_, _| panic!("hook panicked"))
}
