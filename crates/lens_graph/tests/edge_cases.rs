//! Edge case tests for the hook registry.
//!
//! Covers setup failures, invalid targets, cleanup after errors and panics,
//! hooks that mutate bindings while running, and the deprecated caching
//! helpers.

mod test_utils;

use lens_graph::prelude::*;
use lens_graph::toy::ToyModel;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use test_utils::{CallLog, batch, panicking, record_names, record_tag, toy_root, zero};

// ═══════════════════════════════════════════════════════════════════════════════
// SETUP FAILURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Two hook points registered under one name.
struct Colliding {
    first: Arc<HookPoint>,
    second: Arc<HookPoint>,
}

impl Module for Colliding {
    fn visit(&self, v: &mut ModuleVisitor<'_>) {
        v.hook_point("hook_x", &self.first);
        v.hook_point("hook_x", &self.second);
    }
}

impl HookedModel for Colliding {
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        Ok(self.second.forward(self.first.forward(input)))
    }
}

/// One hook point reachable under two names.
struct Aliased {
    point: Arc<HookPoint>,
}

impl Module for Aliased {
    fn visit(&self, v: &mut ModuleVisitor<'_>) {
        v.hook_point("hook_a", &self.point);
        v.hook_point("hook_b", &self.point);
    }
}

impl HookedModel for Aliased {
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        Ok(self.point.forward(input))
    }
}

/// A model with the default, unsupported backward pass.
struct ForwardOnly(Arc<HookPoint>);

impl Module for ForwardOnly {
    fn visit(&self, v: &mut ModuleVisitor<'_>) {
        v.hook_point("hook_x", &self.0);
    }
}

impl HookedModel for ForwardOnly {
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        Ok(self.0.forward(input))
    }
}

#[test]
fn duplicate_names_fail_setup() {
    let mut root = HookedRoot::new(Colliding {
        first: HookPoint::shared(),
        second: HookPoint::shared(),
    });
    let err = root.setup().unwrap_err();
    assert!(matches!(err, HookError::DuplicateName(name) if name == "hook_x"));
    assert!(!root.is_setup());
    assert!(root.model().first.name().is_none(), "nothing is named on failure");
}

#[test]
fn aliased_hook_point_fails_setup() {
    let mut root = HookedRoot::new(Aliased {
        point: HookPoint::shared(),
    });
    let err = root.setup().unwrap_err();
    assert!(matches!(err, HookError::AlreadyNamed { .. }));
}

#[test]
fn unset_root_rejects_everything() {
    let root = HookedRoot::new(ToyModel::new(1));
    assert!(matches!(root.hook_point("hook_embed"), Err(HookError::NotInitialized)));
    assert!(matches!(
        root.run_with_hooks(batch(1), RunOptions::new()),
        Err(HookError::NotInitialized)
    ));
    assert!(matches!(
        root.run_with_cache(batch(1), CacheOptions::new()),
        Err(HookError::NotInitialized)
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVALID TARGETS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_exact_name() {
    let root = toy_root(1);
    let err = root
        .add_hook("blocks.0.hook_nope", zero(), Direction::Forward, false)
        .unwrap_err();
    assert!(matches!(err, HookError::UnknownNode(name) if name == "blocks.0.hook_nope"));
}

#[test]
fn module_names_are_not_hookable() {
    let root = toy_root(1);
    assert!(root.module_names().unwrap().any(|m| m == "blocks.0"));
    assert!(matches!(
        root.add_hook("blocks.0", zero(), Direction::Forward, false),
        Err(HookError::UnknownNode(_))
    ));
}

#[test]
fn unknown_exact_name_in_cache_filter_caches_nothing() {
    let root = toy_root(1);
    let (out, cache) = root
        .run_with_cache(batch(1), CacheOptions::new().with_names_filter("hook_missing"))
        .unwrap();
    assert_eq!(out, root.forward(batch(1)).unwrap());
    assert!(cache.is_empty());
    assert!(!root.is_caching());
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
}

#[test]
fn both_is_not_a_registration_direction() {
    let root = toy_root(1);
    assert!(matches!(
        root.add_hook("hook_embed", zero(), Direction::Both, false),
        Err(HookError::InvalidDirection(_))
    ));
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
}

#[test]
fn direction_strings() {
    assert_eq!("fwd".parse::<Direction>().unwrap(), Direction::Forward);
    assert_eq!("bwd".parse::<Direction>().unwrap(), Direction::Backward);
    assert_eq!("both".parse::<Direction>().unwrap(), Direction::Both);
    assert!(matches!(
        "sideways".parse::<Direction>(),
        Err(HookError::InvalidDirection(_))
    ));
}

#[test]
fn empty_name_set_matches_nothing() {
    let root = toy_root(1);
    let handles = root
        .add_hook(Vec::<String>::new(), zero(), Direction::Forward, false)
        .unwrap();
    assert!(handles.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLEANUP ON FAILURE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn scoped_run_resets_after_model_error() {
    let root = toy_root(1);
    let err = root
        .run_with_hooks(
            Tensor::full(&[1, 2], f32::INFINITY),
            RunOptions::new().with_fwd_hook(NameFilter::All, zero()),
        )
        .unwrap_err();
    assert!(matches!(err, HookError::Model(_)));
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
}

#[test]
fn scoped_run_resets_after_panic() {
    let root = toy_root(1);
    let log = CallLog::default();
    root.add_perma_hook("hook_embed", record_tag(&log, "perma"), Direction::Forward)
        .unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        root.run_with_hooks(
            batch(1),
            RunOptions::new().with_fwd_hook("blocks.0.hook_scaled", panicking()),
        )
    }));
    assert!(result.is_err());
    assert_eq!(root.hook_count(Direction::Forward).unwrap(), 1);
    assert_eq!(
        root.hook_point("hook_embed")
            .unwrap()
            .permanent_hook_count(Direction::Forward),
        1
    );
}

#[test]
fn cache_run_resets_after_backward_error() {
    let root = HookedRoot::build(ForwardOnly(HookPoint::shared())).unwrap();
    let err = root
        .run_with_cache(batch(1), CacheOptions::new().with_backward(true))
        .unwrap_err();
    assert!(matches!(err, HookError::BackwardUnsupported));
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
    assert!(!root.is_caching());
}

#[test]
fn cache_run_removes_preexisting_hooks() {
    let root = toy_root(1);
    root.add_hook("hook_out", zero(), Direction::Forward, false)
        .unwrap();

    let (out, _) = root.run_with_cache(batch(1), CacheOptions::new()).unwrap();
    assert_eq!(out.item(), Some(0.0), "pre-existing hook still applies during the run");
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
}

#[test]
fn reset_is_idempotent() {
    let root = toy_root(1);
    root.add_hook(NameFilter::All, zero(), Direction::Forward, false)
        .unwrap();
    root.reset_hooks(true, Direction::Both, false).unwrap();
    root.reset_hooks(true, Direction::Both, false).unwrap();
    assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
}

#[test]
fn reset_by_direction() {
    let root = toy_root(1);
    root.add_hook("hook_out", zero(), Direction::Forward, false)
        .unwrap();
    root.add_hook("hook_out", zero(), Direction::Backward, false)
        .unwrap();

    root.reset_hooks(false, Direction::Forward, false).unwrap();
    assert_eq!(root.hook_count(Direction::Forward).unwrap(), 0);
    assert_eq!(root.hook_count(Direction::Backward).unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOOKS THAT MUTATE BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn hook_added_downstream_applies_same_pass() {
    let root = toy_root(1);
    let log = CallLog::default();
    let recorder = record_names(&log);
    let out_point = Arc::clone(root.hook_point("hook_out").unwrap());

    root.add_hook(
        "hook_embed",
        hook_fn(move |_, _| {
            let _ = out_point.add_hook(Arc::clone(&recorder), Direction::Forward, false);
            None
        }),
        Direction::Forward,
        false,
    )
    .unwrap();

    root.forward(batch(1)).unwrap();
    assert_eq!(log.entries(), ["hook_out"]);
}

#[test]
fn hook_added_on_own_point_applies_next_pass() {
    let root = toy_root(1);
    let log = CallLog::default();
    let recorder = record_tag(&log, "late");
    let point = Arc::clone(root.hook_point("hook_out").unwrap());

    let own = Arc::clone(&point);
    root.add_hook(
        "hook_out",
        hook_fn(move |_, _| {
            if own.hook_count(Direction::Forward) == 1 {
                let _ = own.add_hook(Arc::clone(&recorder), Direction::Forward, false);
            }
            None
        }),
        Direction::Forward,
        false,
    )
    .unwrap();

    root.forward(batch(1)).unwrap();
    assert!(log.is_empty());
    root.forward(batch(1)).unwrap();
    assert_eq!(log.entries(), ["late"]);
    assert_eq!(point.hook_count(Direction::Forward), 2);
}

#[test]
fn hook_removing_all_bindings_mid_pass() {
    let root = toy_root(1);
    let log = CallLog::default();
    let point = Arc::clone(root.hook_point("hook_out").unwrap());

    let remover = Arc::clone(&point);
    root.add_hook(
        "hook_out",
        hook_fn(move |_, _| {
            let _ = remover.remove_hooks(Direction::Forward, false);
            None
        }),
        Direction::Forward,
        false,
    )
    .unwrap();
    root.add_hook("hook_out", record_tag(&log, "second"), Direction::Forward, false)
        .unwrap();

    root.forward(batch(1)).unwrap();
    assert_eq!(log.entries(), ["second"], "snapshot still runs this pass");
    root.forward(batch(1)).unwrap();
    assert_eq!(log.len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPRECATED HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
#[expect(deprecated, reason = "exercises the deprecated caching helpers")]
fn deprecated_caching_helpers() {
    let root = toy_root(1);

    let all = root
        .cache_all(ActivationCache::new(), false, None, false)
        .unwrap();
    let some = root
        .cache_some(ActivationCache::new(), "hook_out", true, None, false)
        .unwrap();
    assert!(root.is_caching());

    let out = root.forward(batch(1)).unwrap();
    root.backward(&out).unwrap();

    assert_eq!(all.len(), 5);
    assert_eq!(some.keys(), ["hook_out", "hook_out_grad"]);
    root.reset_hooks(true, Direction::Both, false).unwrap();
}
