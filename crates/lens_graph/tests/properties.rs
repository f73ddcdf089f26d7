//! Property-based tests for hook ordering, permanence, naming and caching.
//!
//! Each case builds a toy model with a random depth, registers a random
//! sequence of hooks, and checks the registry against a simple prediction:
//!
//! - hooks at one hook point fire in registration order
//! - a non-forced reset leaves exactly the permanent hooks
//! - names are unique and layer indices match the block position
//! - caching every activation records one entry per hook point

mod test_utils;

use lens_graph::prelude::{CacheOptions, Direction, grad_key, hook_fn};
use proptest::prelude::*;
use test_utils::{CallLog, batch, record_tag, toy_root};

/// One registration in a generated sequence.
#[derive(Debug, Clone)]
struct Registration {
    /// Resolved against the root's hook names.
    target: prop::sample::Index,
    direction: Direction,
    is_permanent: bool,
}

fn arb_registration() -> impl Strategy<Value = Registration> {
    (
        any::<prop::sample::Index>(),
        prop_oneof![Just(Direction::Forward), Just(Direction::Backward)],
        any::<bool>(),
    )
        .prop_map(|(target, direction, is_permanent)| Registration {
            target,
            direction,
            is_permanent,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Hooks on one point fire in the order they were registered.
    #[test]
    fn prop_registration_order_is_call_order(n_layers in 0..4usize, count in 1..12usize) {
        let root = toy_root(n_layers);
        let log = CallLog::default();
        for i in 0..count {
            root.add_hook("hook_out", record_tag(&log, &i.to_string()), Direction::Forward, false)
                .unwrap();
        }

        root.forward(batch(2)).unwrap();
        let expected: Vec<String> = (0..count).map(|i| i.to_string()).collect();
        prop_assert_eq!(log.entries(), expected);
    }

    /// A non-forced reset leaves exactly the permanent bindings.
    #[test]
    fn prop_reset_keeps_only_permanent(
        n_layers in 0..4usize,
        registrations in prop::collection::vec(arb_registration(), 0..24),
    ) {
        let root = toy_root(n_layers);
        let names: Vec<String> = root.hook_names().unwrap().map(str::to_string).collect();

        let mut permanent = 0;
        for reg in &registrations {
            let name = reg.target.get(&names);
            let hook = hook_fn(|_, _| None);
            root.add_hook(name, hook, reg.direction, reg.is_permanent).unwrap();
            permanent += usize::from(reg.is_permanent);
        }
        prop_assert_eq!(root.hook_count(Direction::Both).unwrap(), registrations.len());

        root.reset_hooks(true, Direction::Both, false).unwrap();
        prop_assert_eq!(root.hook_count(Direction::Both).unwrap(), permanent);

        root.reset_hooks(true, Direction::Both, true).unwrap();
        prop_assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
    }

    /// Setup yields unique names whose layer index matches the block.
    #[test]
    fn prop_names_unique_and_layered(n_layers in 0..8usize) {
        let root = toy_root(n_layers);
        let names: Vec<&str> = root.hook_names().unwrap().collect();
        prop_assert_eq!(names.len(), 2 + 3 * n_layers);

        let unique: std::collections::HashSet<_> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());

        for (layer, block) in root.model().blocks.iter().enumerate() {
            prop_assert_eq!(block.hook_resid_pre.layer().unwrap(), layer);
            prop_assert_eq!(block.hook_resid_post.layer().unwrap(), layer);
        }
    }

    /// Caching everything yields one entry per hook point, none with a
    /// gradient suffix unless requested.
    #[test]
    fn prop_cache_all_covers_every_point(
        n_layers in 0..4usize,
        width in 1..5usize,
        incl_bwd in any::<bool>(),
    ) {
        let root = toy_root(n_layers);
        let (_, cache) = root
            .run_with_cache(batch(width), CacheOptions::new().with_backward(incl_bwd))
            .unwrap();

        let n_points = root.hook_names().unwrap().count();
        let expected = if incl_bwd { 2 * n_points } else { n_points };
        prop_assert_eq!(cache.len(), expected);

        for name in root.hook_names().unwrap() {
            prop_assert!(cache.contains(name));
            prop_assert_eq!(cache.contains(&grad_key(name)), incl_bwd);
        }
        prop_assert_eq!(root.hook_count(Direction::Both).unwrap(), 0);
    }
}
