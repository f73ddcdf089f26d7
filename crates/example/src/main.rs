//! Example hooklens CLI.
//!
//! Builds the reference model, then reports block ablations and gradient
//! attributions through `tracing`.
//!
//! # Usage
//!
//! ```bash
//! lens-demo [n_layers] [config.json]
//! ```
//!
//! Set `RUST_LOG`-style directives with `LENS_LOG`, e.g.
//! `LENS_LOG=lens_graph=debug` to see every hook registration.

use example::{ablation_effects, gradient_attribution};
use lens_core::{TracingFormat, TracingSetup, load_config};
use lens_graph::config::HookedConfig;
use lens_graph::registry::HookedRoot;
use lens_graph::tensor::Tensor;
use lens_graph::toy::ToyModel;

fn main() {
    let mut setup = TracingSetup::new().with_format(TracingFormat::Compact);
    if let Ok(filter) = std::env::var("LENS_LOG") {
        setup = setup.with_env_filter(filter);
    }
    setup.init();

    let args: Vec<String> = std::env::args().collect();
    let n_layers = match args.get(1).map(|arg| arg.parse::<usize>()) {
        None => 3,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("Error: n_layers must be a number: {e}");
            std::process::exit(1);
        }
    };
    let config = match args.get(2) {
        Some(path) => load_config(path).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }),
        None => HookedConfig::default(),
    };

    let mut root = HookedRoot::with_config(ToyModel::new(n_layers), config);
    if let Err(e) = root.setup() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let input = Tensor::ones(&[1, 4]);

    match ablation_effects(&root, &input) {
        Ok(effects) => {
            for effect in effects {
                tracing::info!(hook = %effect.hook, delta = effect.delta, "ablation");
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }

    match gradient_attribution(&root, &input) {
        Ok(scores) => {
            for score in scores {
                tracing::info!(hook = %score.hook, score = score.score, "attribution");
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}
