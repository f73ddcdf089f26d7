//! Example interpretability session built with hooklens.
//!
//! Two small analyses over the reference model:
//!
//! - [`ablation_effects`] zero-ablates each block's output for one scoped run
//!   and reports how far the model's output moves.
//! - [`gradient_attribution`] caches activations and gradients in one pass
//!   and scores each hook point by `sum(activation * gradient)`.
//!
//! ```text
//! hook_embed ─▶ blocks.0 ─▶ blocks.1 ─▶ ... ─▶ hook_out ─▶ sum
//!                  │
//!                  ├─ hook_resid_pre
//!                  ├─ hook_scaled
//!                  └─ hook_resid_post   ◀── ablated / attributed
//! ```

use lens_graph::prelude::*;
use lens_graph::toy::ToyModel;

/// Output change caused by ablating one hook point.
#[derive(Debug, Clone, PartialEq)]
pub struct Ablation {
    /// Hook point that was zeroed.
    pub hook: String,
    /// Ablated output minus clean output.
    pub delta: f32,
}

/// Attribution score for one hook point.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Hook point name.
    pub hook: String,
    /// `sum(activation * gradient)` at the hook point.
    pub score: f32,
}

fn scalar(output: &Tensor) -> Result<f32> {
    output
        .item()
        .ok_or_else(|| HookError::model("expected a scalar output"))
}

/// Zero-ablates every `hook_resid_post` in turn.
///
/// # Errors
///
/// Propagates registry and model errors.
pub fn ablation_effects(root: &HookedRoot<ToyModel>, input: &Tensor) -> Result<Vec<Ablation>> {
    let clean = scalar(&root.forward(input.clone())?)?;

    let targets: Vec<String> = root
        .hook_names()?
        .filter(|name| name.ends_with("hook_resid_post"))
        .map(str::to_string)
        .collect();

    targets
        .into_iter()
        .map(|hook| {
            let options = RunOptions::new().with_fwd_hook(
                hook.as_str(),
                hook_fn(|x, _| Some(x.zeros_like())),
            );
            let ablated = scalar(&root.run_with_hooks(input.clone(), options)?)?;
            Ok(Ablation {
                hook,
                delta: ablated - clean,
            })
        })
        .collect()
}

/// Scores every hook point by activation times gradient.
///
/// # Errors
///
/// Propagates registry and model errors.
pub fn gradient_attribution(
    root: &HookedRoot<ToyModel>,
    input: &Tensor,
) -> Result<Vec<Attribution>> {
    let (_, cache) = root.run_with_cache(input.clone(), CacheOptions::new().with_backward(true))?;

    root.hook_names()?
        .map(|name| {
            let (Some(act), Some(grad)) = (cache.get(name), cache.grad(name)) else {
                return Err(HookError::model(format!("no capture for {name}")));
            };
            let score = act
                .to_vec()
                .iter()
                .zip(grad.to_vec())
                .map(|(a, g)| a * g)
                .sum::<f32>();
            Ok(Attribution {
                hook: name.to_string(),
                score,
            })
        })
        .collect()
}
