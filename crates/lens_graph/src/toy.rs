//! A small deterministic model for tests and demos.
//!
//! Each block computes `(x * scale) + bias` with three hook points around it:
//!
//! ```text
//! hook_embed
//! blocks.{i}.hook_resid_pre   x
//! blocks.{i}.hook_scaled      x * scale
//! blocks.{i}.hook_resid_post  x * scale + bias
//! hook_out
//! ```
//!
//! The output is the sum over every element, so the backward pass starts
//! from a gradient of ones shaped like the last input.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HookError, Result};
use crate::hook_point::HookPoint;
use crate::module::{HookedModel, Module, ModuleVisitor};
use crate::tensor::Tensor;

/// One `x * scale + bias` block.
#[derive(Debug)]
pub struct ToyBlock {
    /// Block input.
    pub hook_resid_pre: Arc<HookPoint>,
    /// After scaling.
    pub hook_scaled: Arc<HookPoint>,
    /// Block output.
    pub hook_resid_post: Arc<HookPoint>,
    scale: f32,
    bias: f32,
}

impl ToyBlock {
    /// Creates a block computing `x * scale + bias`.
    #[must_use]
    pub fn new(scale: f32, bias: f32) -> Self {
        Self {
            hook_resid_pre: HookPoint::shared(),
            hook_scaled: HookPoint::shared(),
            hook_resid_post: HookPoint::shared(),
            scale,
            bias,
        }
    }

    fn forward(&self, x: Tensor) -> Tensor {
        let x = self.hook_resid_pre.forward(x);
        let scaled = self.hook_scaled.forward(x.scale(self.scale));
        self.hook_resid_post.forward(scaled.add_scalar(self.bias))
    }

    fn backward(&self, grad: Tensor) -> Tensor {
        let grad = self.hook_resid_post.backward(grad);
        let grad = self.hook_scaled.backward(grad);
        self.hook_resid_pre.backward(grad.scale(self.scale))
    }
}

impl Module for ToyBlock {
    fn visit(&self, v: &mut ModuleVisitor<'_>) {
        v.hook_point("hook_resid_pre", &self.hook_resid_pre);
        v.hook_point("hook_scaled", &self.hook_scaled);
        v.hook_point("hook_resid_post", &self.hook_resid_post);
    }
}

/// A stack of [`ToyBlock`]s between an embedding and an output hook point.
#[derive(Debug)]
pub struct ToyModel {
    /// Model input.
    pub hook_embed: Arc<HookPoint>,
    /// The blocks, named `blocks.0`, `blocks.1`, ...
    pub blocks: Vec<ToyBlock>,
    /// Last activation before the sum.
    pub hook_out: Arc<HookPoint>,
    last_shape: Mutex<Option<Vec<usize>>>,
}

impl ToyModel {
    /// Creates `n_layers` blocks that each double and add one.
    #[must_use]
    pub fn new(n_layers: usize) -> Self {
        Self::from_blocks((0..n_layers).map(|_| ToyBlock::new(2.0, 1.0)).collect())
    }

    /// Creates a model from explicit blocks.
    #[must_use]
    pub fn from_blocks(blocks: Vec<ToyBlock>) -> Self {
        Self {
            hook_embed: HookPoint::shared(),
            blocks,
            hook_out: HookPoint::shared(),
            last_shape: Mutex::new(None),
        }
    }

    /// Number of blocks.
    #[must_use]
    pub fn n_layers(&self) -> usize {
        self.blocks.len()
    }
}

impl Module for ToyModel {
    fn visit(&self, v: &mut ModuleVisitor<'_>) {
        v.hook_point("hook_embed", &self.hook_embed);
        v.modules("blocks", &self.blocks);
        v.hook_point("hook_out", &self.hook_out);
    }
}

impl HookedModel for ToyModel {
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        if !input.is_finite() {
            return Err(HookError::model("input contains non-finite values"));
        }
        *self.last_shape.lock() = Some(input.shape().to_vec());

        let x = self
            .blocks
            .iter()
            .fold(self.hook_embed.forward(input), |x, block| block.forward(x));
        Ok(self.hook_out.forward(x).sum())
    }

    fn backward(&self, output: &Tensor) -> Result<()> {
        if output.ndim() != 0 {
            return Err(HookError::model("backward needs a scalar output"));
        }
        let shape = self
            .last_shape
            .lock()
            .clone()
            .ok_or_else(|| HookError::model("backward called before forward"))?;

        let grad = self.hook_out.backward(Tensor::ones(&shape));
        let grad = self
            .blocks
            .iter()
            .rev()
            .fold(grad, |grad, block| block.backward(grad));
        let _ = self.hook_embed.backward(grad);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HookedRoot;

    #[test]
    fn names_follow_structure() {
        let root = HookedRoot::build(ToyModel::new(2)).unwrap();
        assert_eq!(
            root.hook_names().unwrap().collect::<Vec<_>>(),
            [
                "hook_embed",
                "blocks.0.hook_resid_pre",
                "blocks.0.hook_scaled",
                "blocks.0.hook_resid_post",
                "blocks.1.hook_resid_pre",
                "blocks.1.hook_scaled",
                "blocks.1.hook_resid_post",
                "hook_out",
            ]
        );
        assert_eq!(
            root.module_names().unwrap().collect::<Vec<_>>(),
            ["blocks", "blocks.0", "blocks.1"]
        );
        assert_eq!(root.model().blocks[1].hook_scaled.layer().unwrap(), 1);
    }

    #[test]
    fn forward_value() {
        let model = ToyModel::new(2);
        // ((1 * 2 + 1) * 2 + 1) = 7 per element
        let out = model.forward(Tensor::ones(&[1, 4])).unwrap();
        assert_eq!(out.item(), Some(28.0));
    }

    #[test]
    fn rejects_non_finite_input() {
        let model = ToyModel::new(1);
        let err = model.forward(Tensor::full(&[2], f32::NAN)).unwrap_err();
        assert!(matches!(err, HookError::Model(_)));
    }

    #[test]
    fn backward_requires_forward() {
        let model = ToyModel::new(1);
        assert!(model.backward(&Tensor::scalar(0.0)).is_err());
    }
}
