//! Activation values flowing through hook points.
//!
//! [`Tensor`] is a thin wrapper around a shared, dynamically-ranked
//! `ndarray` buffer. It carries a [`Device`] tag and a `requires_grad` flag so
//! that caching hooks can express "detach and relocate" without knowing
//! anything about the engine that produced the value. Device placement is a
//! pass-through label: moving a tensor retags it, it never copies memory
//! between accelerators.

use core::fmt;

use ndarray::{ArcArray, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Placement tag for a [`Tensor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Host memory.
    #[default]
    Cpu,
    /// An accelerator, identified by ordinal.
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// A dense `f32` tensor of any rank.
///
/// Cloning is cheap: the underlying buffer is reference counted and only
/// copied on write.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArcArray<f32, IxDyn>,
    device: Device,
    requires_grad: bool,
}

impl Tensor {
    /// Wraps an existing array as a CPU tensor that does not track gradients.
    #[must_use]
    pub fn new(data: ArcArray<f32, IxDyn>) -> Self {
        Self {
            data,
            device: Device::Cpu,
            requires_grad: false,
        }
    }

    /// Builds a tensor from a flat buffer in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Shape`](crate::error::HookError::Shape) if
    /// `data.len()` does not match the product of `shape`.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        Ok(Self::new(ArcArray::from_shape_vec(IxDyn(shape), data)?))
    }

    /// A tensor of the given shape filled with `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self::new(ArcArray::from_elem(IxDyn(shape), value))
    }

    /// A tensor of zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// A tensor of ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// A rank-0 tensor.
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self::full(&[], value)
    }

    /// Marks whether this tensor participates in gradient tracking.
    #[must_use]
    pub fn with_requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the rank.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Returns the device tag.
    #[must_use]
    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns whether this tensor tracks gradients.
    #[must_use]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Borrows the underlying array.
    #[must_use]
    pub fn data(&self) -> &ArcArray<f32, IxDyn> {
        &self.data
    }

    /// Copies the elements out in row-major order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Returns the single element of a one-element tensor.
    #[must_use]
    pub fn item(&self) -> Option<f32> {
        if self.data.len() == 1 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    /// Returns a copy that no longer tracks gradients.
    #[must_use]
    pub fn detach(&self) -> Self {
        Self {
            data: self.data.clone(),
            device: self.device,
            requires_grad: false,
        }
    }

    /// Returns a copy tagged with `device`.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            data: self.data.clone(),
            device,
            requires_grad: self.requires_grad,
        }
    }

    /// Drops the leading axis when it has extent 1.
    ///
    /// Tensors whose leading axis is longer than 1, and rank-0 tensors, are
    /// returned unchanged.
    #[must_use]
    pub fn remove_batch_dim(&self) -> Self {
        if self.shape().first() != Some(&1) {
            return self.clone();
        }
        Self {
            data: self.data.clone().index_axis_move(Axis(0), 0),
            device: self.device,
            requires_grad: self.requires_grad,
        }
    }

    /// Applies `f` element-wise.
    #[must_use]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.map(|&x| f(x)).into_shared(),
            device: self.device,
            requires_grad: self.requires_grad,
        }
    }

    /// Multiplies every element by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        self.map(|x| x * factor)
    }

    /// Adds `offset` to every element.
    #[must_use]
    pub fn add_scalar(&self, offset: f32) -> Self {
        self.map(|x| x + offset)
    }

    /// A tensor of zeros with this tensor's shape, device and grad flag.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        self.map(|_| 0.0)
    }

    /// A tensor of ones with this tensor's shape, device and grad flag.
    #[must_use]
    pub fn ones_like(&self) -> Self {
        self.map(|_| 1.0)
    }

    /// Sums all elements into a rank-0 tensor.
    #[must_use]
    pub fn sum(&self) -> Self {
        Self {
            data: ArcArray::from_elem(IxDyn(&[]), self.data.sum()),
            device: self.device,
            requires_grad: self.requires_grad,
        }
    }

    /// Returns `true` if every element is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}
