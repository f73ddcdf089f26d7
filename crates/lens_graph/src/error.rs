//! Error types for hook registration and instrumented execution.

use thiserror::Error;

/// Errors that can occur while binding hooks or running an instrumented model.
#[derive(Debug, Error)]
pub enum HookError {
    /// A direction argument was outside the accepted set.
    #[error("invalid direction '{0}': expected one of fwd, bwd, both")]
    InvalidDirection(String),

    /// An exact-name target does not name a hook point in the registry.
    #[error("unknown hook point: {0}")]
    UnknownNode(String),

    /// A hook operation was attempted before `setup()` ran.
    #[error("hook registry is not initialized: call setup() first")]
    NotInitialized,

    /// `setup()` was called on a registry that is already set up.
    #[error("hook registry is already initialized")]
    AlreadyInitialized,

    /// Two hook points resolved to the same structured name.
    #[error("duplicate hook point name: {0}")]
    DuplicateName(String),

    /// A hook point reachable from two positions in the module tree.
    #[error("hook point '{existing}' cannot also be named '{requested}'")]
    AlreadyNamed {
        /// The name assigned first.
        existing: String,
        /// The name a second traversal path tried to assign.
        requested: String,
    },

    /// A structured name could not be resolved to a layer index.
    #[error("malformed hook name '{0}': expected '<prefix>.<layer>.<rest>'")]
    MalformedName(String),

    /// The model vetoed a hook binding.
    #[error("hook rejected on '{name}': {reason}")]
    Rejected {
        /// The hook point the binding was meant for.
        name: String,
        /// Why the model refused it.
        reason: String,
    },

    /// The wrapped model does not implement a backward pass.
    #[error("model does not support a backward pass")]
    BackwardUnsupported,

    /// The wrapped model failed during a forward or backward pass.
    #[error("model error: {0}")]
    Model(String),

    /// A tensor could not be built with the requested shape.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl HookError {
    /// Creates a [`Model`](Self::Model) error.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Creates a [`Rejected`](Self::Rejected) error.
    pub fn rejected(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = HookError> = core::result::Result<T, E>;
