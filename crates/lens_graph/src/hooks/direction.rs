//! Hook directions.
//!
//! A hook runs either on the value flowing forward through a hook point or on
//! the gradient flowing backward through it. Removal and reset operations
//! additionally accept [`Direction::Both`].

use core::fmt;
use core::str::FromStr;

use crate::error::{HookError, Result};

/// Which flow through a hook point an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Values flowing through normal execution (`"fwd"`).
    Forward,
    /// Gradients flowing through differentiation (`"bwd"`).
    Backward,
    /// Both lists. Only meaningful for removal and reset.
    Both,
}

impl Direction {
    /// Returns `true` if this selection covers the forward list.
    #[must_use]
    pub fn includes_forward(self) -> bool {
        matches!(self, Direction::Forward | Direction::Both)
    }

    /// Returns `true` if this selection covers the backward list.
    #[must_use]
    pub fn includes_backward(self) -> bool {
        matches!(self, Direction::Backward | Direction::Both)
    }

    /// Returns the short form used in logs and string parsing.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "fwd",
            Direction::Backward => "bwd",
            Direction::Both => "both",
        }
    }

    /// Rejects [`Direction::Both`] where a single list must be chosen.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidDirection`] for `Both`.
    pub fn require_single(self) -> Result<Self> {
        match self {
            Direction::Both => Err(HookError::InvalidDirection(self.as_str().to_string())),
            single => Ok(single),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fwd" | "forward" => Ok(Direction::Forward),
            "bwd" | "backward" => Ok(Direction::Backward),
            "both" => Ok(Direction::Both),
            other => Err(HookError::InvalidDirection(other.to_string())),
        }
    }
}
