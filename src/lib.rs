//! Named hook points and activation caching for model internals.
//!

pub use lens_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use lens_internal::prelude::*;
}
