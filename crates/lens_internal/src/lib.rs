//! # hooklens internal library
//!
//! Re-exports the hooklens crates for convenience.

/// Hook points, registries, scoped runs and activation caches.
pub use lens_graph;

/// Logging setup and configuration loading.
pub use lens_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use lens_core::{TracingFormat, TracingSetup, load_config};
    pub use lens_graph::prelude::*;
}
