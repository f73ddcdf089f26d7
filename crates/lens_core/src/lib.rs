//! Infrastructure shared by hooklens binaries and tests.
//!
//! - [`logging`] installs a `tracing` subscriber.
//! - [`config`] loads a [`HookedConfig`](lens_graph::config::HookedConfig)
//!   from JSON.

/// Configuration loading.
pub mod config;

/// Tracing subscriber setup.
pub mod logging;

pub use config::{ConfigError, load_config, parse_config};
pub use logging::{TracingFormat, TracingSetup};
