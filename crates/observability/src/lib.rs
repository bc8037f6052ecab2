//! Tracing and logging setup shared by the binaries and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogOutput, init, init_with};
