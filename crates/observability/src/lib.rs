//! Shared tracing/logging setup for the API binary and tests.

/// Initialize process-wide observability (tracing/logging).
///
/// Calling this more than once is harmless; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
