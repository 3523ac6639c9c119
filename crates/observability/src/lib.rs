//! Process-wide logging setup for aqcast services and tools.

/// Initialize structured JSON logging with the default `info` filter.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init("info");
}

/// Tracing subscriber configuration.
pub mod tracing;
