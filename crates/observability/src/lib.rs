//! Process-wide logging setup.

/// Tracing subscriber configuration.
pub mod tracing;

/// Install the storefront's log subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}
