//! Tracing bootstrap.
//!
//! The gateway logs through `tracing`; hosts that want output call `init`
//! once at startup. Filtering follows `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber with env-based filtering. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
