//! Integration test infrastructure for switch sessions and flat batches
//!
//! Provides:
//! - Builders for flat batch items and entity payloads
//! - A recording fake of the single-item entity RPCs
//! - A loopback device answering a real session's requests
//! - Verification helpers for batch results

pub mod fixtures;
mod loopback;
mod recording;
mod verification;

pub use fixtures::*;
pub use loopback::{LoopbackBehavior, LoopbackDevice};
pub use recording::{RecordingRpcs, RpcCall};
pub use verification::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        // another harness may already have installed one
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
