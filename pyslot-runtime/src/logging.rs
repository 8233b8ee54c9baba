//! Logging utilities for the pyslot runtime
//!
//! Uses `tracing` for structured logging; the runtime only emits events; the
//! embedding host decides where they go.

pub use tracing::{debug, error, info, trace, warn, Level};

/// Default directive when `RUST_LOG` is unset
const DEFAULT_DIRECTIVE: &str = if cfg!(debug_assertions) {
    "pyslot_runtime=debug"
} else {
    "pyslot_runtime=info"
};

/// Install a compact stderr subscriber for standalone use
///
/// Hosts that install their own subscriber never call this; benches and
/// standalone tests do. A second call is a no-op.
pub fn init_runtime_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = fmt().with_env_filter(filter).compact().with_writer(std::io::stderr).try_init();
}

/// Log an object destruction
#[inline]
pub fn log_destroy(type_name: &str, ptr: *const u8) {
    trace!(
        target: "pyslot_runtime::object",
        type_name,
        address = ?ptr,
        "object destroyed"
    );
}

/// Log an exception becoming pending
#[inline]
pub fn log_exception_set(type_name: &str, replaced: bool) {
    trace!(
        target: "pyslot_runtime::errors",
        type_name,
        replaced,
        "exception set"
    );
}
