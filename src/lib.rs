//! pyslot - extension-type slot bridge for an embedded interpreter
//!
//! Rust closures registered as interpreter type slots (call, compare,
//! dealloc, init, repr, str, richcompare), and translation between the
//! interpreter's pending exception and Rust `Error` values. Interpreter
//! references are held through handles whose ownership is explicit and
//! whose lifetime is bounded by the interpreter lock.
//!
//! The interpreter is the bundled `pyslot-runtime` by default, or CPython
//! with the `python` feature.

pub mod class;
pub mod config;
pub mod err;
pub mod gil;
pub mod logging;
pub mod object;
pub mod sys;

pub use class::{Class, ClassBuilder, ClassContext, Slot, SlotKind};
pub use config::{BridgeConfig, ConfigError};
pub use err::{
    capture, clear, exception_raised, int_to_bool_err, int_to_err, obj_to_obj_err, raise_format,
    ssize_to_i64_err, Error, ExcKind, PyResult,
};
pub use gil::{with_gil, Gil};
pub use object::{Borrowed, CompareOp, Dict, Dying, Owned, Tuple};
pub use sys::BuiltinExc;

use crate::logging::info;

/// Initialize the bridge from `PYSLOT_CONFIG` and the environment
pub fn init() -> Result<(), ConfigError> {
    init_with_config(BridgeConfig::load()?);
    Ok(())
}

/// Install logging, activate `config` and start the interpreter backend
///
/// Logging is only installed by the first call.
pub fn init_with_config(config: BridgeConfig) {
    logging::init_with_config(config.log_config());
    config::set_current(config);
    gil::ensure_backend();
    info!(backend = if cfg!(feature = "python") { "cpython" } else { "runtime" }, "pyslot initialized");
}
