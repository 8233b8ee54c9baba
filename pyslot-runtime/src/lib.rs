//! pyslot runtime - minimal reference-counted interpreter heap
//!
//! This crate provides the interpreter side of the slot bridge: heap objects
//! with a C-compatible header, type objects carrying slot tables, a single
//! pending-exception slot and the interpreter lock. It evaluates no code;
//! hosts drive it through the C ABI exported from each module.

pub mod builtins;
pub mod errors;
pub mod exceptions;
pub mod gil;
pub mod logging;
pub mod object;

pub use errors::{
    pyrt_err_clear, pyrt_err_exception_matches, pyrt_err_fetch, pyrt_err_occurred,
    pyrt_err_restore, pyrt_err_set_string,
};
pub use gil::{pyrt_gil_check, pyrt_gil_ensure, pyrt_gil_release};
pub use object::{PyObject, PyTypeObject, TypeSlots};

use once_cell::sync::OnceCell;
use crate::logging::{debug, info};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Runtime initialization
///
/// Materializes the static type objects and singletons up front so the
/// first slot call does not pay for it. Safe to call more than once.
#[no_mangle]
pub extern "C" fn pyrt_initialize() {
    INITIALIZED.get_or_init(|| {
        info!("pyslot runtime initializing");
        object::type_type();
        builtins::init();
        exceptions::init();
        debug!("runtime ready");
    });
}

/// Whether `pyrt_initialize` has run
#[no_mangle]
pub extern "C" fn pyrt_is_initialized() -> bool {
    INITIALIZED.get().is_some()
}
