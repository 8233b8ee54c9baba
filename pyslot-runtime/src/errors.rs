//! Exception state - the single pending-exception slot
//!
//! Design: one process-wide slot holding (type, value, traceback):
//! 1. Setting an exception replaces whatever was pending
//! 2. Fetch transfers all three references to the caller and clears the slot
//! 3. References displaced from the slot are released after the state lock
//!    is dropped, so destructors may touch the exception state themselves

use core::ffi::{c_char, c_int};
use core::ptr;
use std::ffi::CStr;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::builtins::new_str;
use crate::logging::log_exception_set;
use crate::object::{pyrt_decref, pyrt_incref, pyrt_type_is_subtype, type_name, PyObject, PyTypeObject};

struct ErrState {
    kind: *mut PyObject,
    value: *mut PyObject,
    traceback: *mut PyObject,
}

// Only touched under the interpreter lock; the mutex keeps the slot coherent
unsafe impl Send for ErrState {}

impl ErrState {
    const fn empty() -> Self {
        Self {
            kind: ptr::null_mut(),
            value: ptr::null_mut(),
            traceback: ptr::null_mut(),
        }
    }

    unsafe fn release(self) {
        pyrt_decref(self.kind);
        pyrt_decref(self.value);
        pyrt_decref(self.traceback);
    }
}

static ERR_STATE: Lazy<Mutex<ErrState>> = Lazy::new(|| Mutex::new(ErrState::empty()));

#[inline]
fn swap_state(new: ErrState) -> ErrState {
    core::mem::replace(&mut *ERR_STATE.lock(), new)
}

/// Borrowed type of the pending exception, or null
#[no_mangle]
pub extern "C" fn pyrt_err_occurred() -> *mut PyObject {
    ERR_STATE.lock().kind
}

/// Make (kind, value, traceback) the pending exception, stealing all three
///
/// A null `kind` clears the slot (and releases `value` and `traceback`).
///
/// # Safety
/// - each pointer must be null or an owned reference
#[no_mangle]
pub unsafe extern "C" fn pyrt_err_restore(
    kind: *mut PyObject,
    value: *mut PyObject,
    traceback: *mut PyObject,
) {
    if kind.is_null() {
        pyrt_decref(value);
        pyrt_decref(traceback);
        pyrt_err_clear();
        return;
    }

    let old = swap_state(ErrState { kind, value, traceback });
    log_exception_set(type_name(kind as *mut PyTypeObject), !old.kind.is_null());
    old.release();
}

/// Move the pending exception into the out pointers and clear the slot
///
/// Each out pointer receives an owned reference (or null). Passing a null
/// out pointer discards that component.
///
/// # Safety
/// - out pointers must be null or writable
#[no_mangle]
pub unsafe extern "C" fn pyrt_err_fetch(
    kind: *mut *mut PyObject,
    value: *mut *mut PyObject,
    traceback: *mut *mut PyObject,
) {
    let state = swap_state(ErrState::empty());

    for (out, obj) in [(kind, state.kind), (value, state.value), (traceback, state.traceback)] {
        if out.is_null() {
            pyrt_decref(obj);
        } else {
            *out = obj;
        }
    }
}

/// Set the pending exception to `kind` with a string message
///
/// # Safety
/// - `kind` must be a valid exception class
/// - `msg` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn pyrt_err_set_string(kind: *mut PyObject, msg: *const c_char) {
    let text = if msg.is_null() {
        String::new()
    } else {
        CStr::from_ptr(msg).to_string_lossy().into_owned()
    };
    set_error(kind, &text);
}

/// Clear the pending exception, releasing its references
#[no_mangle]
pub extern "C" fn pyrt_err_clear() {
    let old = swap_state(ErrState::empty());
    unsafe { old.release() };
}

/// Whether the pending exception is `exc` or a subclass of it
///
/// # Safety
/// - `exc` must be a valid exception class
#[no_mangle]
pub unsafe extern "C" fn pyrt_err_exception_matches(exc: *mut PyObject) -> c_int {
    let kind = pyrt_err_occurred();
    if kind.is_null() || exc.is_null() {
        return 0;
    }
    pyrt_type_is_subtype(kind as *mut PyTypeObject, exc as *mut PyTypeObject) as c_int
}

/// Set the pending exception from Rust (internal helper)
///
/// # Safety
/// - `kind` must be a valid exception class
pub(crate) unsafe fn set_error(kind: *mut PyObject, msg: &str) {
    pyrt_incref(kind);
    pyrt_err_restore(kind, new_str(msg), ptr::null_mut());
}
