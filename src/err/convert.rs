//! Conversions from C-convention results to `PyResult`
//!
//! The interpreter signals failure with a negative integer or a null
//! pointer and leaves the exception pending. These helpers turn such
//! results into `Err` by capturing that exception.

use core::ffi::c_int;

use super::{capture, Error, PyResult};
use crate::gil::Gil;
use crate::object::Owned;
use crate::sys::PyObject;

/// Status code: `Err` when negative and an exception is pending
///
/// A negative code with nothing pending is treated as success.
pub fn int_to_err(gil: Gil<'_>, ret: c_int) -> PyResult<'_, ()> {
    if ret < 0 {
        if let Some(err) = capture(gil) {
            return Err(err);
        }
    }
    Ok(())
}

/// Boolean status: `Err` when negative and pending, else `ret > 0`
pub fn int_to_bool_err(gil: Gil<'_>, ret: c_int) -> PyResult<'_, bool> {
    if ret < 0 {
        if let Some(err) = capture(gil) {
            return Err(err);
        }
    }
    Ok(ret > 0)
}

/// Size result widened to `i64`; `Err` when negative and pending
///
/// A negative size with nothing pending yields 0, never a negative count.
pub fn ssize_to_i64_err(gil: Gil<'_>, ret: isize) -> PyResult<'_, i64> {
    if ret < 0 {
        return match capture(gil) {
            Some(err) => Err(err),
            None => Ok(0),
        };
    }
    Ok(ret as i64)
}

/// New-reference result: wraps a non-null pointer without an extra incref
///
/// A null result with no exception pending becomes a generic error.
///
/// # Safety
/// - `ret` must be null or an owned reference to a live object
pub unsafe fn obj_to_obj_err(gil: Gil<'_>, ret: *mut PyObject) -> PyResult<'_, Owned<'_>> {
    match Owned::from_owned_ptr(gil, ret) {
        Some(obj) => Ok(obj),
        None => Err(capture(gil).unwrap_or_else(|| Error::generic("NULL result without error set"))),
    }
}
