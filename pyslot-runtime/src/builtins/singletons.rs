//! `None` and `NotImplemented`

use core::ptr;

use once_cell::sync::Lazy;

use crate::object::{cstr, new_static_type, pyrt_incref, PyObject, PyTypeObject, StaticPtr, TypeSlots};
use super::string::new_str;

static NONE_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("NoneType"),
        core::mem::size_of::<PyObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            repr: Some(none_repr),
            ..TypeSlots::default()
        },
    )
});

static NOT_IMPLEMENTED_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("NotImplementedType"),
        core::mem::size_of::<PyObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            repr: Some(not_implemented_repr),
            ..TypeSlots::default()
        },
    )
});

static NONE: Lazy<StaticPtr<PyObject>> =
    Lazy::new(|| StaticPtr::leak(PyObject::immortal(NONE_TYPE.as_ptr())));

static NOT_IMPLEMENTED: Lazy<StaticPtr<PyObject>> =
    Lazy::new(|| StaticPtr::leak(PyObject::immortal(NOT_IMPLEMENTED_TYPE.as_ptr())));

unsafe extern "C" fn none_repr(_obj: *mut PyObject) -> *mut PyObject {
    new_str("None")
}

unsafe extern "C" fn not_implemented_repr(_obj: *mut PyObject) -> *mut PyObject {
    new_str("NotImplemented")
}

/// Borrowed `None`
#[no_mangle]
pub extern "C" fn pyrt_none() -> *mut PyObject {
    NONE.as_ptr()
}

/// Borrowed `NotImplemented`
#[no_mangle]
pub extern "C" fn pyrt_not_implemented() -> *mut PyObject {
    NOT_IMPLEMENTED.as_ptr()
}

/// New reference to `NotImplemented`
pub fn new_not_implemented() -> *mut PyObject {
    let obj = pyrt_not_implemented();
    unsafe { pyrt_incref(obj) };
    obj
}
