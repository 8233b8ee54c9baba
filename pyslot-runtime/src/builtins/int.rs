//! Integer and boolean types
//!
//! Design: `bool` subclasses `int` and shares its layout; `True` and `False`
//! are immortal singletons so identity comparison is enough to test them.

use core::ffi::c_int;
use core::ptr;

use once_cell::sync::Lazy;

use crate::object::{
    cstr, new_static_type, pyrt_incref, pyrt_type_is_subtype, type_name, PyObject,
    PyTypeObject, StaticPtr, TypeSlots,
};
use super::singletons::new_not_implemented;
use super::string::new_str;

/// Integer object layout
#[repr(C)]
pub struct IntObject {
    ob_base: PyObject,
    value: i64,
}

static INT_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("int"),
        core::mem::size_of::<IntObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            dealloc: Some(int_dealloc),
            repr: Some(int_repr),
            richcompare: Some(int_richcompare),
            ..TypeSlots::default()
        },
    )
});

static BOOL_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("bool"),
        core::mem::size_of::<IntObject>(),
        0,
        INT_TYPE.as_ptr(),
        TypeSlots {
            repr: Some(bool_repr),
            richcompare: Some(int_richcompare),
            ..TypeSlots::default()
        },
    )
});

static TRUE: Lazy<StaticPtr<IntObject>> = Lazy::new(|| {
    StaticPtr::leak(IntObject {
        ob_base: PyObject::immortal(BOOL_TYPE.as_ptr()),
        value: 1,
    })
});

static FALSE: Lazy<StaticPtr<IntObject>> = Lazy::new(|| {
    StaticPtr::leak(IntObject {
        ob_base: PyObject::immortal(BOOL_TYPE.as_ptr()),
        value: 0,
    })
});

#[inline]
pub fn int_type() -> *mut PyTypeObject {
    INT_TYPE.as_ptr()
}

#[inline]
pub fn bool_type() -> *mut PyTypeObject {
    BOOL_TYPE.as_ptr()
}

unsafe extern "C" fn int_dealloc(obj: *mut PyObject) {
    drop(Box::from_raw(obj as *mut IntObject));
}

/// Whether `obj` is an int (or bool)
///
/// # Safety
/// - `obj` must be a valid object
#[inline]
pub unsafe fn is_int(obj: *mut PyObject) -> bool {
    pyrt_type_is_subtype((*obj).ob_type, int_type())
}

#[inline]
unsafe fn value_of(obj: *mut PyObject) -> i64 {
    (*(obj as *mut IntObject)).value
}

/// Borrowed `True`
#[no_mangle]
pub extern "C" fn pyrt_true() -> *mut PyObject {
    TRUE.as_ptr() as *mut PyObject
}

/// Borrowed `False`
#[no_mangle]
pub extern "C" fn pyrt_false() -> *mut PyObject {
    FALSE.as_ptr() as *mut PyObject
}

/// New reference to `True` or `False`
pub fn new_bool(value: bool) -> *mut PyObject {
    let obj = if value { pyrt_true() } else { pyrt_false() };
    unsafe { pyrt_incref(obj) };
    obj
}

/// New reference to `True` when `value` is non-zero, else `False`
#[no_mangle]
pub extern "C" fn pyrt_bool_from_long(value: i64) -> *mut PyObject {
    new_bool(value != 0)
}

/// Create a new int object (new reference)
#[no_mangle]
pub extern "C" fn pyrt_long_from_i64(value: i64) -> *mut PyObject {
    let obj = Box::new(IntObject {
        ob_base: PyObject::new(int_type()),
        value,
    });
    Box::into_raw(obj) as *mut PyObject
}

/// Extract the value of an int
///
/// Returns -1 with `TypeError` set when `obj` is not an int; callers tell
/// the two apart with `pyrt_err_occurred`.
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_long_as_i64(obj: *mut PyObject) -> i64 {
    if obj.is_null() || !is_int(obj) {
        let got = if obj.is_null() { "NULL" } else { type_name((*obj).ob_type) };
        crate::errors::set_error(
            crate::exceptions::type_error(),
            &format!("an integer is required (got type {})", got),
        );
        return -1;
    }
    value_of(obj)
}

unsafe extern "C" fn int_repr(obj: *mut PyObject) -> *mut PyObject {
    new_str(&value_of(obj).to_string())
}

unsafe extern "C" fn bool_repr(obj: *mut PyObject) -> *mut PyObject {
    new_str(if value_of(obj) != 0 { "True" } else { "False" })
}

unsafe extern "C" fn int_richcompare(a: *mut PyObject, b: *mut PyObject, op: c_int) -> *mut PyObject {
    if !is_int(a) || !is_int(b) {
        return new_not_implemented();
    }
    new_bool(crate::object::ordering_matches(value_of(a).cmp(&value_of(b)), op))
}
