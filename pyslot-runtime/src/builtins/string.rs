//! String type - immutable UTF-8 text
//!
//! Design: the text is stored NUL-terminated so `pyrt_unicode_as_utf8` can
//! hand out a C string pointer without copying. Embedded NULs cannot be
//! represented; text is cut at the first one.

use core::ffi::{c_char, c_int};
use core::ptr;
use std::cmp::Ordering;
use std::ffi::{CStr, CString};

use once_cell::sync::Lazy;

use crate::object::{
    cstr, new_static_type, type_name, PyObject, PyTypeObject, StaticPtr, TypeSlots,
};

/// String object layout
#[repr(C)]
pub struct StrObject {
    ob_base: PyObject,
    text: CString,
}

static STR_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("str"),
        core::mem::size_of::<StrObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            dealloc: Some(str_dealloc),
            repr: Some(str_repr),
            richcompare: Some(str_richcompare),
            ..TypeSlots::default()
        },
    )
});

#[inline]
pub fn str_type() -> *mut PyTypeObject {
    STR_TYPE.as_ptr()
}

unsafe extern "C" fn str_dealloc(obj: *mut PyObject) {
    drop(Box::from_raw(obj as *mut StrObject));
}

fn alloc_str(text: CString) -> *mut PyObject {
    let obj = Box::new(StrObject {
        ob_base: PyObject::new(str_type()),
        text,
    });
    Box::into_raw(obj) as *mut PyObject
}

/// Create a new string object (new reference)
pub fn new_str(s: &str) -> *mut PyObject {
    let head = s.split('\0').next().unwrap_or("");
    alloc_str(CString::new(head).unwrap_or_default())
}

/// Whether `obj` is a string
///
/// # Safety
/// - `obj` must be a valid object
#[inline]
pub unsafe fn is_str(obj: *mut PyObject) -> bool {
    (*obj).ob_type == str_type()
}

/// Borrow the text of a string object
///
/// # Safety
/// - `obj` must be a valid object that outlives the returned slice
pub unsafe fn as_str<'a>(obj: *mut PyObject) -> Option<&'a str> {
    if obj.is_null() || !is_str(obj) {
        return None;
    }
    (*(obj as *mut StrObject)).text.to_str().ok()
}

/// Create a string from a NUL-terminated UTF-8 buffer
///
/// Returns null with `ValueError` set for invalid UTF-8.
///
/// # Safety
/// - `s` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn pyrt_unicode_from_string(s: *const c_char) -> *mut PyObject {
    if s.is_null() {
        crate::errors::set_error(crate::exceptions::system_error(), "NULL string argument");
        return ptr::null_mut();
    }

    let text = CStr::from_ptr(s);
    if let Err(e) = text.to_str() {
        crate::errors::set_error(
            crate::exceptions::value_error(),
            &format!("invalid utf-8 at byte {}", e.valid_up_to()),
        );
        return ptr::null_mut();
    }

    alloc_str(text.to_owned())
}

/// Borrow the UTF-8 buffer of a string object
///
/// The pointer stays valid as long as the object is alive. Returns null
/// with `TypeError` set when `obj` is not a string.
///
/// # Safety
/// - `obj` must be a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_unicode_as_utf8(obj: *mut PyObject) -> *const c_char {
    if obj.is_null() || !is_str(obj) {
        let got = if obj.is_null() { "NULL" } else { type_name((*obj).ob_type) };
        crate::errors::set_error(
            crate::exceptions::type_error(),
            &format!("expected str, got {}", got),
        );
        return ptr::null();
    }

    (*(obj as *mut StrObject)).text.as_ptr()
}

/// Whether `obj` is a string
///
/// # Safety
/// - `obj` must be a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_unicode_check(obj: *mut PyObject) -> bool {
    !obj.is_null() && is_str(obj)
}

unsafe extern "C" fn str_repr(obj: *mut PyObject) -> *mut PyObject {
    let text = as_str(obj).unwrap_or("");
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    new_str(&format!("'{}'", escaped))
}

unsafe extern "C" fn str_richcompare(a: *mut PyObject, b: *mut PyObject, op: c_int) -> *mut PyObject {
    match (as_str(a), as_str(b)) {
        (Some(x), Some(y)) => super::int::new_bool(crate::object::ordering_matches(x.cmp(y), op)),
        _ => super::singletons::new_not_implemented(),
    }
}

/// Compare a string object's text with a Rust string
///
/// # Safety
/// - `obj` must be a valid object
pub unsafe fn str_equals(obj: *mut PyObject, other: &str) -> bool {
    as_str(obj).map_or(false, |s| s.cmp(other) == Ordering::Equal)
}
