//! Dict type - string-keyed mappings
//!
//! Design: keyword-argument dicts are small, so entries live in an
//! insertion-ordered vector with linear lookup. Keys must be strings.

use core::ffi::{c_char, c_int};
use core::ptr;
use std::ffi::CStr;

use once_cell::sync::Lazy;

use crate::object::{
    cstr, new_static_type, pyrt_decref, pyrt_incref, pyrt_object_repr, type_name, PyObject,
    PyTypeObject, StaticPtr, TypeSlots,
};
use super::string::{as_str, is_str, new_str, pyrt_unicode_from_string};

/// Dict object layout
#[repr(C)]
pub struct DictObject {
    ob_base: PyObject,
    entries: Vec<(*mut PyObject, *mut PyObject)>,
}

static DICT_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("dict"),
        core::mem::size_of::<DictObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            dealloc: Some(dict_dealloc),
            repr: Some(dict_repr),
            ..TypeSlots::default()
        },
    )
});

#[inline]
pub fn dict_type() -> *mut PyTypeObject {
    DICT_TYPE.as_ptr()
}

unsafe extern "C" fn dict_dealloc(obj: *mut PyObject) {
    let DictObject { entries, .. } = *Box::from_raw(obj as *mut DictObject);

    for (key, value) in entries {
        pyrt_decref(key);
        pyrt_decref(value);
    }
}

/// Whether `obj` is a dict
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_check(obj: *mut PyObject) -> bool {
    !obj.is_null() && (*obj).ob_type == dict_type()
}

unsafe fn entries<'a>(
    obj: *mut PyObject,
    op: &str,
) -> Option<&'a mut Vec<(*mut PyObject, *mut PyObject)>> {
    if !pyrt_dict_check(obj) {
        let got = if obj.is_null() { "NULL" } else { type_name((*obj).ob_type) };
        crate::errors::set_error(
            crate::exceptions::type_error(),
            &format!("{}: expected dict, got {}", op, got),
        );
        return None;
    }
    Some(&mut (*(obj as *mut DictObject)).entries)
}

/// Create an empty dict (new reference)
#[no_mangle]
pub extern "C" fn pyrt_dict_new() -> *mut PyObject {
    let obj = Box::new(DictObject {
        ob_base: PyObject::new(dict_type()),
        entries: Vec::new(),
    });
    Box::into_raw(obj) as *mut PyObject
}

/// Number of entries, or -1 with `TypeError` set
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_size(obj: *mut PyObject) -> isize {
    match entries(obj, "dict_size") {
        Some(entries) => entries.len() as isize,
        None => -1,
    }
}

/// Insert or replace `key`; neither reference is stolen
///
/// # Safety
/// - all pointers must be null or valid objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_set_item(
    obj: *mut PyObject,
    key: *mut PyObject,
    value: *mut PyObject,
) -> c_int {
    let Some(entries) = entries(obj, "dict_set_item") else {
        return -1;
    };
    if key.is_null() || value.is_null() || !is_str(key) {
        crate::errors::set_error(crate::exceptions::type_error(), "dict keys must be str");
        return -1;
    }

    pyrt_incref(value);
    let text = as_str(key);
    match entries.iter_mut().find(|(k, _)| as_str(*k) == text) {
        Some(entry) => {
            let old = core::mem::replace(&mut entry.1, value);
            pyrt_decref(old);
        }
        None => {
            pyrt_incref(key);
            entries.push((key, value));
        }
    }
    0
}

/// Insert or replace the entry named by a C string
///
/// # Safety
/// - `key` must be a valid NUL-terminated string
/// - `obj` and `value` must be null or valid objects
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_set_item_string(
    obj: *mut PyObject,
    key: *const c_char,
    value: *mut PyObject,
) -> c_int {
    let key = pyrt_unicode_from_string(key);
    if key.is_null() {
        return -1;
    }
    let rc = pyrt_dict_set_item(obj, key, value);
    pyrt_decref(key);
    rc
}

/// Borrowed value for `key`, or null without setting an exception
///
/// # Safety
/// - `key` must be null or a valid NUL-terminated string
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_get_item_string(
    obj: *mut PyObject,
    key: *const c_char,
) -> *mut PyObject {
    if key.is_null() || !pyrt_dict_check(obj) {
        return ptr::null_mut();
    }
    let Ok(key) = CStr::from_ptr(key).to_str() else {
        return ptr::null_mut();
    };

    (*(obj as *mut DictObject))
        .entries
        .iter()
        .find(|(k, _)| as_str(*k) == Some(key))
        .map_or(ptr::null_mut(), |&(_, v)| v)
}

/// Iterate entries: borrowed key and value at `*pos`, advancing it
///
/// Returns 0 once the entries are exhausted.
///
/// # Safety
/// - `obj` must be null or a valid object
/// - out pointers must be null or writable
#[no_mangle]
pub unsafe extern "C" fn pyrt_dict_next(
    obj: *mut PyObject,
    pos: *mut isize,
    key: *mut *mut PyObject,
    value: *mut *mut PyObject,
) -> c_int {
    if pos.is_null() || !pyrt_dict_check(obj) {
        return 0;
    }

    let entries = &(*(obj as *mut DictObject)).entries;
    let Some(&(k, v)) = usize::try_from(*pos).ok().and_then(|i| entries.get(i)) else {
        return 0;
    };

    *pos += 1;
    if !key.is_null() {
        *key = k;
    }
    if !value.is_null() {
        *value = v;
    }
    1
}

unsafe extern "C" fn dict_repr(obj: *mut PyObject) -> *mut PyObject {
    let entries = &(*(obj as *mut DictObject)).entries;
    let mut parts = Vec::with_capacity(entries.len());

    for &(key, value) in entries {
        let (k, v) = (pyrt_object_repr(key), pyrt_object_repr(value));
        let part = (!k.is_null() && !v.is_null())
            .then(|| format!("{}: {}", as_str(k).unwrap_or(""), as_str(v).unwrap_or("")));
        pyrt_decref(k);
        pyrt_decref(v);
        match part {
            Some(part) => parts.push(part),
            None => return ptr::null_mut(),
        }
    }

    new_str(&format!("{{{}}}", parts.join(", ")))
}
