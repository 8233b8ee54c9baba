//! Tuple type - fixed-size sequences
//!
//! Design: slots start out null and are filled with `pyrt_tuple_set_item`,
//! which steals the reference it is given. Items are released when the
//! tuple dies.

use core::ffi::c_int;
use core::ptr;

use once_cell::sync::Lazy;

use crate::object::{
    cstr, new_static_type, pyrt_decref, pyrt_object_repr, type_name, PyObject, PyTypeObject,
    StaticPtr, TypeSlots,
};
use super::string::{as_str, new_str};

/// Tuple object layout
#[repr(C)]
pub struct TupleObject {
    ob_base: PyObject,
    items: Vec<*mut PyObject>,
}

static TUPLE_TYPE: Lazy<StaticPtr<PyTypeObject>> = Lazy::new(|| {
    new_static_type(
        cstr!("tuple"),
        core::mem::size_of::<TupleObject>(),
        0,
        ptr::null_mut(),
        TypeSlots {
            dealloc: Some(tuple_dealloc),
            repr: Some(tuple_repr),
            ..TypeSlots::default()
        },
    )
});

#[inline]
pub fn tuple_type() -> *mut PyTypeObject {
    TUPLE_TYPE.as_ptr()
}

unsafe extern "C" fn tuple_dealloc(obj: *mut PyObject) {
    let TupleObject { items, .. } = *Box::from_raw(obj as *mut TupleObject);

    // Decrement refcount for all elements
    for item in items {
        pyrt_decref(item);
    }
}

/// Whether `obj` is a tuple
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_tuple_check(obj: *mut PyObject) -> bool {
    !obj.is_null() && (*obj).ob_type == tuple_type()
}

unsafe fn items<'a>(obj: *mut PyObject, op: &str) -> Option<&'a mut Vec<*mut PyObject>> {
    if !pyrt_tuple_check(obj) {
        let got = if obj.is_null() { "NULL" } else { type_name((*obj).ob_type) };
        crate::errors::set_error(
            crate::exceptions::type_error(),
            &format!("{}: expected tuple, got {}", op, got),
        );
        return None;
    }
    Some(&mut (*(obj as *mut TupleObject)).items)
}

/// Create a tuple of `len` empty slots (new reference)
#[no_mangle]
pub extern "C" fn pyrt_tuple_new(len: isize) -> *mut PyObject {
    if len < 0 {
        unsafe {
            crate::errors::set_error(crate::exceptions::system_error(), "negative tuple size");
        }
        return ptr::null_mut();
    }

    let obj = Box::new(TupleObject {
        ob_base: PyObject::new(tuple_type()),
        items: vec![ptr::null_mut(); len as usize],
    });
    Box::into_raw(obj) as *mut PyObject
}

/// Number of slots, or -1 with `TypeError` set
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_tuple_size(obj: *mut PyObject) -> isize {
    match items(obj, "tuple_size") {
        Some(items) => items.len() as isize,
        None => -1,
    }
}

/// Borrowed item at `index`, or null with `IndexError` set
///
/// # Safety
/// - `obj` must be null or a valid object
#[no_mangle]
pub unsafe extern "C" fn pyrt_tuple_get_item(obj: *mut PyObject, index: isize) -> *mut PyObject {
    let Some(items) = items(obj, "tuple_get_item") else {
        return ptr::null_mut();
    };

    match usize::try_from(index).ok().and_then(|i| items.get(i)) {
        Some(&item) => item,
        None => {
            crate::errors::set_error(crate::exceptions::index_error(), "tuple index out of range");
            ptr::null_mut()
        }
    }
}

/// Store `item` at `index`, stealing the reference (even on failure)
///
/// # Safety
/// - `obj` must be null or a valid object
/// - `item` must be an owned reference or null
#[no_mangle]
pub unsafe extern "C" fn pyrt_tuple_set_item(
    obj: *mut PyObject,
    index: isize,
    item: *mut PyObject,
) -> c_int {
    let Some(items) = items(obj, "tuple_set_item") else {
        pyrt_decref(item);
        return -1;
    };

    match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
        Some(slot) => {
            let old = core::mem::replace(slot, item);
            pyrt_decref(old);
            0
        }
        None => {
            pyrt_decref(item);
            crate::errors::set_error(
                crate::exceptions::index_error(),
                "tuple assignment index out of range",
            );
            -1
        }
    }
}

unsafe extern "C" fn tuple_repr(obj: *mut PyObject) -> *mut PyObject {
    let items = &(*(obj as *mut TupleObject)).items;
    let mut parts = Vec::with_capacity(items.len());

    for &item in items {
        let repr = pyrt_object_repr(item);
        if repr.is_null() {
            return ptr::null_mut();
        }
        parts.push(as_str(repr).unwrap_or("").to_owned());
        pyrt_decref(repr);
    }

    let text = match parts.len() {
        1 => format!("({},)", parts[0]),
        _ => format!("({})", parts.join(", ")),
    };
    new_str(&text)
}
