//! Backend over CPython's stable ABI through `pyo3::ffi`

use core::ffi::{c_char, c_int, c_void};
use core::ptr;
use std::ffi::CStr;

use pyo3::ffi;

use super::{BuiltinExc, SlotTable};

pub use pyo3::ffi::{PyObject, PyTypeObject};

/// CPython has no three-way compare slot since 3.0
pub const SUPPORTS_COMPARE: bool = false;

pub type GilState = ffi::PyGILState_STATE;

/// Start the interpreter if the host has not, leaving the lock released
pub fn initialize() {
    unsafe {
        if ffi::Py_IsInitialized() == 0 {
            ffi::Py_InitializeEx(0);
            ffi::PyEval_SaveThread();
        }
    }
}

pub unsafe fn gil_ensure() -> GilState {
    ffi::PyGILState_Ensure()
}

pub unsafe fn gil_release(state: GilState) {
    ffi::PyGILState_Release(state)
}

pub fn gil_check() -> bool {
    unsafe { ffi::PyGILState_Check() == 1 }
}

// Exception state

pub unsafe fn err_occurred() -> *mut PyObject {
    ffi::PyErr_Occurred()
}

pub unsafe fn err_fetch(
    kind: &mut *mut PyObject,
    value: &mut *mut PyObject,
    traceback: &mut *mut PyObject,
) {
    ffi::PyErr_Fetch(kind, value, traceback)
}

pub unsafe fn err_restore(kind: *mut PyObject, value: *mut PyObject, traceback: *mut PyObject) {
    ffi::PyErr_Restore(kind, value, traceback)
}

pub unsafe fn err_set_string(kind: *mut PyObject, msg: *const c_char) {
    ffi::PyErr_SetString(kind, msg)
}

pub unsafe fn err_clear() {
    ffi::PyErr_Clear()
}

pub unsafe fn exc(kind: BuiltinExc) -> *mut PyObject {
    match kind {
        BuiltinExc::Exception => ffi::PyExc_Exception,
        BuiltinExc::TypeError => ffi::PyExc_TypeError,
        BuiltinExc::KeyError => ffi::PyExc_KeyError,
        BuiltinExc::AttributeError => ffi::PyExc_AttributeError,
        BuiltinExc::NotImplementedError => ffi::PyExc_NotImplementedError,
        BuiltinExc::SystemError => ffi::PyExc_SystemError,
    }
}

// Reference counting

pub unsafe fn incref(obj: *mut PyObject) {
    ffi::Py_XINCREF(obj)
}

pub unsafe fn decref(obj: *mut PyObject) {
    ffi::Py_XDECREF(obj)
}

pub unsafe fn refcnt(obj: *mut PyObject) -> isize {
    if obj.is_null() {
        0
    } else {
        ffi::Py_REFCNT(obj)
    }
}

// Object protocol

pub unsafe fn object_str(obj: *mut PyObject) -> *mut PyObject {
    ffi::PyObject_Str(obj)
}

pub unsafe fn object_repr(obj: *mut PyObject) -> *mut PyObject {
    ffi::PyObject_Repr(obj)
}

pub unsafe fn object_call(
    obj: *mut PyObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    if !args.is_null() {
        return ffi::PyObject_Call(obj, args, kwds);
    }

    let empty = ffi::PyTuple_New(0);
    if empty.is_null() {
        return ptr::null_mut();
    }
    let result = ffi::PyObject_Call(obj, empty, kwds);
    ffi::Py_DECREF(empty);
    result
}

pub unsafe fn object_richcompare(a: *mut PyObject, b: *mut PyObject, op: c_int) -> *mut PyObject {
    ffi::PyObject_RichCompare(a, b, op)
}

/// Three-way compare built from rich comparisons
pub unsafe fn object_compare(a: *mut PyObject, b: *mut PyObject) -> c_int {
    if a == b {
        return 0;
    }
    match ffi::PyObject_RichCompareBool(a, b, ffi::Py_EQ) {
        1 => return 0,
        -1 => return -1,
        _ => {}
    }
    match ffi::PyObject_RichCompareBool(a, b, ffi::Py_LT) {
        1 => -1,
        0 => 1,
        _ => -1,
    }
}

pub unsafe fn object_is_true(obj: *mut PyObject) -> c_int {
    ffi::PyObject_IsTrue(obj)
}

pub unsafe fn is_subclass(derived: *mut PyObject, base: *mut PyObject) -> c_int {
    ffi::PyObject_IsSubclass(derived, base)
}

// Types

pub unsafe fn type_of(obj: *mut PyObject) -> *mut PyTypeObject {
    ffi::Py_TYPE(obj)
}

pub unsafe fn type_name(tp: *mut PyTypeObject) -> String {
    let name = ffi::PyObject_GetAttrString(tp as *mut PyObject, b"__name__\0".as_ptr() as *const c_char);
    if name.is_null() {
        ffi::PyErr_Clear();
        return "<unknown>".to_owned();
    }

    let mut len: ffi::Py_ssize_t = 0;
    let data = ffi::PyUnicode_AsUTF8AndSize(name, &mut len);
    let text = if data.is_null() {
        ffi::PyErr_Clear();
        "<unknown>".to_owned()
    } else {
        let bytes = std::slice::from_raw_parts(data as *const u8, len as usize);
        String::from_utf8_lossy(bytes).into_owned()
    };
    ffi::Py_DECREF(name);
    text
}

pub unsafe fn type_new(name: &'static CStr, basicsize: usize, slots: &SlotTable) -> *mut PyTypeObject {
    let mut table: Vec<ffi::PyType_Slot> = Vec::with_capacity(8);
    let mut push = |slot: c_int, pfunc: Option<*mut c_void>| {
        if let Some(pfunc) = pfunc {
            table.push(ffi::PyType_Slot { slot, pfunc });
        }
    };

    push(ffi::Py_tp_dealloc, slots.dealloc.map(|f| f as *mut c_void));
    push(ffi::Py_tp_call, slots.call.map(|f| f as *mut c_void));
    push(ffi::Py_tp_init, slots.init.map(|f| f as *mut c_void));
    push(ffi::Py_tp_repr, slots.repr.map(|f| f as *mut c_void));
    push(ffi::Py_tp_str, slots.str.map(|f| f as *mut c_void));
    push(ffi::Py_tp_richcompare, slots.richcompare.map(|f| f as *mut c_void));
    table.push(ffi::PyType_Slot { slot: 0, pfunc: ptr::null_mut() });

    // CPython keeps pointing at the slot array for the type's lifetime
    let table = Box::leak(table.into_boxed_slice());
    let mut spec = ffi::PyType_Spec {
        name: name.as_ptr(),
        basicsize: basicsize as c_int,
        itemsize: 0,
        flags: ffi::Py_TPFLAGS_DEFAULT as _,
        slots: table.as_mut_ptr(),
    };
    ffi::PyType_FromSpec(&mut spec) as *mut PyTypeObject
}

pub unsafe fn type_alloc(tp: *mut PyTypeObject) -> *mut PyObject {
    ffi::PyType_GenericAlloc(tp, 0)
}

pub unsafe fn type_call(
    tp: *mut PyTypeObject,
    args: *mut PyObject,
    kwds: *mut PyObject,
) -> *mut PyObject {
    object_call(tp as *mut PyObject, args, kwds)
}

/// Release the memory of an instance whose refcount reached zero
///
/// Heap-type instances own a reference to their type, released here.
pub unsafe fn generic_free(obj: *mut PyObject) {
    let tp = ffi::Py_TYPE(obj);
    let free = ffi::PyType_GetSlot(tp, ffi::Py_tp_free);
    if !free.is_null() {
        let free: unsafe extern "C" fn(*mut c_void) = core::mem::transmute(free);
        free(obj as *mut c_void);
    }
    ffi::Py_DECREF(tp as *mut PyObject);
}

// Builtin values

pub unsafe fn none() -> *mut PyObject {
    ffi::Py_None()
}

pub unsafe fn not_implemented() -> *mut PyObject {
    ffi::Py_NotImplemented()
}

pub unsafe fn bool_from(value: bool) -> *mut PyObject {
    ffi::PyBool_FromLong(value as _)
}

pub unsafe fn unicode_from_string(s: *const c_char) -> *mut PyObject {
    ffi::PyUnicode_FromString(s)
}

pub unsafe fn unicode_as_utf8(obj: *mut PyObject) -> *const c_char {
    let mut len: ffi::Py_ssize_t = 0;
    ffi::PyUnicode_AsUTF8AndSize(obj, &mut len)
}

pub unsafe fn long_from_i64(value: i64) -> *mut PyObject {
    ffi::PyLong_FromLongLong(value)
}

pub unsafe fn long_as_i64(obj: *mut PyObject) -> i64 {
    ffi::PyLong_AsLongLong(obj)
}

pub unsafe fn tuple_new(len: isize) -> *mut PyObject {
    ffi::PyTuple_New(len)
}

pub unsafe fn tuple_check(obj: *mut PyObject) -> bool {
    ffi::PyTuple_Check(obj) != 0
}

pub unsafe fn tuple_size(obj: *mut PyObject) -> isize {
    ffi::PyTuple_Size(obj)
}

pub unsafe fn tuple_get_item(obj: *mut PyObject, index: isize) -> *mut PyObject {
    ffi::PyTuple_GetItem(obj, index)
}

pub unsafe fn tuple_set_item(obj: *mut PyObject, index: isize, item: *mut PyObject) -> c_int {
    ffi::PyTuple_SetItem(obj, index, item)
}

pub unsafe fn dict_new() -> *mut PyObject {
    ffi::PyDict_New()
}

pub unsafe fn dict_check(obj: *mut PyObject) -> bool {
    ffi::PyDict_Check(obj) != 0
}

pub unsafe fn dict_size(obj: *mut PyObject) -> isize {
    ffi::PyDict_Size(obj)
}

pub unsafe fn dict_set_item_string(
    obj: *mut PyObject,
    key: *const c_char,
    value: *mut PyObject,
) -> c_int {
    ffi::PyDict_SetItemString(obj, key, value)
}

pub unsafe fn dict_get_item_string(obj: *mut PyObject, key: *const c_char) -> *mut PyObject {
    ffi::PyDict_GetItemString(obj, key)
}

pub unsafe fn dict_next(
    obj: *mut PyObject,
    pos: &mut isize,
    key: &mut *mut PyObject,
    value: &mut *mut PyObject,
) -> bool {
    ffi::PyDict_Next(obj, pos, key, value) != 0
}
